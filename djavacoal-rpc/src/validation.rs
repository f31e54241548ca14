//! Input validation framework
//!
//! Provides the [`Validate`] trait, field-level error reporting, and a fluent
//! [`ValidationRules`] builder for common rules. Validators are plain
//! functions over the decoded value and are reusable for both input and
//! output payloads, independent of any serialization library.
//!
//! # Example
//!
//! ```rust,ignore
//! use djavacoal_rpc::validation::{Validate, ValidationResult, ValidationRules};
//!
//! struct InviteAdminInput {
//!     to: String,
//!     link: String,
//! }
//!
//! impl Validate for InviteAdminInput {
//!     fn validate(&self) -> ValidationResult {
//!         ValidationRules::new()
//!             .email("to", &self.to)
//!             .required("link", &self.link)
//!             .url("link", &self.link)
//!             .build()
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// Validation error for a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// The name of the field that failed validation
    pub field: String,
    /// Human-readable error message
    pub message: String,
    /// Error code identifying the type of validation failure
    pub code: String,
}

impl FieldError {
    /// Create a new field error
    pub fn new(
        field: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
        }
    }

    /// Create a "required" field error
    pub fn required(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(&field, format!("{} is required", field), "required")
    }

    /// Create a "min_length" field error
    pub fn min_length(field: impl Into<String>, min: usize) -> Self {
        let field = field.into();
        Self::new(
            &field,
            format!("{} must be at least {} characters", field, min),
            "min_length",
        )
    }

    /// Create a "max_length" field error
    pub fn max_length(field: impl Into<String>, max: usize) -> Self {
        let field = field.into();
        Self::new(
            &field,
            format!("{} must be at most {} characters", field, max),
            "max_length",
        )
    }

    /// Create a "range" field error
    pub fn range(field: impl Into<String>, min: i64, max: i64) -> Self {
        let field = field.into();
        Self::new(
            &field,
            format!("{} must be between {} and {}", field, min, max),
            "range",
        )
    }

    /// Create a "pattern" field error
    pub fn pattern(field: impl Into<String>, pattern: &str) -> Self {
        let field = field.into();
        Self::new(
            &field,
            format!("{} must match pattern: {}", field, pattern),
            "pattern",
        )
    }

    /// Create an "email" field error
    pub fn email(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(
            &field,
            format!("{} must be a valid email address", field),
            "email",
        )
    }

    /// Create a "url" field error
    pub fn url(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(
            &field,
            format!("{} must be an http(s) URL", field),
            "url",
        )
    }

    /// Create a custom field error
    pub fn custom(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field, message, "custom")
    }
}

/// Result of validating an input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the input is valid
    pub valid: bool,
    /// List of field-level errors (empty if valid)
    pub errors: Vec<FieldError>,
}

impl ValidationResult {
    /// Create a successful validation result
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    /// Create a validation result from a list of errors.
    /// If the list is empty, the result is valid.
    pub fn from_errors(errors: Vec<FieldError>) -> Self {
        if !errors.is_empty() {
            let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
            debug!(error_count = errors.len(), fields = ?fields, "validation failed");
        }
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Get the errors
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Convert to a map of field -> errors for easier lookup
    pub fn errors_by_field(&self) -> HashMap<String, Vec<&FieldError>> {
        let mut map: HashMap<String, Vec<&FieldError>> = HashMap::new();
        for error in &self.errors {
            map.entry(error.field.clone()).or_default().push(error);
        }
        map
    }

    /// Merge another validation result into this one
    pub fn merge(mut self, other: ValidationResult) -> Self {
        self.errors.extend(other.errors);
        self.valid = self.errors.is_empty();
        self
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::ok()
    }
}

/// Trait for validatable input types.
///
/// Implement this on input structs to enable automatic validation before
/// handler execution.
pub trait Validate {
    /// Validate the input and return a result with any errors
    fn validate(&self) -> ValidationResult;
}

// Implement Validate for common types that don't need validation
impl Validate for () {
    fn validate(&self) -> ValidationResult {
        ValidationResult::ok()
    }
}

impl Validate for serde_json::Value {
    fn validate(&self) -> ValidationResult {
        ValidationResult::ok()
    }
}

impl<T: Validate> Validate for Option<T> {
    fn validate(&self) -> ValidationResult {
        match self {
            Some(value) => value.validate(),
            None => ValidationResult::ok(),
        }
    }
}

/// Fluent builder for validation rules.
///
/// # Example
///
/// ```rust,ignore
/// let result = ValidationRules::new()
///     .required("name", &input.name)
///     .min_length("password", &input.password, 8)
///     .email("email", &input.email)
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct ValidationRules {
    errors: Vec<FieldError>,
}

impl ValidationRules {
    /// Create a new validation rules builder
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Add a custom error
    pub fn add_error(mut self, error: FieldError) -> Self {
        self.errors.push(error);
        self
    }

    /// Validate that a string field is not empty (required)
    pub fn required(mut self, field: &str, value: &str) -> Self {
        if value.trim().is_empty() {
            self.errors.push(FieldError::required(field));
        }
        self
    }

    /// Validate minimum string length
    pub fn min_length(mut self, field: &str, value: &str, min: usize) -> Self {
        if value.len() < min {
            trace!(field = %field, length = value.len(), min = min, "field below minimum length");
            self.errors.push(FieldError::min_length(field, min));
        }
        self
    }

    /// Validate maximum string length
    pub fn max_length(mut self, field: &str, value: &str, max: usize) -> Self {
        if value.len() > max {
            trace!(field = %field, length = value.len(), max = max, "field exceeds maximum length");
            self.errors.push(FieldError::max_length(field, max));
        }
        self
    }

    /// Validate that a number is within a range (inclusive)
    pub fn range(mut self, field: &str, value: i64, min: i64, max: i64) -> Self {
        if value < min || value > max {
            self.errors.push(FieldError::range(field, min, max));
        }
        self
    }

    /// Validate that a string matches a regex pattern
    pub fn pattern(mut self, field: &str, value: &str, pattern: &str) -> Self {
        match regex::Regex::new(pattern) {
            Ok(re) => {
                if !re.is_match(value) {
                    self.errors.push(FieldError::pattern(field, pattern));
                }
            }
            Err(e) => {
                // Invalid regex pattern is a programming error
                warn!(field = %field, pattern = %pattern, error = %e, "invalid validation regex pattern");
                self.errors.push(FieldError::new(
                    field,
                    format!("Invalid validation pattern: {}", pattern),
                    "invalid_pattern",
                ));
            }
        }
        self
    }

    /// Validate that a string is a valid email address
    pub fn email(mut self, field: &str, value: &str) -> Self {
        // Checks for a single @ and at least one dot in the domain
        let is_valid = value.contains('@')
            && value.split('@').count() == 2
            && value
                .split('@')
                .next_back()
                .map(|domain| domain.contains('.'))
                .unwrap_or(false)
            && !value.starts_with('@')
            && !value.ends_with('@')
            && !value.ends_with('.');

        if !is_valid {
            trace!(field = %field, "invalid email format");
            self.errors.push(FieldError::email(field));
        }
        self
    }

    /// Validate that a string is an absolute http(s) URL
    pub fn url(mut self, field: &str, value: &str) -> Self {
        let is_valid = (value.starts_with("http://") || value.starts_with("https://"))
            && value.len() > "https://".len();
        if !is_valid {
            self.errors.push(FieldError::url(field));
        }
        self
    }

    /// Add a custom validation with a predicate
    pub fn custom<F>(mut self, field: &str, predicate: F, message: &str) -> Self
    where
        F: FnOnce() -> bool,
    {
        if !predicate() {
            self.errors.push(FieldError::custom(field, message));
        }
        self
    }

    /// Build the validation result
    pub fn build(self) -> ValidationResult {
        ValidationResult::from_errors(self.errors)
    }
}

// =============================================================================
// Router-level validation
// =============================================================================

use crate::{RpcConfig, RpcError};

/// Validate procedure path format.
///
/// A valid procedure path:
/// - Cannot be empty
/// - Cannot start or end with a dot
/// - Cannot contain consecutive dots (..)
/// - Can only contain alphanumeric characters, underscores, and dots
///
/// # Errors
///
/// Returns `RpcError::validation` if the path is invalid.
pub fn validate_path(path: &str) -> Result<(), RpcError> {
    if path.is_empty() {
        return Err(RpcError::validation("Procedure path cannot be empty"));
    }
    if path.starts_with('.') || path.ends_with('.') {
        return Err(RpcError::validation(format!(
            "Procedure path cannot start or end with a dot (got: '{}')",
            path
        )));
    }
    if path.contains("..") {
        return Err(RpcError::validation(format!(
            "Procedure path cannot contain consecutive dots (got: '{}')",
            path
        )));
    }

    if let Some(invalid_char) = path
        .chars()
        .find(|&ch| !ch.is_ascii_alphanumeric() && ch != '_' && ch != '.')
    {
        return Err(RpcError::validation(format!(
            "Procedure path contains invalid character: '{}' in path '{}'",
            invalid_char, path
        )));
    }

    Ok(())
}

/// Validate input size against the configured limit.
///
/// Uses cheap estimates for scalar inputs and serializes only compound values.
///
/// # Errors
///
/// Returns `RpcError::payload_too_large` if the input exceeds the configured
/// maximum size.
pub fn validate_input_size(input: &serde_json::Value, config: &RpcConfig) -> Result<(), RpcError> {
    use serde_json::Value;

    let estimated_size = match input {
        Value::Null => 4,
        Value::Bool(_) => 5,
        Value::Number(_) => 20,
        Value::String(s) => s.len() + 2,
        Value::Array(arr) if arr.is_empty() => 2,
        Value::Object(obj) if obj.is_empty() => 2,
        _ => {
            let size = serde_json::to_vec(input).map(|v| v.len()).unwrap_or(0);
            if size > config.max_input_size {
                return Err(RpcError::payload_too_large(format!(
                    "Input size {} bytes exceeds maximum {} bytes",
                    size, config.max_input_size
                )));
            }
            return Ok(());
        }
    };

    if estimated_size > config.max_input_size {
        return Err(RpcError::payload_too_large(format!(
            "Input size ~{} bytes exceeds maximum {} bytes",
            estimated_size, config.max_input_size
        )));
    }

    Ok(())
}
