//! Input/output payloads for the site's procedures.

use djavacoal_rpc::{Validate, ValidationResult, ValidationRules};
use serde::{Deserialize, Serialize};

/// Input for `auth.invite`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteAdminInput {
    /// Email address of the invitee.
    pub to: String,
    /// Absolute https link the invitation email points at.
    pub link: String,
}

impl Validate for InviteAdminInput {
    fn validate(&self) -> ValidationResult {
        ValidationRules::new()
            .email("to", &self.to)
            .required("link", &self.link)
            .url("link", &self.link)
            .build()
    }
}

/// Input for `invitation.accept`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptInvitationInput {
    pub token: String,
    pub name: String,
    pub password: String,
}

impl Validate for AcceptInvitationInput {
    fn validate(&self) -> ValidationResult {
        ValidationRules::new()
            .required("token", &self.token)
            .min_length("name", &self.name, 2)
            .max_length("name", &self.name, 100)
            .min_length("password", &self.password, 8)
            .build()
    }
}

/// Input for `auth.remove`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveAdminInput {
    pub id: String,
}

impl Validate for RemoveAdminInput {
    fn validate(&self) -> ValidationResult {
        ValidationRules::new().required("id", &self.id).build()
    }
}

/// Input for `contact.submit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactInput {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl Validate for ContactInput {
    fn validate(&self) -> ValidationResult {
        ValidationRules::new()
            .required("name", &self.name)
            .email("email", &self.email)
            .min_length("message", &self.message, 1)
            .max_length("message", &self.message, 2000)
            .build()
    }
}

/// Output of the `health` query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
}

impl HealthStatus {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
