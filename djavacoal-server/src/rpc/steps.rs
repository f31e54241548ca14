//! Context steps contributing per-request scope entries.
//!
//! Registered in `create_router`; [`BindingsStep`] must run before
//! [`PrincipalStep`], which reads the contributed bindings.

use async_trait::async_trait;
use djavacoal_rpc::context::{scope_keys, ContextStep, RequestScope};
use djavacoal_rpc::middleware::Request;
use djavacoal_rpc::{RpcError, RpcResult};

use super::context::{AppContext, Principal};

/// Scope keys contributed by the application's context chain.
pub mod keys {
    /// Request id minted per call (`String`).
    pub const REQUEST_ID: &str = "request_id";
    /// Platform [`Bindings`](crate::rpc::context::Bindings) verified for this
    /// request.
    pub const BINDINGS: &str = "bindings";
    /// Resolved [`Principal`](crate::rpc::context::Principal), present only
    /// for authenticated callers.
    pub const PRINCIPAL: &str = "principal";
}

/// Mints a sortable per-request id.
pub struct RequestIdStep;

#[async_trait]
impl ContextStep<AppContext> for RequestIdStep {
    fn name(&self) -> &'static str {
        "request_id"
    }

    async fn contribute(
        &self,
        _app: &AppContext,
        _request: &Request,
        scope: &mut RequestScope,
    ) -> RpcResult<()> {
        scope.insert(keys::REQUEST_ID, uuid::Uuid::now_v7().to_string())
    }
}

/// Injects the platform bindings and verifies the required names exist.
///
/// A missing binding aborts the chain: no handler should run against a
/// platform that cannot honor its resource names.
pub struct BindingsStep {
    required: Vec<&'static str>,
}

impl BindingsStep {
    pub fn require(required: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            required: required.into_iter().collect(),
        }
    }
}

#[async_trait]
impl ContextStep<AppContext> for BindingsStep {
    fn name(&self) -> &'static str {
        "bindings"
    }

    async fn contribute(
        &self,
        app: &AppContext,
        _request: &Request,
        scope: &mut RequestScope,
    ) -> RpcResult<()> {
        for name in &self.required {
            if !app.bindings.contains(name) {
                return Err(RpcError::service_unavailable(format!(
                    "required binding '{}' is not configured",
                    name
                )));
            }
        }
        scope.insert(keys::BINDINGS, app.bindings.clone())
    }
}

/// Resolves the transport-seeded bearer token into a principal.
///
/// Registered after [`BindingsStep`]; resolution happens against a bound
/// platform. An absent or unrecognized token contributes nothing, leaving
/// authorization to the guarded namespaces.
pub struct PrincipalStep;

#[async_trait]
impl ContextStep<AppContext> for PrincipalStep {
    fn name(&self) -> &'static str {
        "principal"
    }

    async fn contribute(
        &self,
        app: &AppContext,
        _request: &Request,
        scope: &mut RequestScope,
    ) -> RpcResult<()> {
        if !scope.contains(keys::BINDINGS) {
            return Err(RpcError::internal(
                "bindings must be contributed before principal resolution",
            ));
        }

        let token = match scope.get::<String>(scope_keys::AUTH_TOKEN) {
            Some(token) => token.clone(),
            None => return Ok(()),
        };

        if let Some(principal) = app.resolver.resolve(&token).await? {
            scope.insert::<Principal>(keys::PRINCIPAL, principal)?;
        }
        Ok(())
    }
}
