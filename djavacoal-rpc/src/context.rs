//! Per-request context: application state, the request scope accumulator,
//! context steps, and cooperative cancellation.
//!
//! The request scope is an insert-only mapping built by an ordered list of
//! [`ContextStep`]s before any middleware or handler runs. Each step
//! contributes entries under well-known keys; a step that cannot produce its
//! contribution aborts the request with a context error naming the step, so a
//! partially-built scope never reaches a handler silently.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::middleware::Request;
use crate::{RpcError, RpcResult};

/// Well-known scope keys seeded by the transport.
pub mod scope_keys {
    /// Bearer token from the `Authorization` header, if present (`String`).
    pub const AUTH_TOKEN: &str = "auth_token";
    /// Per-request [`CancelToken`](super::CancelToken).
    pub const CANCEL: &str = "cancel";
}

/// Insert-only accumulator of per-request contributions.
///
/// Keys map to type-erased values. Steps may only add entries, never remove
/// or replace them; contributing the same key twice is a configuration error
/// and fails the request.
#[derive(Default)]
pub struct RequestScope {
    entries: HashMap<&'static str, Arc<dyn Any + Send + Sync>>,
}

impl RequestScope {
    /// Create an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry under `key`.
    ///
    /// Returns a context error if the key was already contributed.
    pub fn insert<T: Send + Sync + 'static>(&mut self, key: &'static str, value: T) -> RpcResult<()> {
        if self.entries.contains_key(key) {
            return Err(RpcError::context(format!(
                "scope key '{}' contributed twice",
                key
            )));
        }
        self.entries.insert(key, Arc::new(value));
        Ok(())
    }

    /// Look up a typed entry. Returns `None` if the key is absent or holds a
    /// different type.
    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Option<&T> {
        self.entries.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    /// Whether the key has been contributed.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of contributed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the scope is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.entries.keys().collect();
        keys.sort();
        f.debug_struct("RequestScope").field("keys", &keys).finish()
    }
}

/// An ordered unit of the context chain.
///
/// Steps run in registration order before middleware and handlers. Ordering
/// between steps is a configuration decision: when one step's contribution is
/// a prerequisite of another (bindings before principal resolution, for
/// example), the registration site must document and enforce that order.
#[async_trait]
pub trait ContextStep<Ctx>: Send + Sync
where
    Ctx: Clone + Send + Sync + 'static,
{
    /// Stable name used to attribute failures.
    fn name(&self) -> &'static str;

    /// Contribute this step's entries to the scope.
    async fn contribute(
        &self,
        app: &Ctx,
        request: &Request,
        scope: &mut RequestScope,
    ) -> RpcResult<()>;
}

/// Context wrapper giving handlers access to application state and the
/// per-request scope.
///
/// Cloning is cheap; both parts are behind `Arc`.
#[derive(Clone)]
pub struct Context<T: Clone + Send + Sync + 'static> {
    inner: Arc<T>,
    scope: Arc<RequestScope>,
}

impl<T: Clone + Send + Sync + 'static> Context<T> {
    /// Create a context with an empty request scope.
    pub fn new(ctx: T) -> Self {
        Self {
            inner: Arc::new(ctx),
            scope: Arc::new(RequestScope::new()),
        }
    }

    /// Create a context carrying an already-built request scope.
    ///
    /// The scope is frozen at this point; handlers and middleware read it but
    /// cannot extend it.
    pub fn with_scope(ctx: T, scope: RequestScope) -> Self {
        Self {
            inner: Arc::new(ctx),
            scope: Arc::new(scope),
        }
    }

    /// Get a reference to the application state.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Get the Arc for sharing.
    pub fn arc(&self) -> Arc<T> {
        self.inner.clone()
    }

    /// The per-request scope built by the context chain.
    pub fn scope(&self) -> &RequestScope {
        &self.scope
    }
}

impl<T: Clone + Send + Sync + 'static> std::ops::Deref for Context<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T: Clone + Send + Sync + 'static + Default> Default for Context<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Empty context for routers that don't need state
#[derive(Clone, Default, Debug)]
pub struct EmptyContext;

/// Cooperative cancellation handle.
///
/// The transport seeds one into the request scope and cancels it when the
/// request is abandoned, so collaborators can check it before committing side
/// effects.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a fresh, non-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the token cancelled. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether the request has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Guard that cancels the token when dropped.
    ///
    /// Held across the dispatch await at the transport: if the connection is
    /// dropped the request future is dropped too, the guard fires, and any
    /// in-flight work observing the token stops.
    pub fn drop_guard(&self) -> CancelGuard {
        CancelGuard(self.clone())
    }
}

/// Cancels its token on drop. See [`CancelToken::drop_guard`].
pub struct CancelGuard(CancelToken);

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.0.cancel();
    }
}
