//! Onion-style call interception.
//!
//! A middleware unit sees the call on its way in, decides whether to run the
//! rest of the chain through [`Next`], and sees the result on its way out. It
//! may short-circuit with a response (serving from a cache) or an error
//! (rejecting an unauthenticated caller) without the handler ever running.
//!
//! Chains are compiled once per procedure at build time: [`Next::terminal`]
//! seats the procedure's handler at the centre and [`Next::wrap`] folds each
//! unit around it, outermost last.

use crate::handler::BoxedHandler;
use crate::{Context, RpcResult};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// JSON payload produced by a handler or a middleware short-circuit.
pub type Response = serde_json::Value;

type CallFuture = Pin<Box<dyn Future<Output = RpcResult<Response>> + Send>>;

/// Whether a procedure reads or writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcedureType {
    Query,
    Mutation,
}

impl ProcedureType {
    pub fn is_mutation(self) -> bool {
        matches!(self, Self::Mutation)
    }
}

impl fmt::Display for ProcedureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
        })
    }
}

/// The call as middleware observes it: the resolved dotted path, the
/// procedure kind, and the raw JSON input.
#[derive(Clone, Debug)]
pub struct Request {
    pub path: String,
    pub procedure_type: ProcedureType,
    pub input: serde_json::Value,
}

impl Request {
    pub(crate) fn new(
        path: impl Into<String>,
        procedure_type: ProcedureType,
        input: serde_json::Value,
    ) -> Self {
        Self {
            path: path.into(),
            procedure_type,
            input,
        }
    }

    /// First path segment, e.g. `auth` for `auth.invite`.
    pub fn namespace(&self) -> Option<&str> {
        self.path.split('.').next()
    }

    /// Last path segment, e.g. `invite` for `auth.invite`.
    pub fn procedure(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }
}

/// Middleware unit: receives the context, the request, and the continuation
/// for the rest of the chain.
pub type MiddlewareFn<Ctx> =
    Arc<dyn Fn(Context<Ctx>, Request, Next<Ctx>) -> CallFuture + Send + Sync>;

/// Continuation running the remainder of a compiled chain.
///
/// Calling [`run`](Next::run) hands the request to the next unit inward, or
/// to the handler when this is the innermost link. Dropping it instead
/// short-circuits the call.
pub struct Next<Ctx: Clone + Send + Sync + 'static> {
    inner: Arc<dyn Fn(Context<Ctx>, Request) -> CallFuture + Send + Sync>,
}

impl<Ctx: Clone + Send + Sync + 'static> Clone for Next<Ctx> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<Ctx: Clone + Send + Sync + 'static> Next<Ctx> {
    /// The innermost continuation: the procedure's own handler.
    pub(crate) fn terminal(handler: BoxedHandler<Ctx>) -> Self {
        Self {
            inner: Arc::new(move |ctx, req| {
                let handler = handler.clone();
                Box::pin(async move { (handler)(ctx, req.input).await })
            }),
        }
    }

    /// Fold one middleware unit around an existing continuation.
    pub(crate) fn wrap(unit: MiddlewareFn<Ctx>, next: Next<Ctx>) -> Self {
        Self {
            inner: Arc::new(move |ctx, req| {
                let unit = unit.clone();
                let next = next.clone();
                Box::pin(async move { (unit)(ctx, req, next).await })
            }),
        }
    }

    /// Run the rest of the chain.
    pub async fn run(self, ctx: Context<Ctx>, req: Request) -> RpcResult<Response> {
        (self.inner)(ctx, req).await
    }
}

/// Adapt an async function into a [`MiddlewareFn`].
///
/// # Example
/// ```rust,ignore
/// async fn logging<Ctx>(ctx: Context<Ctx>, req: Request, next: Next<Ctx>) -> RpcResult<Response> {
///     tracing::debug!(path = %req.path, "rpc call");
///     next.run(ctx, req).await
/// }
/// ```
pub fn from_fn<Ctx, F, Fut>(f: F) -> MiddlewareFn<Ctx>
where
    Ctx: Clone + Send + Sync + 'static,
    F: Fn(Context<Ctx>, Request, Next<Ctx>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RpcResult<Response>> + Send + 'static,
{
    Arc::new(move |ctx, req, next| Box::pin(f(ctx, req, next)))
}
