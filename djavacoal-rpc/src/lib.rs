//! Type-safe RPC layer with composable routers, an ordered context chain, and
//! a cached typed client.
//!
//! # Architecture
//!
//! - **Procedures** are async handlers registered on a [`RouterBuilder`] as
//!   queries or mutations under dot-separated paths.
//! - **Composition** merges child builders under namespaces; all paths are
//!   checked for well-formedness and uniqueness once, at
//!   [`RouterBuilder::build`], which fails fast on collisions.
//! - **Context chain**: ordered [`ContextStep`]s build an insert-only
//!   [`RequestScope`] before middleware and handlers run; a failing step
//!   aborts the request with an error naming the step.
//! - **Middleware** wraps procedures onion-style and is scoped to the builder
//!   it was registered on, including its merged children.
//! - **Client**: [`Client`] derives deterministic query keys, caches query
//!   results with TTL + LRU, and invalidates a mutation's namespace
//!   hierarchically.
//! - **HTTP**: [`serve`] exposes every procedure under `/rpc/{*path}` for any
//!   method.
//!
//! # Example
//!
//! ```rust,ignore
//! use djavacoal_rpc::{Context, RouterBuilder, RpcResult};
//!
//! async fn health(_ctx: Context<AppContext>, _input: ()) -> RpcResult<String> {
//!     Ok("ok".to_string())
//! }
//!
//! let router = RouterBuilder::new()
//!     .context(AppContext::new())
//!     .query("health", health)
//!     .merge("auth", admin_router())
//!     .build()?;
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod router;
pub mod serve;
pub mod types;
pub mod validation;
pub mod wire;

pub use client::{pattern_matches, query_key, CacheConfig, CacheStats, Client, QueryCache};
pub use config::RpcConfig;
pub use context::{
    scope_keys, CancelGuard, CancelToken, Context, ContextStep, EmptyContext, RequestScope,
};
pub use error::{RpcError, RpcErrorCode, RpcResult};
pub use handler::Handler;
pub use middleware::{from_fn, MiddlewareFn, Next, ProcedureType, Request, Response};
pub use router::{DynRouter, Router, RouterBuilder};
pub use types::{PaginatedResponse, PaginationInput, SuccessResponse};
pub use validation::{FieldError, Validate, ValidationResult, ValidationRules};
pub use wire::{from_wire, to_wire};

#[cfg(test)]
mod tests;
