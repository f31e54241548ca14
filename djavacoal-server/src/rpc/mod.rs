//! RPC surface of the Djavacoal site backend.

pub mod context;
pub mod handlers;
pub mod steps;
pub mod types;

pub use context::AppContext;
pub use handlers::create_router;
