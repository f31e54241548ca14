//! Handler traits and utilities

use crate::validation::Validate;
use crate::{Context, RpcError, RpcResult};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed handler for type erasure
pub(crate) type BoxedHandler<Ctx> = Arc<
    dyn Fn(Context<Ctx>, serde_json::Value) -> Pin<Box<dyn Future<Output = RpcResult<serde_json::Value>> + Send>>
        + Send
        + Sync,
>;

/// Trait for handler functions
///
/// Automatically implemented for async functions with the signature:
/// `async fn(Context<Ctx>, Input) -> RpcResult<Output>`
pub trait Handler<Ctx, Input, Output>: Clone + Send + Sync + 'static
where
    Ctx: Clone + Send + Sync + 'static,
    Input: DeserializeOwned + Send + 'static,
    Output: Serialize + Send + 'static,
{
    /// The future type returned by the handler
    type Future: Future<Output = RpcResult<Output>> + Send;

    /// Call the handler with context and input
    fn call(&self, ctx: Context<Ctx>, input: Input) -> Self::Future;
}

// Implement Handler for async functions
impl<Ctx, Input, Output, F, Fut> Handler<Ctx, Input, Output> for F
where
    Ctx: Clone + Send + Sync + 'static,
    Input: DeserializeOwned + Send + 'static,
    Output: Serialize + Send + 'static,
    F: Fn(Context<Ctx>, Input) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = RpcResult<Output>> + Send + 'static,
{
    type Future = Fut;

    fn call(&self, ctx: Context<Ctx>, input: Input) -> Self::Future {
        (self)(ctx, input)
    }
}

/// Decode the wire input into the handler's input type.
///
/// Missing input arrives as JSON `null`. Unit inputs decode from it directly;
/// struct inputs whose fields are all optional decode from an empty object
/// instead, so a bare GET can still reach a paginated query.
pub(crate) fn decode_input<Input: DeserializeOwned>(value: serde_json::Value) -> RpcResult<Input> {
    if value.is_null() {
        return serde_json::from_value(serde_json::Value::Null)
            .or_else(|_| serde_json::from_value(serde_json::json!({})))
            .map_err(|e| RpcError::bad_request(format!("Invalid input: {}", e)));
    }
    serde_json::from_value(value).map_err(|e| RpcError::bad_request(format!("Invalid input: {}", e)))
}

/// Convert a handler into a boxed handler for storage.
///
/// Output crosses the boundary through [`crate::wire::to_wire`], so a value
/// JSON cannot represent (a non-finite float) fails the call with a
/// serialization error instead of leaving as `null`.
pub(crate) fn into_boxed<Ctx, Input, Output, H>(handler: H) -> BoxedHandler<Ctx>
where
    Ctx: Clone + Send + Sync + 'static,
    Input: DeserializeOwned + Send + 'static,
    Output: Serialize + Send + 'static,
    H: Handler<Ctx, Input, Output>,
{
    Arc::new(move |ctx, input_value| {
        let handler = handler.clone();
        Box::pin(async move {
            let input: Input = decode_input(input_value)?;
            let output = handler.call(ctx, input).await?;
            crate::wire::to_wire(&output)
        })
    })
}

/// Convert a handler into a boxed handler that validates its input first.
///
/// Validation runs after deserialization and before the handler body, so a
/// payload failing its schema never reaches the handler and performs no side
/// effects.
pub(crate) fn into_boxed_validated<Ctx, Input, Output, H>(handler: H) -> BoxedHandler<Ctx>
where
    Ctx: Clone + Send + Sync + 'static,
    Input: DeserializeOwned + Validate + Send + 'static,
    Output: Serialize + Send + 'static,
    H: Handler<Ctx, Input, Output>,
{
    Arc::new(move |ctx, input_value| {
        let handler = handler.clone();
        Box::pin(async move {
            let input: Input = decode_input(input_value)?;

            let result = input.validate();
            if !result.is_valid() {
                return Err(RpcError::validation("Validation failed").with_details(
                    serde_json::to_value(result.errors()).unwrap_or_default(),
                ));
            }

            let output = handler.call(ctx, input).await?;
            crate::wire::to_wire(&output)
        })
    })
}
