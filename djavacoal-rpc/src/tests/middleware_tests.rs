//! Middleware chain tests
//!
//! Onion-model execution order, early return, error propagation, and the
//! scoping rule: middleware wraps only the builder it was registered on
//! (including merged children), never a parent's other procedures.

use proptest::prelude::*;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::context::RequestScope;
use crate::middleware::{Next, Request, Response};
use crate::{Context, RouterBuilder, RpcError, RpcResult};

/// A simple context for testing
#[derive(Clone, Default)]
struct TestContext {
    /// Tracks the order of middleware execution
    execution_log: Arc<Mutex<Vec<String>>>,
}

type MwFuture = Pin<Box<dyn std::future::Future<Output = RpcResult<Response>> + Send>>;

fn logging_middleware(
    name: &'static str,
) -> impl Fn(Context<TestContext>, Request, Next<TestContext>) -> MwFuture + Send + Sync + 'static {
    move |ctx: Context<TestContext>, req: Request, next: Next<TestContext>| {
        Box::pin(async move {
            ctx.inner()
                .execution_log
                .lock()
                .await
                .push(format!("{}_enter", name));

            let result = next.run(ctx.clone(), req).await;

            ctx.inner()
                .execution_log
                .lock()
                .await
                .push(format!("{}_exit", name));

            result
        })
    }
}

async fn logging_handler(ctx: Context<TestContext>, _input: ()) -> RpcResult<String> {
    ctx.inner().execution_log.lock().await.push("handler".to_string());
    Ok("success".to_string())
}

async fn log_of(ctx: &TestContext) -> Vec<String> {
    ctx.execution_log.lock().await.clone()
}

#[tokio::test]
async fn middleware_executes_in_onion_order() {
    let ctx = TestContext::default();
    let router = RouterBuilder::new()
        .context(ctx.clone())
        .middleware(logging_middleware("outer"))
        .middleware(logging_middleware("inner"))
        .query("test", logging_handler)
        .build()
        .unwrap();

    router
        .call("test", serde_json::Value::Null, RequestScope::new())
        .await
        .unwrap();

    assert_eq!(
        log_of(&ctx).await,
        vec!["outer_enter", "inner_enter", "handler", "inner_exit", "outer_exit"]
    );
}

#[tokio::test]
async fn child_middleware_wraps_only_child_procedures() {
    let ctx = TestContext::default();

    let child = RouterBuilder::new()
        .middleware(logging_middleware("child"))
        .query("inner", logging_handler);

    let router = RouterBuilder::new()
        .context(ctx.clone())
        .query("outer", logging_handler)
        .merge("ns", child)
        .build()
        .unwrap();

    // Sibling procedure: the child's middleware must not fire.
    router
        .call("outer", serde_json::Value::Null, RequestScope::new())
        .await
        .unwrap();
    assert_eq!(log_of(&ctx).await, vec!["handler"]);

    ctx.execution_log.lock().await.clear();

    // Child procedure: the child's middleware fires.
    router
        .call("ns.inner", serde_json::Value::Null, RequestScope::new())
        .await
        .unwrap();
    assert_eq!(log_of(&ctx).await, vec!["child_enter", "handler", "child_exit"]);
}

#[tokio::test]
async fn parent_middleware_wraps_merged_children() {
    let ctx = TestContext::default();

    let child = RouterBuilder::new()
        .middleware(logging_middleware("child"))
        .query("inner", logging_handler);

    let router = RouterBuilder::new()
        .context(ctx.clone())
        .middleware(logging_middleware("parent"))
        .merge("ns", child)
        .build()
        .unwrap();

    router
        .call("ns.inner", serde_json::Value::Null, RequestScope::new())
        .await
        .unwrap();

    assert_eq!(
        log_of(&ctx).await,
        vec!["parent_enter", "child_enter", "handler", "child_exit", "parent_exit"]
    );
}

#[tokio::test]
async fn early_return_skips_handler() {
    let ctx = TestContext::default();
    let router = RouterBuilder::new()
        .context(ctx.clone())
        .middleware(|ctx: Context<TestContext>, _req, _next| async move {
            ctx.inner().execution_log.lock().await.push("short_circuit".to_string());
            Ok(serde_json::json!("cached"))
        })
        .query("test", logging_handler)
        .build()
        .unwrap();

    let result = router
        .call("test", serde_json::Value::Null, RequestScope::new())
        .await
        .unwrap();

    assert_eq!(result, serde_json::json!("cached"));
    assert_eq!(log_of(&ctx).await, vec!["short_circuit"]);
}

#[tokio::test]
async fn middleware_error_propagates_and_skips_handler() {
    let ctx = TestContext::default();
    let router = RouterBuilder::new()
        .context(ctx.clone())
        .middleware(|_ctx: Context<TestContext>, _req, _next| async move {
            Err(RpcError::forbidden("no entry"))
        })
        .query("test", logging_handler)
        .build()
        .unwrap();

    let err = router
        .call("test", serde_json::Value::Null, RequestScope::new())
        .await
        .unwrap_err();

    assert_eq!(err.message, "no entry");
    assert!(log_of(&ctx).await.is_empty());
}

#[tokio::test]
async fn middleware_observes_request_path() {
    let ctx = TestContext::default();
    let router = RouterBuilder::new()
        .context(ctx.clone())
        .middleware(|ctx: Context<TestContext>, req: Request, next: Next<TestContext>| async move {
            ctx.inner().execution_log.lock().await.push(req.path.clone());
            next.run(ctx, req).await
        })
        .merge("auth", RouterBuilder::new().query("list", logging_handler))
        .build()
        .unwrap();

    router
        .call("auth.list", serde_json::Value::Null, RequestScope::new())
        .await
        .unwrap();

    assert_eq!(log_of(&ctx).await, vec!["auth.list", "handler"]);
}

proptest! {
    /// Middleware registered in any order executes enter phases in that
    /// order and exit phases in reverse.
    #[test]
    fn prop_chain_order_is_onion(count in 1usize..6) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let ctx = TestContext::default();
            let names: Vec<&'static str> = ["a", "b", "c", "d", "e"][..count].to_vec();

            let mut builder = RouterBuilder::new().context(ctx.clone());
            for name in &names {
                builder = builder.middleware(logging_middleware(name));
            }
            let router = builder.query("test", logging_handler).build().unwrap();

            router
                .call("test", serde_json::Value::Null, RequestScope::new())
                .await
                .unwrap();

            let mut expected: Vec<String> =
                names.iter().map(|n| format!("{}_enter", n)).collect();
            expected.push("handler".to_string());
            expected.extend(names.iter().rev().map(|n| format!("{}_exit", n)));

            prop_assert_eq!(log_of(&ctx).await, expected);
            Ok(())
        })?;
    }
}
