//! Context chain tests
//!
//! Steps run in registration order, contribute insert-only scope entries,
//! and abort the request with an attributable error when they fail.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::context::{scope_keys, CancelToken, ContextStep, RequestScope};
use crate::middleware::Request;
use crate::{Context, EmptyContext, RouterBuilder, RpcError, RpcErrorCode, RpcResult};

struct InsertStep {
    name: &'static str,
    key: &'static str,
    value: i64,
}

#[async_trait]
impl ContextStep<EmptyContext> for InsertStep {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn contribute(
        &self,
        _app: &EmptyContext,
        _request: &Request,
        scope: &mut RequestScope,
    ) -> RpcResult<()> {
        scope.insert(self.key, self.value)
    }
}

struct FailingStep;

#[async_trait]
impl ContextStep<EmptyContext> for FailingStep {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn contribute(
        &self,
        _app: &EmptyContext,
        _request: &Request,
        _scope: &mut RequestScope,
    ) -> RpcResult<()> {
        Err(RpcError::unauthorized("token rejected"))
    }
}

async fn scope_keys_handler(ctx: Context<EmptyContext>, _input: ()) -> RpcResult<Vec<i64>> {
    let a = ctx.scope().get::<i64>("a").copied().unwrap_or(-1);
    let b = ctx.scope().get::<i64>("b").copied().unwrap_or(-1);
    Ok(vec![a, b])
}

#[tokio::test]
async fn steps_contribute_to_the_scope_in_order() {
    let router = RouterBuilder::new()
        .context(EmptyContext)
        .step(InsertStep { name: "a", key: "a", value: 1 })
        .step(InsertStep { name: "b", key: "b", value: 2 })
        .query("peek", scope_keys_handler)
        .build()
        .unwrap();

    let result = router
        .call("peek", serde_json::Value::Null, RequestScope::new())
        .await
        .unwrap();
    assert_eq!(result, serde_json::json!([1, 2]));
}

#[tokio::test]
async fn independent_steps_commute() {
    // Two steps with disjoint keys produce the same scope either way around.
    for (first, second) in [("a", "b"), ("b", "a")] {
        let router = RouterBuilder::new()
            .context(EmptyContext)
            .step(InsertStep { name: first, key: first, value: 1 })
            .step(InsertStep { name: second, key: second, value: 2 })
            .query("peek", |ctx: Context<EmptyContext>, _input: ()| async move {
                let mut entries = vec![
                    ctx.scope().contains("a"),
                    ctx.scope().contains("b"),
                ];
                entries.dedup();
                Ok::<_, RpcError>(entries == vec![true])
            })
            .build()
            .unwrap();

        let result = router
            .call("peek", serde_json::Value::Null, RequestScope::new())
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!(true));
    }
}

#[tokio::test]
async fn duplicate_contribution_aborts_the_request() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();

    let router = RouterBuilder::new()
        .context(EmptyContext)
        .step(InsertStep { name: "first", key: "k", value: 1 })
        .step(InsertStep { name: "second", key: "k", value: 2 })
        .query("peek", move |_ctx: Context<EmptyContext>, _input: ()| {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(serde_json::json!(true))
            }
        })
        .build()
        .unwrap();

    let err = router
        .call("peek", serde_json::Value::Null, RequestScope::new())
        .await
        .unwrap_err();

    assert_eq!(err.code, RpcErrorCode::ContextError);
    assert!(err.message.contains("second"), "error must name the step: {}", err.message);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failing_step_aborts_before_handler_and_names_itself() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();

    let router = RouterBuilder::new()
        .context(EmptyContext)
        .step(FailingStep)
        .query("peek", move |_ctx: Context<EmptyContext>, _input: ()| {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(serde_json::json!(true))
            }
        })
        .build()
        .unwrap();

    let err = router
        .call("peek", serde_json::Value::Null, RequestScope::new())
        .await
        .unwrap_err();

    assert_eq!(err.code, RpcErrorCode::ContextError);
    assert!(err.message.contains("failing"));
    assert!(err.message.contains("token rejected"));
    assert_eq!(calls.load(Ordering::SeqCst), 0, "failed chain must not reach the handler");
}

#[tokio::test]
async fn merged_child_steps_are_appended_after_parent_steps() {
    let child = RouterBuilder::new()
        .step(InsertStep { name: "b", key: "b", value: 2 })
        .query("peek", scope_keys_handler);

    let router = RouterBuilder::new()
        .context(EmptyContext)
        .step(InsertStep { name: "a", key: "a", value: 1 })
        .merge("ns", child)
        .build()
        .unwrap();

    let result = router
        .call("ns.peek", serde_json::Value::Null, RequestScope::new())
        .await
        .unwrap();
    assert_eq!(result, serde_json::json!([1, 2]));
}

#[tokio::test]
async fn transport_seed_is_visible_to_handlers() {
    let router = RouterBuilder::new()
        .context(EmptyContext)
        .query("whoami", |ctx: Context<EmptyContext>, _input: ()| async move {
            Ok::<_, RpcError>(ctx.scope().get::<String>(scope_keys::AUTH_TOKEN).cloned())
        })
        .build()
        .unwrap();

    let mut seed = RequestScope::new();
    seed.insert(scope_keys::AUTH_TOKEN, "secret".to_string()).unwrap();

    let result = router.call("whoami", serde_json::Value::Null, seed).await.unwrap();
    assert_eq!(result, serde_json::json!("secret"));
}

#[test]
fn scope_rejects_duplicate_keys() {
    let mut scope = RequestScope::new();
    scope.insert("k", 1i64).unwrap();
    let err = scope.insert("k", 2i64).unwrap_err();
    assert_eq!(err.code, RpcErrorCode::ContextError);
    // The original entry is untouched.
    assert_eq!(scope.get::<i64>("k"), Some(&1));
}

#[test]
fn scope_get_is_typed() {
    let mut scope = RequestScope::new();
    scope.insert("k", "text".to_string()).unwrap();
    assert_eq!(scope.get::<String>("k"), Some(&"text".to_string()));
    assert_eq!(scope.get::<i64>("k"), None);
}

#[test]
fn cancel_guard_fires_on_drop() {
    let token = CancelToken::new();
    assert!(!token.is_cancelled());
    {
        let _guard = token.drop_guard();
        assert!(!token.is_cancelled());
    }
    assert!(token.is_cancelled());
}
