//! HTTP boundary tests
//!
//! URL-to-procedure mapping, input decoding per method, scope seeding, and
//! status mapping for dispatch outcomes.

use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use serde_json::json;

use crate::context::{scope_keys, CancelToken};
use crate::serve::{bearer_token, decode_request_input, dispatch, path_to_procedure};
use crate::{Context, EmptyContext, Router, RouterBuilder, RpcError};

fn test_router() -> Router<EmptyContext> {
    let auth = RouterBuilder::new()
        .query("whoami", |ctx: Context<EmptyContext>, _input: ()| async move {
            Ok::<_, RpcError>(ctx.scope().get::<String>(scope_keys::AUTH_TOKEN).cloned())
        })
        .mutation("invite", |_ctx: Context<EmptyContext>, input: serde_json::Value| async move {
            Ok::<_, RpcError>(input)
        });

    RouterBuilder::new()
        .context(EmptyContext)
        .query("health", |_ctx: Context<EmptyContext>, _input: ()| async move {
            Ok::<_, RpcError>("ok".to_string())
        })
        .query("cancel_state", |ctx: Context<EmptyContext>, _input: ()| async move {
            let token = ctx
                .scope()
                .get::<CancelToken>(scope_keys::CANCEL)
                .ok_or_else(|| RpcError::internal("cancel token missing"))?;
            Ok::<_, RpcError>(token.is_cancelled())
        })
        .merge("auth", auth)
        .build()
        .unwrap()
}

#[test]
fn url_tail_maps_to_dotted_procedure() {
    assert_eq!(path_to_procedure("health"), "health");
    assert_eq!(path_to_procedure("auth/invite"), "auth.invite");
    assert_eq!(path_to_procedure("/auth/admins/list/"), "auth.admins.list");
}

#[test]
fn input_decoding_per_method() {
    // GET reads the query parameter.
    let input = decode_request_input(&Method::GET, Some(r#"{"page":2}"#), &[]).unwrap();
    assert_eq!(input, json!({"page": 2}));

    // Missing query parameter is null.
    let input = decode_request_input(&Method::GET, None, &[]).unwrap();
    assert_eq!(input, serde_json::Value::Null);

    // POST reads the body.
    let input = decode_request_input(&Method::POST, None, br#"{"to":"a@b.co"}"#).unwrap();
    assert_eq!(input, json!({"to": "a@b.co"}));

    // Empty body is null.
    let input = decode_request_input(&Method::DELETE, None, &[]).unwrap();
    assert_eq!(input, serde_json::Value::Null);

    // Malformed JSON is a bad request on either side.
    assert!(decode_request_input(&Method::GET, Some("{nope"), &[]).is_err());
    assert!(decode_request_input(&Method::POST, None, b"{nope").is_err());
}

#[test]
fn bearer_token_extraction() {
    let mut headers = HeaderMap::new();
    assert_eq!(bearer_token(&headers), None);

    headers.insert(
        axum::http::header::AUTHORIZATION,
        HeaderValue::from_static("Bearer secret-token"),
    );
    assert_eq!(bearer_token(&headers), Some("secret-token".to_string()));

    headers.insert(
        axum::http::header::AUTHORIZATION,
        HeaderValue::from_static("Basic dXNlcjpwYXNz"),
    );
    assert_eq!(bearer_token(&headers), None);
}

#[tokio::test]
async fn dispatch_returns_ok_for_known_procedure() {
    let router = test_router();
    let (status, value) = dispatch(&router, "health", serde_json::Value::Null, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value, json!("ok"));
}

#[tokio::test]
async fn unknown_procedure_is_404() {
    let router = test_router();
    let (status, value) = dispatch(&router, "no.such.procedure", serde_json::Value::Null, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(value["error"]["code"], json!("PROCEDURE_NOT_FOUND"));
}

#[tokio::test]
async fn auth_token_is_seeded_into_the_scope() {
    let router = test_router();

    let (status, value) = dispatch(
        &router,
        "auth.whoami",
        serde_json::Value::Null,
        Some("secret".to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value, json!("secret"));

    // Without a header the entry is absent, not empty.
    let (_, value) = dispatch(&router, "auth.whoami", serde_json::Value::Null, None).await;
    assert_eq!(value, serde_json::Value::Null);
}

#[tokio::test]
async fn cancel_token_is_seeded_and_live_during_dispatch() {
    let router = test_router();
    let (status, value) = dispatch(&router, "cancel_state", serde_json::Value::Null, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value, json!(false), "token must be present and not yet cancelled");
}

#[tokio::test]
async fn mutation_echoes_body_input() {
    let router = test_router();
    let (status, value) = dispatch(&router, "auth.invite", json!({"to": "a@b.co"}), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value, json!({"to": "a@b.co"}));
}
