//! End-to-end tests for the admin and contact procedures, driven through the
//! router and the HTTP dispatch boundary with recording collaborators.

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;

use djavacoal_rpc::context::{scope_keys, RequestScope};
use djavacoal_rpc::serve::dispatch;
use djavacoal_rpc::{Router, RpcErrorCode};
use djavacoal_server::rpc::context::{
    AdminDirectory, AdminStatus, AppContext, Bindings, InMemoryDirectory, OutboxMailer, Principal,
    StaticTokenResolver,
};
use djavacoal_server::rpc::create_router;

const ADMIN_TOKEN: &str = "test-admin-token";
const SITE_INBOX: &str = "info@djavacoal.com";

struct Harness {
    router: Router<AppContext>,
    directory: Arc<InMemoryDirectory>,
    outbox: Arc<OutboxMailer>,
}

fn harness() -> Harness {
    harness_with_bindings(Bindings::new().with("db", "db:test").with("mail", "mail:test"))
}

fn harness_with_bindings(bindings: Bindings) -> Harness {
    let directory = Arc::new(InMemoryDirectory::new());
    let outbox = Arc::new(OutboxMailer::new());

    let ctx = AppContext::new(
        directory.clone(),
        outbox.clone(),
        Arc::new(StaticTokenResolver::new(
            ADMIN_TOKEN,
            Principal {
                id: "root".to_string(),
                email: "root@djavacoal.com".to_string(),
            },
        )),
        bindings,
        SITE_INBOX,
    );

    Harness {
        router: create_router(ctx).expect("router must compose"),
        directory,
        outbox,
    }
}

fn admin_seed() -> RequestScope {
    let mut seed = RequestScope::new();
    seed.insert(scope_keys::AUTH_TOKEN, ADMIN_TOKEN.to_string())
        .unwrap();
    seed
}

#[tokio::test]
async fn invite_sends_exactly_one_email_with_recipient_and_link() {
    let h = harness();
    let input = json!({
        "to": "new.admin@djavacoal.com",
        "link": "https://djavacoal.com/admin/accept"
    });

    let result = h.router.call("auth.invite", input, admin_seed()).await.unwrap();
    assert_eq!(result["success"], json!(true));

    let sent = h.outbox.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "new.admin@djavacoal.com");
    assert!(
        sent[0].body.contains("https://djavacoal.com/admin/accept"),
        "invitation body must carry the activation link"
    );

    let admin = h
        .directory
        .find_by_email("new.admin@djavacoal.com")
        .await
        .unwrap()
        .expect("invite must record the admin");
    assert_eq!(admin.status, AdminStatus::Invited);
}

#[tokio::test]
async fn duplicate_invite_is_recovered_without_a_second_email() {
    let h = harness();
    let input = json!({
        "to": "dup@djavacoal.com",
        "link": "https://djavacoal.com/admin/accept"
    });

    h.router
        .call("auth.invite", input.clone(), admin_seed())
        .await
        .unwrap();
    let second = h.router.call("auth.invite", input, admin_seed()).await.unwrap();

    assert_eq!(second["success"], json!(true));
    assert_eq!(second["message"], json!("already invited"));
    assert_eq!(h.outbox.sent().await.len(), 1, "no email for the duplicate");
    assert_eq!(h.directory.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_invite_input_fails_before_any_side_effect() {
    let h = harness();
    let err = h
        .router
        .call(
            "auth.invite",
            json!({"to": "not-an-email", "link": "ftp://nope"}),
            admin_seed(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code, RpcErrorCode::ValidationError);
    assert!(h.outbox.sent().await.is_empty());
    assert!(h.directory.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn remove_with_empty_id_is_a_validation_failure_without_directory_calls() {
    let h = harness();
    let token = h.directory.with_invited("keep@djavacoal.com").await;
    let _ = token;

    let err = h
        .router
        .call("auth.remove", json!({"id": "  "}), admin_seed())
        .await
        .unwrap_err();

    assert_eq!(err.code, RpcErrorCode::ValidationError);
    assert_eq!(
        h.directory.list().await.unwrap().len(),
        1,
        "directory must be untouched"
    );
}

#[tokio::test]
async fn remove_deletes_the_admin() {
    let h = harness();
    h.directory.with_invited("gone@djavacoal.com").await;
    let id = h.directory.list().await.unwrap()[0].id.clone();

    let result = h
        .router
        .call("auth.remove", json!({"id": id}), admin_seed())
        .await
        .unwrap();
    assert_eq!(result["success"], json!(true));
    assert!(h.directory.list().await.unwrap().is_empty());

    // Removing again is a NotFound, not a silent success.
    let err = h
        .router
        .call("auth.remove", json!({"id": "missing"}), admin_seed())
        .await
        .unwrap_err();
    assert_eq!(err.code, RpcErrorCode::NotFound);
}

#[tokio::test]
async fn accept_invitation_enforces_the_password_policy() {
    let h = harness();
    let token = h.directory.with_invited("invitee@djavacoal.com").await;

    let err = h
        .router
        .call(
            "invitation.accept",
            json!({"token": token, "name": "Sari", "password": "short"}),
            RequestScope::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, RpcErrorCode::ValidationError);

    let admin = h
        .directory
        .find_by_email("invitee@djavacoal.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(admin.status, AdminStatus::Invited, "failed accept must not activate");
}

#[tokio::test]
async fn accept_invitation_activates_the_account() {
    let h = harness();
    let token = h.directory.with_invited("invitee@djavacoal.com").await;

    // Public procedure: no auth seed required.
    let result = h
        .router
        .call(
            "invitation.accept",
            json!({"token": token, "name": "Sari", "password": "longenough"}),
            RequestScope::new(),
        )
        .await
        .unwrap();
    assert_eq!(result["success"], json!(true));

    let admin = h
        .directory
        .find_by_email("invitee@djavacoal.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(admin.status, AdminStatus::Active);
    assert_eq!(admin.name.as_deref(), Some("Sari"));

    // A spent token cannot be replayed.
    let err = h
        .router
        .call(
            "invitation.accept",
            json!({"token": "stale", "name": "X Y", "password": "longenough"}),
            RequestScope::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, RpcErrorCode::NotFound);
}

#[tokio::test]
async fn list_is_paginated() {
    let h = harness();
    for i in 0..5 {
        h.directory
            .with_invited(&format!("admin{}@djavacoal.com", i))
            .await;
    }

    let result = h
        .router
        .call("auth.list", json!({"page": 2, "limit": 2}), admin_seed())
        .await
        .unwrap();

    assert_eq!(result["total"], json!(5));
    assert_eq!(result["page"], json!(2));
    assert_eq!(result["totalPages"], json!(3));
    let data = result["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["email"], json!("admin2@djavacoal.com"));
}

#[tokio::test]
async fn guarded_namespace_rejects_unauthenticated_callers() {
    let h = harness();

    let err = h
        .router
        .call(
            "auth.list",
            serde_json::Value::Null,
            RequestScope::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, RpcErrorCode::Unauthorized);

    // Wrong token resolves to no principal and is rejected the same way.
    let mut seed = RequestScope::new();
    seed.insert(scope_keys::AUTH_TOKEN, "wrong-token".to_string())
        .unwrap();
    let err = h
        .router
        .call("auth.list", serde_json::Value::Null, seed)
        .await
        .unwrap_err();
    assert_eq!(err.code, RpcErrorCode::Unauthorized);
}

#[tokio::test]
async fn missing_binding_aborts_the_chain_before_handlers() {
    let h = harness_with_bindings(Bindings::new().with("db", "db:test"));

    let err = h
        .router
        .call("health", serde_json::Value::Null, RequestScope::new())
        .await
        .unwrap_err();

    assert_eq!(err.code, RpcErrorCode::ContextError);
    assert!(err.message.contains("bindings"), "error must name the step: {}", err.message);
}

#[tokio::test]
async fn contact_submission_is_relayed_to_the_site_inbox() {
    let h = harness();

    let result = h
        .router
        .call(
            "contact.submit",
            json!({
                "name": "Buyer",
                "email": "buyer@example.com",
                "message": "Interested in a container of briquettes."
            }),
            RequestScope::new(),
        )
        .await
        .unwrap();
    assert_eq!(result["success"], json!(true));

    let sent = h.outbox.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, SITE_INBOX);
    assert!(sent[0].body.contains("buyer@example.com"));
}

#[tokio::test]
async fn http_dispatch_maps_unknown_paths_to_404() {
    let h = harness();

    let (status, value) = dispatch(&h.router, "no.such.thing", serde_json::Value::Null, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(value["error"]["code"], json!("PROCEDURE_NOT_FOUND"));
    assert!(h.outbox.sent().await.is_empty());
}

#[tokio::test]
async fn http_dispatch_seeds_the_bearer_token() {
    let h = harness();

    let (status, value) = dispatch(
        &h.router,
        "auth.list",
        serde_json::Value::Null,
        Some(ADMIN_TOKEN.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["total"], json!(0));

    let (status, _) = dispatch(&h.router, "auth.list", serde_json::Value::Null, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
