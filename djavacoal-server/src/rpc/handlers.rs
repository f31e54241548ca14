//! Procedure handlers and router assembly.
//!
//! The `auth` namespace is admin-guarded by [`require_admin`]; invitation
//! acceptance and the contact form are public. All composition-time checks
//! (path shape, collisions) happen in [`create_router`] at startup.

use std::time::Instant;

use djavacoal_rpc::context::{scope_keys, CancelToken};
use djavacoal_rpc::middleware::{Next, Request, Response};
use djavacoal_rpc::{
    Context, PaginatedResponse, PaginationInput, Router, RouterBuilder, RpcError, RpcErrorCode,
    RpcResult, SuccessResponse,
};

use super::context::{Admin, AppContext, Principal};
use super::steps::{keys, BindingsStep, PrincipalStep, RequestIdStep};
use super::types::{
    AcceptInvitationInput, ContactInput, HealthStatus, InviteAdminInput, RemoveAdminInput,
};

/// Liveness probe.
pub async fn health(_ctx: Context<AppContext>, _input: ()) -> RpcResult<HealthStatus> {
    Ok(HealthStatus::ok())
}

/// Invite a new admin by email.
///
/// Exactly one invitation email is sent per new invite. An address that was
/// already invited is a non-fatal duplicate: the call succeeds without
/// sending anything.
pub async fn invite_admin(
    ctx: Context<AppContext>,
    input: InviteAdminInput,
) -> RpcResult<SuccessResponse> {
    if let Some(cancel) = ctx.scope().get::<CancelToken>(scope_keys::CANCEL) {
        if cancel.is_cancelled() {
            return Err(RpcError::service_unavailable(
                "request cancelled before the invitation was recorded",
            ));
        }
    }

    let token = uuid::Uuid::now_v7().to_string();
    match ctx.admins.invite(&input.to, &token).await {
        Ok(_) => {}
        Err(err) if err.code == RpcErrorCode::Conflict => {
            tracing::info!(to = %input.to, "duplicate invitation ignored");
            return Ok(SuccessResponse::ok("already invited"));
        }
        Err(err) => return Err(err),
    }

    let body = format!(
        "You have been invited to manage the Djavacoal site.\n\
         Activate your account: {}?token={}",
        input.link, token
    );
    ctx.mailer
        .send(&input.to, "Djavacoal admin invitation", &body)
        .await
        .map_err(|err| {
            RpcError::internal("mailer failed for auth.invite").with_cause(err.to_string())
        })?;

    Ok(SuccessResponse::ok("invitation sent"))
}

/// Remove an admin by id.
pub async fn remove_admin(
    ctx: Context<AppContext>,
    input: RemoveAdminInput,
) -> RpcResult<SuccessResponse> {
    ctx.admins.remove(&input.id).await?;
    Ok(SuccessResponse::ok("admin removed"))
}

/// Paginated listing of all admins.
pub async fn list_admins(
    ctx: Context<AppContext>,
    input: PaginationInput,
) -> RpcResult<PaginatedResponse<Admin>> {
    let admins = ctx.admins.list().await?;
    let total = admins.len() as u32;
    let data: Vec<Admin> = admins
        .into_iter()
        .skip(input.offset() as usize)
        .take(input.limit() as usize)
        .collect();
    Ok(PaginatedResponse::new(data, total, input.page(), input.limit()))
}

/// Accept an invitation, activating the account.
///
/// Public: the invitee holds a token, not a session. The password policy is
/// enforced by validation; credential storage belongs to the identity
/// provider behind the platform bindings.
pub async fn accept_invitation(
    ctx: Context<AppContext>,
    input: AcceptInvitationInput,
) -> RpcResult<SuccessResponse> {
    let admin = ctx.admins.activate(&input.token, &input.name).await?;
    Ok(SuccessResponse::ok(format!(
        "account for {} activated",
        admin.email
    )))
}

/// Relay a contact-form submission to the site mailbox.
pub async fn submit_contact(
    ctx: Context<AppContext>,
    input: ContactInput,
) -> RpcResult<SuccessResponse> {
    let subject = format!("Contact form: {}", input.name);
    let body = format!("From: {} <{}>\n\n{}", input.name, input.email, input.message);
    ctx.mailer
        .send(&ctx.site_inbox, &subject, &body)
        .await
        .map_err(|err| {
            RpcError::internal("mailer failed for contact.submit").with_cause(err.to_string())
        })?;
    Ok(SuccessResponse::ok("message received"))
}

/// Reject calls without a resolved principal.
pub async fn require_admin(
    ctx: Context<AppContext>,
    req: Request,
    next: Next<AppContext>,
) -> RpcResult<Response> {
    if ctx.scope().get::<Principal>(keys::PRINCIPAL).is_none() {
        return Err(RpcError::unauthorized(format!(
            "'{}' requires an authenticated admin",
            req.path
        )));
    }
    next.run(ctx, req).await
}

/// Per-call structured log with duration and outcome.
///
/// Client errors are expected traffic and log at debug; server errors at
/// warn.
pub async fn logging(
    ctx: Context<AppContext>,
    req: Request,
    next: Next<AppContext>,
) -> RpcResult<Response> {
    let started = Instant::now();
    let path = req.path.clone();
    let procedure_type = req.procedure_type;
    let request_id = ctx
        .scope()
        .get::<String>(keys::REQUEST_ID)
        .cloned()
        .unwrap_or_default();

    let result = next.run(ctx, req).await;
    let elapsed_ms = started.elapsed().as_millis();

    match &result {
        Ok(_) => {
            tracing::info!(
                request_id = %request_id,
                path = %path,
                procedure_type = %procedure_type,
                elapsed_ms = %elapsed_ms,
                "rpc call completed"
            );
        }
        Err(err) if err.code.is_client_error() => {
            tracing::debug!(
                request_id = %request_id,
                path = %path,
                code = %err.code,
                elapsed_ms = %elapsed_ms,
                "rpc call rejected"
            );
        }
        Err(err) => {
            tracing::warn!(
                request_id = %request_id,
                path = %path,
                code = %err.code,
                elapsed_ms = %elapsed_ms,
                "rpc call failed"
            );
        }
    }

    result
}

/// Assemble the full application router.
///
/// Step order matters: bindings are contributed before principal resolution,
/// which reads them.
pub fn create_router(ctx: AppContext) -> RpcResult<Router<AppContext>> {
    let auth = RouterBuilder::new()
        .middleware(require_admin)
        .mutation_validated("invite", invite_admin)
        .mutation_validated("remove", remove_admin)
        .query("list", list_admins);

    let invitation = RouterBuilder::new().mutation_validated("accept", accept_invitation);

    let contact = RouterBuilder::new().mutation_validated("submit", submit_contact);

    RouterBuilder::new()
        .context(ctx)
        .step(RequestIdStep)
        .step(BindingsStep::require(["db", "mail"]))
        .step(PrincipalStep)
        .middleware(logging)
        .query("health", health)
        .merge("auth", auth)
        .merge("invitation", invitation)
        .merge("contact", contact)
        .build()
}
