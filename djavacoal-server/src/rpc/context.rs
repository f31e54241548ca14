//! Application context and collaborator traits.
//!
//! All side-effecting collaborators (admin directory, mailer, principal
//! resolver) are explicit dependency objects injected into [`AppContext`] at
//! startup and substitutable in tests. Handlers never reach for ambient
//! globals.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use djavacoal_rpc::{RpcError, RpcResult};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Lifecycle of an admin account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminStatus {
    /// Invited by email, not yet activated
    Invited,
    /// Activated and able to sign in
    Active,
}

/// An admin account as exposed over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub status: AdminStatus,
    /// Unix timestamp of the invitation.
    pub invited_at: u64,
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Persistence seam for admin accounts.
#[async_trait]
pub trait AdminDirectory: Send + Sync {
    /// All known admins, invitation order.
    async fn list(&self) -> RpcResult<Vec<Admin>>;

    /// Look up an admin by email.
    async fn find_by_email(&self, email: &str) -> RpcResult<Option<Admin>>;

    /// Record a new invitation under an opaque activation token.
    ///
    /// An already-invited email is a `Conflict`.
    async fn invite(&self, email: &str, token: &str) -> RpcResult<Admin>;

    /// Activate the invitation matching `token`, recording the admin's name.
    ///
    /// An unknown or spent token is a `NotFound`.
    async fn activate(&self, token: &str, name: &str) -> RpcResult<Admin>;

    /// Remove the admin with this id. Unknown ids are a `NotFound`.
    async fn remove(&self, id: &str) -> RpcResult<()>;
}

struct Record {
    admin: Admin,
    /// Activation token, cleared once the invitation is accepted.
    token: Option<String>,
}

/// In-memory [`AdminDirectory`] used at runtime and in tests.
#[derive(Default)]
pub struct InMemoryDirectory {
    records: Arc<Mutex<Vec<Record>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an invited admin, returning the activation token.
    pub async fn with_invited(&self, email: &str) -> String {
        let token = uuid::Uuid::now_v7().to_string();
        let mut records = self.records.lock().await;
        records.push(Record {
            admin: Admin {
                id: uuid::Uuid::now_v7().to_string(),
                email: email.to_string(),
                name: None,
                status: AdminStatus::Invited,
                invited_at: now_unix(),
            },
            token: Some(token.clone()),
        });
        token
    }
}

#[async_trait]
impl AdminDirectory for InMemoryDirectory {
    async fn list(&self) -> RpcResult<Vec<Admin>> {
        let records = self.records.lock().await;
        Ok(records.iter().map(|r| r.admin.clone()).collect())
    }

    async fn find_by_email(&self, email: &str) -> RpcResult<Option<Admin>> {
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .find(|r| r.admin.email == email)
            .map(|r| r.admin.clone()))
    }

    async fn invite(&self, email: &str, token: &str) -> RpcResult<Admin> {
        let mut records = self.records.lock().await;
        if records.iter().any(|r| r.admin.email == email) {
            return Err(RpcError::conflict(format!(
                "Admin '{}' has already been invited",
                email
            )));
        }

        let admin = Admin {
            id: uuid::Uuid::now_v7().to_string(),
            email: email.to_string(),
            name: None,
            status: AdminStatus::Invited,
            invited_at: now_unix(),
        };
        records.push(Record {
            admin: admin.clone(),
            token: Some(token.to_string()),
        });
        Ok(admin)
    }

    async fn activate(&self, token: &str, name: &str) -> RpcResult<Admin> {
        let mut records = self.records.lock().await;
        let record = records
            .iter_mut()
            .find(|r| r.token.as_deref() == Some(token))
            .ok_or_else(|| RpcError::not_found("Invitation token not found"))?;

        record.admin.name = Some(name.to_string());
        record.admin.status = AdminStatus::Active;
        record.token = None;
        Ok(record.admin.clone())
    }

    async fn remove(&self, id: &str) -> RpcResult<()> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|r| r.admin.id != id);
        if records.len() == before {
            return Err(RpcError::not_found(format!("Admin '{}' not found", id)));
        }
        Ok(())
    }
}

/// Outbound email seam.
///
/// Send failures carry the operation name but never the message body.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> RpcResult<()>;
}

/// Mailer that logs instead of delivering. Used when no provider is wired.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> RpcResult<()> {
        tracing::info!(to = %to, subject = %subject, "outbound email");
        Ok(())
    }
}

/// A message recorded by [`OutboxMailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Recording mailer for tests.
#[derive(Default)]
pub struct OutboxMailer {
    sent: Arc<Mutex<Vec<SentMail>>>,
}

impl OutboxMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything sent so far.
    pub async fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> RpcResult<()> {
        self.sent.lock().await.push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub email: String,
}

/// Maps opaque bearer tokens onto principals.
#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> RpcResult<Option<Principal>>;
}

/// Resolver backed by a single configured token.
pub struct StaticTokenResolver {
    token: String,
    principal: Principal,
}

impl StaticTokenResolver {
    pub fn new(token: impl Into<String>, principal: Principal) -> Self {
        Self {
            token: token.into(),
            principal,
        }
    }
}

#[async_trait]
impl PrincipalResolver for StaticTokenResolver {
    async fn resolve(&self, token: &str) -> RpcResult<Option<Principal>> {
        if token == self.token {
            Ok(Some(self.principal.clone()))
        } else {
            Ok(None)
        }
    }
}

/// Named platform resources (database, mail provider, storage) keyed by name.
///
/// Handlers access resources only through the names injected per request; the
/// handles themselves are opaque strings owned by the platform layer.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    handles: HashMap<String, String>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "This method returns a new Bindings and does not modify self"]
    pub fn with(mut self, name: impl Into<String>, handle: impl Into<String>) -> Self {
        self.handles.insert(name.into(), handle.into());
        self
    }

    /// The handle bound under `name`, if any.
    pub fn handle(&self, name: &str) -> Option<&str> {
        self.handles.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handles.contains_key(name)
    }
}

/// Application state shared by all handlers.
#[derive(Clone)]
pub struct AppContext {
    pub admins: Arc<dyn AdminDirectory>,
    pub mailer: Arc<dyn Mailer>,
    pub resolver: Arc<dyn PrincipalResolver>,
    pub bindings: Bindings,
    /// Destination mailbox for contact-form submissions.
    pub site_inbox: String,
}

impl AppContext {
    pub fn new(
        admins: Arc<dyn AdminDirectory>,
        mailer: Arc<dyn Mailer>,
        resolver: Arc<dyn PrincipalResolver>,
        bindings: Bindings,
        site_inbox: impl Into<String>,
    ) -> Self {
        Self {
            admins,
            mailer,
            resolver,
            bindings,
            site_inbox: site_inbox.into(),
        }
    }
}
