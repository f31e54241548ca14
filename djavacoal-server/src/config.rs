//! Environment-driven configuration with logged fallbacks.

use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

pub struct Config {
    /// TCP port the HTTP server binds.
    pub port: u16,
    /// Bearer token accepted for the configured admin principal.
    pub admin_token: String,
    /// Email of the configured admin principal.
    pub admin_email: String,
    /// Destination mailbox for contact-form submissions.
    pub site_inbox: String,
    /// Names of platform bindings the router requires.
    pub bindings: Vec<String>,
}

impl Config {
    pub fn load() -> Self {
        let bindings: String = try_load("DJAVACOAL_BINDINGS", "db,mail");
        Self {
            port: try_load("DJAVACOAL_PORT", "8080"),
            admin_token: try_load("DJAVACOAL_ADMIN_TOKEN", "dev-admin-token"),
            admin_email: try_load("DJAVACOAL_ADMIN_EMAIL", "admin@djavacoal.com"),
            site_inbox: try_load("DJAVACOAL_SITE_INBOX", "info@djavacoal.com"),
            bindings: bindings
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}
