//! Djavacoal site backend.
//!
//! Assembles the application context and RPC router, then serves every
//! procedure over HTTP under `/rpc/{*path}` with CORS and graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header::CONTENT_TYPE, Method};
use djavacoal_rpc::router::DynRouter;
use djavacoal_rpc::serve::http_router;
use tokio::net::TcpListener;
use tokio::signal::{
    ctrl_c,
    unix::{signal, SignalKind},
};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub mod config;
pub mod rpc;

use config::Config;
use rpc::context::{Bindings, InMemoryDirectory, LogMailer, Principal, StaticTokenResolver};
use rpc::{create_router, AppContext};

/// Build the runtime application context from configuration.
pub fn runtime_context(config: &Config) -> AppContext {
    let mut bindings = Bindings::new();
    for name in &config.bindings {
        bindings = bindings.with(name.clone(), format!("{}:local", name));
    }

    AppContext::new(
        Arc::new(InMemoryDirectory::new()),
        Arc::new(LogMailer),
        Arc::new(StaticTokenResolver::new(
            config.admin_token.clone(),
            Principal {
                id: "root".to_string(),
                email: config.admin_email.clone(),
            },
        )),
        bindings,
        config.site_inbox.clone(),
    )
}

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Config::load();

    info!("Composing router...");
    let router = create_router(runtime_context(&config))
        .expect("router composition failed: duplicate or malformed procedure path");
    info!(procedures = ?router.procedures(), "Router ready");

    let rpc: Arc<dyn DynRouter> = Arc::new(router);

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let app = http_router(rpc).layer(cors);

    let address = format!("0.0.0.0:{}", config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    info!("Server shutting down");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
