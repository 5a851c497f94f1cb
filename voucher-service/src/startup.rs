//! Application startup and lifecycle management.

use crate::config::VoucherConfig;
use crate::handlers;
use crate::middleware::http_metrics_middleware;
use crate::services::{init_metrics, Database, LedgerSettings, VoucherLedger};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::tracing::request_id_middleware;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: VoucherConfig,
    pub ledger: VoucherLedger,
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    http_listener: TcpListener,
    db: Database,
    state: AppState,
}

impl Application {
    /// Open the store, apply migrations and bind the listener.
    pub async fn build(config: VoucherConfig) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::connect(&config.database).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to open SQLite database");
            e
        })?;

        db.run_migrations().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            e
        })?;

        let ledger = VoucherLedger::new(
            Arc::new(db.clone()),
            LedgerSettings::from(&config.issuance),
        );

        let state = AppState {
            config: config.clone(),
            ledger,
        };

        let http_addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let http_listener = TcpListener::bind(http_addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %http_addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        tracing::info!(
            http_port = http_port,
            database = %config.database.path().display(),
            "Voucher service listener bound"
        );

        Ok(Self {
            http_port,
            http_listener,
            db,
            state,
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    /// Get a reference to the database.
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Run the application until the process is killed.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves, drain in-flight requests, then close the store.
    pub async fn run_until<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let service_name = self.state.config.service_name.clone();
        let router = build_router(self.state);

        tracing::info!(
            service = %service_name,
            version = env!("CARGO_PKG_VERSION"),
            http_port = self.http_port,
            "Service ready to accept connections"
        );

        let result = axum::serve(self.http_listener, router)
            .with_graceful_shutdown(shutdown)
            .await;

        self.db.close().await;

        if let Err(e) = result {
            tracing::error!(error = %e, "HTTP server error");
            return Err(std::io::Error::other(format!("HTTP server error: {}", e)));
        }

        Ok(())
    }
}

pub fn build_router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/", get(handlers::index))
        .route("/healthz", get(handlers::healthz))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .route("/api/voucher", post(handlers::issue_voucher))
        .route("/api/voucher/:id", get(handlers::get_voucher))
        .route("/api/voucher/:id/redeem", post(handlers::redeem_voucher))
        .fallback_service(static_files)
        .layer(middleware::from_fn(http_metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}
