//! Common test utilities for voucher-service integration tests.

use service_core::config::Config as CoreConfig;
use std::sync::Once;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use voucher_service::config::{DatabaseConfig, IssuanceConfig, VoucherConfig};
use voucher_service::services::Database;
use voucher_service::startup::Application;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,voucher_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub struct TestApp {
    pub http_address: String,
    pub client: reqwest::Client,
    pub db: Database,
    shutdown: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<std::io::Result<()>>>,
    // Dropped last: holds the SQLite file and static dir.
    _dir: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        init_tracing();

        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let static_dir = dir.path().join("public");
        std::fs::create_dir_all(&static_dir).expect("Failed to create static dir");
        std::fs::write(
            static_dir.join("verify.html"),
            "<h1>Verify a voucher</h1>",
        )
        .expect("Failed to write static page");

        let config = VoucherConfig {
            common: CoreConfig { port: 0 },
            service_name: "voucher-service-test".to_string(),
            service_version: "test".to_string(),
            log_level: "debug".to_string(),
            otlp_endpoint: None,
            database: DatabaseConfig {
                dir: dir.path().join("db"),
                file: "vouchers.db".to_string(),
                max_connections: 4,
            },
            issuance: IssuanceConfig::default(),
            static_dir,
        };

        let app = Application::build(config)
            .await
            .expect("Failed to build application");

        let http_address = format!("http://127.0.0.1:{}", app.http_port());
        let db = app.db().clone();

        let (tx, rx) = oneshot::channel::<()>();
        let server = tokio::spawn(app.run_until(async move {
            rx.await.ok();
        }));

        let client = reqwest::Client::new();
        for _ in 0..50 {
            if client
                .get(format!("{}/healthz", http_address))
                .send()
                .await
                .is_ok()
            {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        }

        TestApp {
            http_address,
            client,
            db,
            shutdown: Some(tx),
            server: Some(server),
            _dir: dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.http_address, path)
    }

    pub async fn issue(&self, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url("/api/voucher"))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn fetch(&self, id: &str) -> reqwest::Response {
        self.client
            .get(self.url(&format!("/api/voucher/{}", id)))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn redeem(&self, id: &str, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/api/voucher/{}/redeem", id)))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Issue a voucher and return its JSON, asserting success.
    pub async fn issue_ok(&self, body: serde_json::Value) -> serde_json::Value {
        let response = self.issue(body).await;
        assert_eq!(response.status(), 200);
        response.json().await.expect("Failed to parse JSON")
    }

    /// Trigger graceful shutdown and wait for the server task.
    pub async fn shutdown(&mut self) -> std::io::Result<()> {
        if let Some(tx) = self.shutdown.take() {
            tx.send(()).ok();
        }
        match self.server.take() {
            Some(handle) => handle.await.expect("Server task panicked"),
            None => Ok(()),
        }
    }
}
