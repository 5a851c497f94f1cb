use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
};

use crate::services::get_metrics;
use crate::startup::AppState;

/// Liveness probe that also touches the store.
pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    match state.ledger.ping().await {
        Ok(_) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed - database unavailable");
            (StatusCode::INTERNAL_SERVER_ERROR, "db error")
        }
    }
}

/// Readiness check endpoint for K8s readiness probes.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.ledger.ping().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Prometheus metrics endpoint.
pub async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

pub async fn index() -> Html<&'static str> {
    Html(
        r#"<!doctype html>
<html>
  <head><meta charset="utf-8"><title>Vouchers</title></head>
  <body>
    <h1>Vouchers</h1>
    <ul>
      <li><a href="/new.html">Issue a voucher</a></li>
      <li><a href="/verify.html">Verify a voucher</a></li>
      <li><a href="/redeem.html">Redeem a voucher</a></li>
    </ul>
  </body>
</html>
"#,
    )
}
