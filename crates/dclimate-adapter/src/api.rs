//! HTTP surface.
//!
//! `POST /api` takes a request envelope and always answers 200 with the
//! adapter response; `GET /health` reports readiness.

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

use crate::adapter::Adapter;
use crate::request::AdapterResponse;

/// Response from the health endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub api_versions: usize,
}

async fn handle_request(State(adapter): State<Arc<Adapter>>, body: Bytes) -> Json<AdapterResponse> {
    Json(adapter.handle_body(&body).await)
}

async fn health(State(adapter): State<Arc<Adapter>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        api_versions: adapter.table().len(),
    })
}

/// Build the adapter's routes.
pub fn api_router(adapter: Arc<Adapter>) -> Router {
    Router::new()
        .route("/api", post(handle_request))
        .route("/health", get(health))
        .with_state(adapter)
}

/// Serve on `addr` until `shutdown_rx` fires.
pub async fn serve(
    adapter: Arc<Adapter>,
    addr: SocketAddr,
    mut shutdown_rx: watch::Receiver<()>,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Adapter listening on http://{}/api", addr);

    axum::serve(listener, api_router(adapter))
        .with_graceful_shutdown(async move {
            shutdown_rx.changed().await.ok();
        })
        .await?;

    log::info!("Adapter stopped.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{CapabilityRegistry, FixtureCapability};
    use crate::schema::SchemaTable;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn router() -> Router {
        let registry = CapabilityRegistry::with_defaults(Arc::new(FixtureCapability::new()));
        let table = SchemaTable::build(&[], &registry, Some("/apiv4")).unwrap();
        api_router(Arc::new(Adapter::new(table)))
    }

    #[tokio::test]
    async fn test_health() {
        let response = router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.api_versions, 1);
    }

    #[tokio::test]
    async fn test_malformed_body_still_200() {
        let response = router()
            .oneshot(
                Request::post("/api")
                    .header("content-type", "application/json")
                    .body(Body::from("{\"id\": 5"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: AdapterResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.result.unit, "request data empty");
        assert_eq!(parsed.status_code, 200);
    }
}
