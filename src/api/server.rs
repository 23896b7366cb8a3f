//! HTTP server for the queue API, health checks, and Prometheus metrics
//!
//! One axum listener serves the reception and doctor screens, the display
//! board event stream, and the monitoring endpoints.

use crate::api::handlers::{
    alive_handler, book_handler, call_next_handler, check_in_handler, doctor_login_handler,
    events_handler, finish_consultation_handler, health_handler, metrics_handler, queue_handler,
    ready_handler, reception_login_handler, root_handler, stats_handler, toggle_break_handler,
};
use crate::service::app::AppState;
use anyhow::{Context, Result};
use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{debug, info, warn};

/// CORS policy for the browser screens.
///
/// With no configured origins any origin may call the API. Origins that are not
/// valid header values are skipped with a warning.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if allowed_origins.is_empty() {
        debug!("CORS allows any origin");
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    debug!("CORS allows {} origin(s)", origins.len());
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Build the router with every endpoint
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = cors_layer(&app_state.config().service.cors_allowed_origins);

    Router::new()
        .route("/", get(root_handler))
        .route("/api/book", post(book_handler))
        .route("/api/checkin", post(check_in_handler))
        .route("/api/queue/{ward}", get(queue_handler))
        .route("/api/call-next/{ward}", post(call_next_handler))
        .route("/api/toggle-break/{ward}", post(toggle_break_handler))
        .route(
            "/api/finish-consultation/{ward}",
            post(finish_consultation_handler),
        )
        .route("/api/login", post(doctor_login_handler))
        .route("/api/reception-login", post(reception_login_handler))
        .route("/api/events", get(events_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/alive", get(alive_handler))
        .route("/metrics", get(metrics_handler))
        .route("/stats", get(stats_handler))
        .with_state(app_state)
        .layer(cors)
}

/// HTTP server with graceful shutdown.
///
/// The stop flag is a watch channel, so a `stop` issued before `serve` starts
/// listening still ends the server.
pub struct ApiServer {
    app_state: Arc<AppState>,
    shutdown_tx: watch::Sender<bool>,
}

impl ApiServer {
    pub fn new(app_state: Arc<AppState>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            app_state,
            shutdown_tx,
        }
    }

    /// Bind the configured address and serve until `stop` is called
    pub async fn start(&self) -> Result<()> {
        let raw_addr = self.app_state.config().http_addr();
        let addr: SocketAddr = raw_addr
            .parse()
            .with_context(|| format!("Invalid HTTP listen address {}", raw_addr))?;

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        let app = self.router();

        info!("Queue API listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                if shutdown_rx.wait_for(|stopped| *stopped).await.is_err() {
                    warn!("HTTP server shutdown channel closed");
                }
                info!("HTTP server shutdown signal received");
            })
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }

    pub fn router(&self) -> Router {
        create_router(self.app_state.clone())
    }

    /// Ask the server to stop accepting connections
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping HTTP server...");

        self.shutdown_tx.send_replace(true);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::AppConfig;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt; // for oneshot

    async fn create_test_server() -> ApiServer {
        let state = AppState::with_clock(AppConfig::default(), Arc::new(ManualClock::at(10, 0)))
            .await
            .expect("Failed to create app state");
        ApiServer::new(Arc::new(state))
    }

    #[tokio::test]
    async fn test_root_endpoint() {
        let server = create_test_server().await;

        let response = server
            .router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_endpoints_before_start() {
        let server = create_test_server().await;
        let app = server.router();

        for uri in ["/health", "/ready", "/alive"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let server = create_test_server().await;

        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().contains("text/plain"));
    }

    #[tokio::test]
    async fn test_404_handling() {
        let server = create_test_server().await;

        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .uri("/nonexistent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_serve_and_stop() {
        let server = Arc::new(create_test_server().await);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let handle = {
            let server = server.clone();
            tokio::spawn(async move { server.serve(listener).await })
        };

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        server.stop().await.unwrap();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("server did not stop")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_stop_before_serve_still_stops() {
        let server = create_test_server().await;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        server.stop().await.unwrap();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), server.serve(listener))
            .await
            .expect("server ignored an earlier stop");
        assert!(result.is_ok());
    }
}
