use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::Request,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::metrics::ServerMetrics;
use multiverse_orchestrator::{OrchestratorHandle, OrchestratorMetrics};

mod http;
mod ws;

/// Shared state handed to every axum handler: the orchestrator handle, the
/// server-side metrics, the resolved config, and the live connection count
/// used for admission control against `max_connections`.
#[derive(Clone)]
pub struct AppState {
    pub handle: OrchestratorHandle,
    pub metrics: Arc<ServerMetrics>,
    pub orchestrator_metrics: Arc<OrchestratorMetrics>,
    pub config: Arc<ServerConfig>,
    connections: Arc<AtomicUsize>,
}

/// Holds a slot against `max_connections`; releases it on drop regardless
/// of how the connection ends (normal close, overrun, panic in the
/// handler task).
pub(crate) struct ConnectionGuard {
    connections: Arc<AtomicUsize>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.connections.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AppState {
    pub fn new(
        handle: OrchestratorHandle,
        metrics: Arc<ServerMetrics>,
        orchestrator_metrics: Arc<OrchestratorMetrics>,
        config: Arc<ServerConfig>,
    ) -> Self {
        Self {
            handle,
            metrics,
            orchestrator_metrics,
            config,
            connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Admission control against §5/§6's "excess connections are refused
    /// with reason `overloaded`". Returns a guard that releases the slot
    /// when the connection's handler task finishes.
    pub(crate) fn try_acquire_connection(&self) -> Result<ConnectionGuard, ()> {
        let previous = self.connections.fetch_add(1, Ordering::SeqCst);
        if previous >= self.config.max_connections {
            self.connections.fetch_sub(1, Ordering::SeqCst);
            return Err(());
        }
        Ok(ConnectionGuard {
            connections: self.connections.clone(),
        })
    }
}

pub struct Api {
    state: AppState,
}

impl Api {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn router(&self) -> Router {
        let allowed_origins = parse_allowed_origins("ALLOWED_HTTP_ORIGINS");
        let allow_any_origin = allowed_origins.is_empty() || allowed_origins.contains("*");
        let cors_origins = allowed_origins
            .iter()
            .filter(|origin| *origin != "*")
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect::<Vec<_>>();

        let cors = if allow_any_origin {
            CorsLayer::new().allow_origin(AllowOrigin::any())
        } else {
            CorsLayer::new().allow_origin(AllowOrigin::list(cors_origins))
        }
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

        let governor_conf = GovernorConfigBuilder::default()
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .map(Arc::new);

        let router = Router::new()
            .route("/api/health", get(http::health))
            .route("/api/realms", get(http::realms))
            .route("/ws", get(ws::ws_handler));

        let router: Router<AppState> = match governor_conf {
            Some(config) => router.layer(GovernorLayer { config }),
            None => router,
        };

        router
            .layer(cors)
            .layer(middleware::from_fn(request_id_middleware))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }
}

fn parse_allowed_origins(var: &str) -> std::collections::HashSet<String> {
    std::env::var(var)
        .unwrap_or_default()
        .split(',')
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

async fn request_id_middleware(req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(header::HeaderName::from_static("x-request-id"))
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let mut response = next.run(req).await;
    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(
            header::HeaderName::from_static("x-request-id"),
            header_value,
        );
    }
    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "http.request"
    );
    response
}

pub(crate) fn overloaded_response() -> Response {
    (StatusCode::TOO_MANY_REQUESTS, "connection limit reached").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use multiverse_orchestrator::spawn;
    use std::sync::Arc;

    #[tokio::test]
    async fn admission_control_refuses_past_limit() {
        let orchestrator_metrics = Arc::new(multiverse_orchestrator::OrchestratorMetrics::default());
        let handle = spawn(Default::default(), orchestrator_metrics.clone());
        let config = ServerConfig {
            max_connections: 1,
            ..ServerConfig::default()
        };
        let state = AppState::new(
            handle,
            Arc::new(ServerMetrics::default()),
            orchestrator_metrics,
            Arc::new(config),
        );
        let first = state.try_acquire_connection();
        assert!(first.is_ok());
        let second = state.try_acquire_connection();
        assert!(second.is_err());
        drop(first);
        let third = state.try_acquire_connection();
        assert!(third.is_ok());
    }
}
