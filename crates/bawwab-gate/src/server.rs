//! Gate server
//!
//! Serves the gated surface plus open /health and /metrics endpoints.
//! Everything that is not /health or /metrics falls through the gate
//! middleware before reaching the protected handler.

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderName, Request, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use bawwab_core::config::BawwabConfig;
use bawwab_core::{Result, SecretResolver};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing::info;

use crate::gate::{gate_middleware, Gate, EXTRA_ATTR_CN_HEADER, EXTRA_ATTR_DN_HEADER};
use crate::metrics::{metrics_handler, MetricsRecorder};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BawwabConfig>,
    pub gate: Arc<Gate>,
    pub metrics: Arc<MetricsRecorder>,
}

/// HTTP server wrapping the gate
pub struct GateServer {
    config: BawwabConfig,
}

impl GateServer {
    pub fn new(config: BawwabConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<()> {
        self.config.validate()?;
        self.config.log_settings();

        let metrics = Arc::new(MetricsRecorder::new());
        info!("Prometheus metrics initialized");

        let secrets = SecretResolver::default();
        let gate = Arc::new(Gate::new(self.config, &secrets));
        let config = gate.config();

        let state = AppState {
            config: config.clone(),
            gate,
            metrics,
        };

        let app = create_router(state);
        let addr = format!("{}:{}", config.server.bind_address, config.server.port);
        let listener = TcpListener::bind(&addr).await?;

        info!("bawwab gate listening on http://{}", addr);
        info!(
            "directory server: {} (port {})",
            config.directory.url, config.directory.port
        );
        info!("metrics at http://{}/metrics", addr);

        axum::serve(listener, app).await?;
        Ok(())
    }
}

fn create_router(state: AppState) -> Router {
    // Only the fallback goes through the gate; health and metrics
    // stay reachable without credentials.
    let gated = Router::new()
        .fallback(forward_handler)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            gate_middleware,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(gated)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": bawwab_core::VERSION,
    }))
}

/// Stand-in for the protected resource: confirms the request passed
/// the gate and reflects the identity headers the gate attached, so
/// deployments can verify forwarding without a real upstream.
async fn forward_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let mut builder = Response::builder().status(StatusCode::OK);

    let mut reflected = vec![
        HeaderName::from_static(EXTRA_ATTR_DN_HEADER),
        HeaderName::from_static(EXTRA_ATTR_CN_HEADER),
    ];
    if let Ok(name) = HeaderName::from_bytes(state.config.forward.username_header.as_bytes()) {
        reflected.push(name);
    }
    for name in reflected {
        if let Some(value) = request.headers().get(&name) {
            builder = builder.header(name, value);
        }
    }

    builder
        .body(Body::from("OK\n"))
        .unwrap_or_else(|_| StatusCode::OK.into_response())
}
