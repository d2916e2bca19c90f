//! The application service.
//!
//! # Responsibilities
//! - Serve `GET /v1/health`: fast, side-effect-free, answered from the
//!   in-process readiness flag alone
//! - Serve the root banner and a JSON error shape for unknown routes
//! - Wire up middleware (tracing, request ID, CORS, rate limiting)
//! - Drain on shutdown: readiness flips before the listener stops so
//!   probes observe unavailability first

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ServiceConfig;
use crate::observability::metrics;
use crate::orchestrator::descriptor::ProbeSpec;
use crate::orchestrator::runtime::{
    bind_listener, RunningService, ServiceRuntime, SpawnError, StartContext,
};
use crate::service::rate_limit::{rate_limit_middleware, RateLimiterState};
use crate::service::readiness::Readiness;

/// How long the listener keeps accepting after readiness is cleared, so
/// in-flight probes see 503 instead of a reset connection.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// JSON error body, the service's uniform failure shape.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: u16,
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub name: String,
    pub readiness: Readiness,
    pub access_log: bool,
}

/// The supervised HTTP application service.
pub struct AppServer {
    router: Router,
    readiness: Readiness,
}

impl AppServer {
    /// Build the service from its descriptor config and environment.
    /// `ACCESS_LOG` in the environment enables per-request info logs.
    pub fn new(config: &ServiceConfig, env_access_log: bool) -> Self {
        let readiness = Readiness::new();

        let state = AppState {
            name: config.name.clone(),
            readiness: readiness.clone(),
            access_log: env_access_log,
        };

        let mut router = Router::new()
            .route("/v1/health", get(health_handler))
            .route("/", get(root_handler))
            .fallback(not_found_handler)
            .with_state(state.clone())
            .layer(middleware::from_fn_with_state(state, track_request));

        if config.rate_limit.enabled {
            let limiter = Arc::new(RateLimiterState::new(&config.rate_limit));
            router = router.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
        }

        let router = router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(CorsLayer::permissive());

        Self { router, readiness }
    }

    /// Readiness handle, shared with the serving task.
    pub fn readiness(&self) -> Readiness {
        self.readiness.clone()
    }

    /// Run the service on the given listener until shutdown.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: tokio::sync::broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        self.readiness.mark_ready();
        tracing::info!(address = %addr, "Application service listening");

        let readiness = self.readiness.clone();
        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                readiness.mark_draining();
                tracing::info!("Application service draining");
                tokio::time::sleep(DRAIN_GRACE).await;
            })
            .await?;

        tracing::info!("Application service stopped");
        Ok(())
    }
}

/// Health check endpoint. Answers from the readiness flag only; no
/// downstream dependencies are consulted.
async fn health_handler(State(state): State<AppState>) -> Response {
    if state.readiness.is_ready() {
        Json(json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
        }))
        .into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "draining" })),
        )
            .into_response()
    }
}

/// Root banner.
async fn root_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "service": state.name,
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/v1/health",
    }))
}

async fn not_found_handler() -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: "Not found".to_string(),
            code: 404,
        }),
    )
}

/// Record metrics for every request; emit an access log line when the
/// descriptor enables it.
async fn track_request(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    metrics::record_request(&method, status, &state.name, start);
    if state.access_log {
        tracing::info!(
            method = %method,
            path = %path,
            status = status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "request"
        );
    }
    response
}

/// Runtime adapter the supervisor uses to create service instances.
pub struct AppRuntime {
    config: ServiceConfig,
}

impl AppRuntime {
    pub fn new(config: ServiceConfig) -> Self {
        Self { config }
    }
}

impl ServiceRuntime for AppRuntime {
    /// The probe spec shipped with the service itself, the image-level
    /// HEALTHCHECK. The manifest-level spec overrides it.
    fn baked_in_probe(&self) -> Option<ProbeSpec> {
        Some(ProbeSpec {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(30),
            path: "/v1/health".to_string(),
            retries: 3,
            start_period: Duration::from_secs(5),
        })
    }

    fn start(
        &self,
        name: &str,
        addr: SocketAddr,
        ctx: StartContext,
    ) -> Result<RunningService, SpawnError> {
        let std_listener = bind_listener(name, addr)?;
        let bound = std_listener.local_addr().map_err(|e| SpawnError::Io {
            name: name.to_string(),
            source: e,
        })?;

        let access_log = ctx
            .env
            .get("ACCESS_LOG")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let server = AppServer::new(&self.config, access_log);
        let service_name = name.to_string();
        let task = tokio::spawn(async move {
            let listener = match TcpListener::from_std(std_listener) {
                Ok(l) => l,
                Err(e) => {
                    tracing::error!(service = %service_name, error = %e, "Failed to register listener");
                    return;
                }
            };
            if let Err(e) = server.run(listener, ctx.shutdown).await {
                tracing::error!(service = %service_name, error = %e, "Application service failed");
            }
        });

        Ok(RunningService { addr: bound, task })
    }
}
