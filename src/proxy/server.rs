//! Reverse proxy server.
//!
//! # Responsibilities
//! - Accept inbound connections on the public port
//! - Forward every request to the upstream service without modifying
//!   method or body semantics
//! - Answer 502 when the upstream is unreachable
//!
//! # Design Decisions
//! - Single fixed upstream; there is nothing to route or balance
//! - Bodies are streamed through, never buffered
//! - Whether the upstream is healthy is the orchestrator's concern, not
//!   the proxy's; the proxy forwards as soon as it exists

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{
        header,
        uri::{Authority, PathAndQuery, Scheme},
        Request, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::observability::metrics;
use crate::orchestrator::runtime::{
    bind_listener, RunningService, ServiceRuntime, SpawnError, StartContext,
};

/// State injected into the forwarding handler.
#[derive(Clone)]
struct ProxyState {
    client: Client<HttpConnector, Body>,
    upstream_addr: SocketAddr,
    upstream_name: String,
}

/// The public-facing reverse proxy.
pub struct ProxyServer {
    router: Router,
}

impl ProxyServer {
    pub fn new(config: &ProxyConfig, upstream_addr: SocketAddr) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = ProxyState {
            client,
            upstream_addr,
            upstream_name: config.upstream.clone(),
        };

        let router = Router::new()
            .route("/{*path}", any(forward_handler))
            .route("/", any(forward_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

        Self { router }
    }

    /// Run the proxy on the given listener until shutdown.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: tokio::sync::broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Reverse proxy listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Reverse proxy stopped");
        Ok(())
    }
}

/// Forward one request to the upstream, streaming the body through.
async fn forward_handler(State(state): State<ProxyState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();
    let method_str = method.to_string();

    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let (parts, body) = request.into_parts();

    // Rewrite the URI to target the upstream; path and query pass
    // through untouched.
    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Authority::from_str(&state.upstream_addr.to_string()).ok();
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    let uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to build upstream URI");
            metrics::record_request(&method_str, 500, &state.upstream_name, start_time);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Invalid upstream URI").into_response();
        }
    };

    let mut upstream_request = Request::builder().method(method).version(parts.version);
    if let Some(headers) = upstream_request.headers_mut() {
        for (k, v) in parts.headers.iter() {
            headers.insert(k.clone(), v.clone());
        }
        if let Ok(value) = header::HeaderValue::from_str(&request_id) {
            headers.insert("x-request-id", value);
        }
    }

    let upstream_request = match upstream_request.uri(uri).body(body) {
        Ok(req) => req,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to build upstream request");
            metrics::record_request(&method_str, 500, &state.upstream_name, start_time);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Invalid upstream request").into_response();
        }
    };

    match state.client.request(upstream_request).await {
        Ok(response) => {
            let status = response.status();
            metrics::record_request(&method_str, status.as_u16(), &state.upstream_name, start_time);

            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body)).into_response()
        }
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                upstream = %state.upstream_addr,
                error = %e,
                "Upstream request failed"
            );
            metrics::record_request(&method_str, 502, &state.upstream_name, start_time);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

/// Runtime adapter the supervisor uses to create proxy instances.
pub struct ProxyRuntime {
    config: ProxyConfig,
    upstream_addr: SocketAddr,
}

impl ProxyRuntime {
    pub fn new(config: ProxyConfig, upstream_addr: SocketAddr) -> Self {
        Self {
            config,
            upstream_addr,
        }
    }
}

impl ServiceRuntime for ProxyRuntime {
    // No baked-in probe: the proxy declares no health check of its own.

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

        let server = ProxyServer::new(&self.config, self.upstream_addr);
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
                tracing::error!(service = %service_name, error = %e, "Reverse proxy failed");
            }
        });

        Ok(RunningService { addr: bound, task })
    }
}
