//! Supervisor status: registry and local HTTP endpoint.
//!
//! # Responsibilities
//! - Hold the orchestrator's view of every service: state, creation
//!   order and timestamp, restart count, last probe outcome
//! - Expose it as JSON on a local port for operators and `stack-cli`
//!
//! Creation timestamps are recorded here so start ordering between the
//! proxy and its upstream stays externally observable.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{extract::State, routing::get, Json, Router};
use dashmap::DashMap;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::orchestrator::state::ServiceState;

/// Point-in-time view of one supervised service.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub name: String,
    pub address: String,
    pub state: String,
    /// Identifier of the current instance; replaced on every restart.
    pub instance_id: String,
    /// Monotonic creation order within this supervisor.
    pub created_seq: u64,
    /// Wall-clock creation time, unix milliseconds.
    pub created_at_ms: u64,
    pub restarts: u32,
    /// Outcome of the most recent probe, absent until one ran (or when
    /// probing is disabled).
    pub last_probe_healthy: Option<bool>,
}

/// Concurrent registry of service statuses, shared between supervision
/// tasks and the status endpoint.
#[derive(Clone, Default)]
pub struct StatusRegistry {
    entries: Arc<DashMap<String, ServiceStatus>>,
    seq: Arc<AtomicU64>,
}

impl StatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly created service instance.
    pub fn record_created(&self, name: &str, addr: SocketAddr) {
        let created_seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let created_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        self.entries.insert(
            name.to_string(),
            ServiceStatus {
                name: name.to_string(),
                address: addr.to_string(),
                state: ServiceState::Starting.as_str().to_string(),
                instance_id: uuid::Uuid::new_v4().to_string(),
                created_seq,
                created_at_ms,
                restarts: 0,
                last_probe_healthy: None,
            },
        );
    }

    pub fn set_state(&self, name: &str, state: ServiceState) {
        if let Some(mut entry) = self.entries.get_mut(name) {
            entry.state = state.as_str().to_string();
        }
    }

    pub fn record_probe(&self, name: &str, healthy: bool) {
        if let Some(mut entry) = self.entries.get_mut(name) {
            entry.last_probe_healthy = Some(healthy);
        }
    }

    /// A replacement instance took over: bump the restart count and
    /// assign a fresh instance ID.
    pub fn record_restart(&self, name: &str) {
        if let Some(mut entry) = self.entries.get_mut(name) {
            entry.restarts += 1;
            entry.instance_id = uuid::Uuid::new_v4().to_string();
        }
    }

    pub fn get(&self, name: &str) -> Option<ServiceStatus> {
        self.entries.get(name).map(|e| e.value().clone())
    }

    /// All statuses in creation order.
    pub fn snapshot(&self) -> Vec<ServiceStatus> {
        let mut all: Vec<ServiceStatus> = self.entries.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|s| s.created_seq);
        all
    }
}

async fn status_handler(State(registry): State<StatusRegistry>) -> Json<Vec<ServiceStatus>> {
    Json(registry.snapshot())
}

/// Serve the status endpoint until shutdown.
pub async fn serve_status(
    addr: SocketAddr,
    registry: StatusRegistry,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "Status endpoint listening");

    let app = Router::new()
        .route("/status", get(status_handler))
        .with_state(registry);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
