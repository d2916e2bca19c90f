//! Service runtime seam.
//!
//! # Responsibilities
//! - Define the contract a deployable unit satisfies toward the
//!   supervisor: bind a port, run until told to stop
//! - Surface fatal start-time failures (port conflicts, bind errors)
//!
//! # Design Decisions
//! - `start` is synchronous: the port is bound with a std listener so a
//!   conflict fails the deployment immediately, before any task exists
//! - A runtime may ship a baked-in probe spec; the manifest overrides it

use std::collections::BTreeMap;
use std::net::SocketAddr;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::orchestrator::descriptor::ProbeSpec;

/// Fatal error creating a service instance.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    /// The declared port is already bound on the host.
    #[error("{name}: address {addr} already in use")]
    PortConflict {
        name: String,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Any other start-time I/O failure.
    #[error("{name}: failed to start")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Everything a runtime needs to start an instance.
pub struct StartContext {
    /// Environment variables from the service descriptor.
    pub env: BTreeMap<String, String>,

    /// Shutdown signal; the instance drains and exits when it fires.
    pub shutdown: broadcast::Receiver<()>,
}

/// A started instance: the bound address plus its serving task.
pub struct RunningService {
    pub addr: SocketAddr,
    pub task: JoinHandle<()>,
}

impl RunningService {
    /// Hard-stop the instance. Used for unhealthy replacements; ordinary
    /// shutdown goes through the broadcast channel instead.
    pub fn abort(&self) {
        self.task.abort();
    }
}

/// A deployable unit the supervisor can create, probe, and replace.
pub trait ServiceRuntime: Send + Sync {
    /// Probe spec baked into the unit itself, if any. Overridden by the
    /// manifest-level health check when both are present.
    fn baked_in_probe(&self) -> Option<ProbeSpec> {
        None
    }

    /// Bind the given address and start serving. Returns once the port
    /// is bound; serving continues on the returned task.
    fn start(&self, name: &str, addr: SocketAddr, ctx: StartContext)
        -> Result<RunningService, SpawnError>;
}

/// Bind a std listener, classifying EADDRINUSE as a port conflict.
///
/// The listener is switched to non-blocking so it can be registered with
/// the tokio reactor by the caller.
pub fn bind_listener(name: &str, addr: SocketAddr) -> Result<std::net::TcpListener, SpawnError> {
    let listener = std::net::TcpListener::bind(addr).map_err(|e| {
        if e.kind() == std::io::ErrorKind::AddrInUse {
            SpawnError::PortConflict {
                name: name.to_string(),
                addr,
                source: e,
            }
        } else {
            SpawnError::Io {
                name: name.to_string(),
                source: e,
            }
        }
    })?;
    listener.set_nonblocking(true).map_err(|e| SpawnError::Io {
        name: name.to_string(),
        source: e,
    })?;
    Ok(listener)
}
