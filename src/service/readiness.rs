//! Process readiness flag.
//!
//! The health endpoint answers from this flag alone: no downstream
//! lookups, no I/O. It flips exactly twice in a normal lifetime (set
//! once the listener is bound, cleared when draining begins) so the
//! probe response tracks whether the process is accepting traffic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared readiness state between the server task and its handlers.
#[derive(Debug, Clone, Default)]
pub struct Readiness {
    ready: Arc<AtomicBool>,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    /// The listener is bound and the service accepts traffic.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Relaxed);
    }

    /// Draining has begun; probes should see unavailability before the
    /// listener actually stops.
    pub fn mark_draining(&self) {
        self.ready.store(false, Ordering::Relaxed);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flips_with_lifecycle() {
        let readiness = Readiness::new();
        assert!(!readiness.is_ready());

        readiness.mark_ready();
        assert!(readiness.is_ready());

        readiness.mark_draining();
        assert!(!readiness.is_ready());
    }

    #[test]
    fn clones_share_state() {
        let readiness = Readiness::new();
        let clone = readiness.clone();
        clone.mark_ready();
        assert!(readiness.is_ready());
    }
}
