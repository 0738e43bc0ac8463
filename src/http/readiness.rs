//! Readiness signal.
//!
//! False until the server has bound its listener, true until shutdown
//! begins. Shared by the launcher, the `/health/ready` handler and anyone
//! waiting for the instance to come up.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::observability::metrics;

#[derive(Debug)]
struct Inner {
    ready: watch::Sender<bool>,
    local_addr: Mutex<Option<SocketAddr>>,
}

/// Cloneable readiness flag.
#[derive(Debug, Clone)]
pub struct Readiness {
    inner: Arc<Inner>,
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

impl Readiness {
    pub fn new() -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                ready,
                local_addr: Mutex::new(None),
            }),
        }
    }

    /// Mark the instance ready, recording the bound address.
    pub fn mark_ready(&self, local_addr: SocketAddr) {
        *self
            .inner
            .local_addr
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(local_addr);
        self.inner.ready.send_replace(true);
        metrics::record_ready(true);
        tracing::info!(address = %local_addr, "Instance is ready");
    }

    pub fn mark_not_ready(&self) {
        if self.inner.ready.send_replace(false) {
            metrics::record_ready(false);
            tracing::info!("Instance is no longer ready");
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.inner.ready.borrow()
    }

    /// Address the server bound to, once it has.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self
            .inner
            .local_addr
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resolve once the instance is ready.
    pub async fn wait_ready(&self) {
        let mut rx = self.inner.ready.subscribe();
        // The sender lives in `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ready_then_not_ready() {
        let readiness = Readiness::new();
        assert!(!readiness.is_ready());
        assert_eq!(readiness.local_addr(), None);

        let addr: SocketAddr = "127.0.0.1:8000".parse().unwrap();
        readiness.mark_ready(addr);
        readiness.wait_ready().await;
        assert!(readiness.is_ready());
        assert_eq!(readiness.local_addr(), Some(addr));

        readiness.mark_not_ready();
        assert!(!readiness.is_ready());
    }
}
