//! Builds one [`ProxySession`] per accepted upgrade.

use std::net::SocketAddr;

use super::proxy::ProxySession;
use super::target::TargetSpec;
use super::tracker::SessionTracker;
use crate::config::ProxyConfig;

/// Creates sessions with the configured defaults and tracks them.
#[derive(Debug, Clone)]
pub struct SessionFactory {
    config: ProxyConfig,
    tracker: SessionTracker,
}

impl SessionFactory {
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config,
            tracker: SessionTracker::new(),
        }
    }

    /// Create a session for a client that upgraded on `path`.
    pub fn create(&self, peer: SocketAddr, path: &str) -> ProxySession {
        let target = TargetSpec::from_path(path, &self.config);
        let guard = self.tracker.track();
        tracing::info!(
            session_id = %guard.id(),
            peer = %peer,
            backend = %target,
            active = self.tracker.active_count(),
            "Session created"
        );
        ProxySession::new(guard, target, self.config.debug)
    }

    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }
}
