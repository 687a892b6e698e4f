//! Shared agent state handed to every connection.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::AgentConfig;
use crate::metrics::{Sampler, SysinfoSampler};

/// Builds a fresh sampler for each new session.
pub type SamplerFactory = Arc<dyn Fn() -> Box<dyn Sampler> + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AgentConfig>,
    pub clock: Arc<dyn Clock>,
    pub sampler_factory: SamplerFactory,
    // Number of sessions currently running
    pub client_count: Arc<AtomicUsize>,
}

impl AppState {
    /// Live host sampler and system clock.
    pub fn new(config: AgentConfig) -> Self {
        let window = config.cpu_window;
        Self::with_parts(
            config,
            Arc::new(SystemClock),
            Arc::new(move || Box::new(SysinfoSampler::new(window)) as Box<dyn Sampler>),
        )
    }

    pub fn with_parts(
        config: AgentConfig,
        clock: Arc<dyn Clock>,
        sampler_factory: SamplerFactory,
    ) -> Self {
        Self {
            config: Arc::new(config),
            clock,
            sampler_factory,
            client_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.client_count.load(Ordering::Acquire)
    }

    /// Count a session as live until the returned guard drops.
    pub fn register_session(&self) -> SessionGuard {
        let n = self.client_count.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::info!(active = n, "client connected");
        SessionGuard(self.client_count.clone())
    }
}

/// Decrements the live session count on drop.
pub struct SessionGuard(Arc<AtomicUsize>);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let n = self.0.fetch_sub(1, Ordering::AcqRel) - 1;
        tracing::info!(active = n, "client disconnected");
    }
}
