//! Per-connection session: a status push loop and a ping/pong loop sharing
//! one socket. The two run as separate tasks tied to one cancellation token;
//! whichever stops first stops the other.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::AgentConfig;
use crate::metrics::{HostSample, Sampler};
use crate::state::AppState;
use crate::types::{LatencyFrame, LatencyPing, ServiceHealth, StatusMessage};

type WsSink = Arc<Mutex<SplitSink<WebSocket, Message>>>;

const UNMEASURED: i64 = i64::MIN;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Last measured round-trip latency (ms) of one session.
#[derive(Debug)]
pub struct LatencyCell(AtomicI64);

impl Default for LatencyCell {
    fn default() -> Self {
        Self(AtomicI64::new(UNMEASURED))
    }
}

impl LatencyCell {
    pub fn store(&self, ms: i64) {
        self.0.store(ms, Ordering::Release);
    }

    pub fn load(&self) -> Option<i64> {
        match self.0.load(Ordering::Acquire) {
            UNMEASURED => None,
            ms => Some(ms),
        }
    }
}

/// Backend health for one tick: degraded when the sample was incomplete or
/// the last ping came back slower than `threshold_ms`.
pub fn backend_health(
    sample: &HostSample,
    latency: Option<i64>,
    threshold_ms: i64,
) -> ServiceHealth {
    let slow = latency.is_some_and(|ms| ms > threshold_ms);
    if slow || sample.partial {
        ServiceHealth::Degraded
    } else {
        ServiceHealth::Healthy
    }
}

/// Clamp to 0..=100; NaN and infinities read as 0.
fn finite_percent(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

pub fn build_status(
    sample: HostSample,
    latency: Option<i64>,
    config: &AgentConfig,
    clock: &dyn Clock,
) -> StatusMessage {
    let backend = backend_health(&sample, latency, config.degraded_latency_ms);
    StatusMessage {
        backend_status: backend.as_str().to_string(),
        ai_service_status: config.ai_service_status.clone(),
        traffic_signal_status: config.traffic_signal_status.clone(),
        timestamp: clock.timestamp(),
        cpu_usage: finite_percent(sample.cpu_usage),
        used_memory_mb: sample.used_memory_mb.min(sample.total_memory_mb),
        total_memory_mb: sample.total_memory_mb,
        network_stats: sample.networks,
    }
}

pub struct Session {
    state: AppState,
    latency: Arc<LatencyCell>,
    cancel: CancellationToken,
}

impl Session {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            latency: Arc::new(LatencyCell::default()),
            cancel: CancellationToken::new(),
        }
    }

    /// Drive the session until the client leaves or either loop fails.
    pub async fn run(self, socket: WebSocket) {
        let _registered = self.state.register_session();
        let (sink, stream) = socket.split();
        let sink: WsSink = Arc::new(Mutex::new(sink));

        let sampler = (self.state.sampler_factory)();
        let send = tokio::spawn(send_loop(
            sampler,
            sink.clone(),
            self.latency.clone(),
            self.state.clone(),
            self.cancel.clone(),
        ));
        let recv = tokio::spawn(recv_loop(
            stream,
            sink.clone(),
            self.latency.clone(),
            self.state.clock.clone(),
            self.cancel.clone(),
        ));

        let (s, r) = tokio::join!(send, recv);
        for res in [s, r] {
            if let Err(e) = res {
                warn!(error = %e, "session task failed");
            }
        }

        self.cancel.cancel();
        // peer may already be gone
        let _ = timeout(CLOSE_TIMEOUT, async { sink.lock().await.close().await }).await;
    }
}

/// Write one text frame unless the session is cancelled first. Returns false
/// when the frame was not delivered.
async fn send_text(sink: &WsSink, text: String, cancel: &CancellationToken) -> bool {
    let mut guard = tokio::select! {
        _ = cancel.cancelled() => return false,
        g = sink.lock() => g,
    };
    tokio::select! {
        _ = cancel.cancelled() => false,
        res = guard.send(Message::Text(text)) => match res {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "send failed");
                false
            }
        },
    }
}

async fn send_loop(
    mut sampler: Box<dyn Sampler>,
    sink: WsSink,
    latency: Arc<LatencyCell>,
    state: AppState,
    cancel: CancellationToken,
) {
    let _done = cancel.clone().drop_guard();
    let mut ticker = interval(state.config.status_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let sample = tokio::select! {
            _ = cancel.cancelled() => break,
            sample = async {
                ticker.tick().await;
                sampler.sample().await
            } => sample,
        };
        if sample.partial {
            warn!("host sample incomplete, reporting zeroed metrics");
        }
        let status = build_status(
            sample,
            latency.load(),
            &state.config,
            state.clock.as_ref(),
        );
        let json = match serde_json::to_string(&status) {
            Ok(js) => js,
            Err(e) => {
                warn!(error = %e, "status serialization failed");
                continue;
            }
        };
        if !send_text(&sink, json, &cancel).await {
            break;
        }
    }
}

async fn recv_loop(
    mut stream: SplitStream<WebSocket>,
    sink: WsSink,
    latency: Arc<LatencyCell>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
) {
    let _done = cancel.clone().drop_guard();

    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => break,
            msg = stream.next() => msg,
        };
        let text = match msg {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                debug!(error = %e, "receive failed");
                break;
            }
        };

        let Some(sent_at) = LatencyPing::parse(&text) else {
            debug!(len = text.len(), "ignoring non-ping frame");
            continue;
        };
        let ms = clock.now_ms().saturating_sub(sent_at);
        latency.store(ms);

        let pong = match serde_json::to_string(&LatencyFrame::Pong { latency: ms }) {
            Ok(js) => js,
            Err(e) => {
                warn!(error = %e, "pong serialization failed");
                continue;
            }
        };
        if !send_text(&sink, pong, &cancel).await {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::types::NetworkInfo;

    fn sample(partial: bool) -> HostSample {
        HostSample {
            cpu_usage: 42.0,
            used_memory_mb: 1_000,
            total_memory_mb: 4_000,
            networks: vec![NetworkInfo {
                name: "lo".into(),
                bytes_sent: 1,
                bytes_recv: 2,
            }],
            partial,
        }
    }

    #[test]
    fn latency_cell_starts_unmeasured() {
        let c = LatencyCell::default();
        assert_eq!(c.load(), None);
        c.store(50);
        assert_eq!(c.load(), Some(50));
        c.store(-3);
        assert_eq!(c.load(), Some(-3));
    }

    #[test]
    fn backend_degrades_on_slow_ping_or_partial_sample() {
        let health = |partial, latency| backend_health(&sample(partial), latency, 500);
        assert_eq!(health(false, None), ServiceHealth::Healthy);
        assert_eq!(health(false, Some(500)), ServiceHealth::Healthy);
        assert_eq!(health(false, Some(501)), ServiceHealth::Degraded);
        assert_eq!(health(true, Some(1)), ServiceHealth::Degraded);
    }

    #[test]
    fn status_carries_sample_and_config() {
        let cfg = AgentConfig {
            traffic_signal_status: "offline".into(),
            ..AgentConfig::default()
        };
        let clock = ManualClock::new(0);
        let msg = build_status(sample(false), Some(10), &cfg, &clock);
        assert_eq!(msg.backend_status, "healthy");
        assert_eq!(msg.ai_service_status, "healthy");
        assert_eq!(msg.traffic_signal_status, "offline");
        assert_eq!(msg.timestamp, "1970-01-01T00:00:00Z");
        assert_eq!(msg.cpu_usage, 42.0);
        assert_eq!((msg.used_memory_mb, msg.total_memory_mb), (1_000, 4_000));
        assert_eq!(msg.network_stats.len(), 1);
    }

    #[test]
    fn status_clamps_out_of_range_sample() {
        let clock = ManualClock::new(0);
        let wild = HostSample {
            cpu_usage: 180.0,
            used_memory_mb: 9,
            total_memory_mb: 4,
            ..HostSample::default()
        };
        let msg = build_status(wild, None, &AgentConfig::default(), &clock);
        assert_eq!(msg.cpu_usage, 100.0);
        assert!(msg.used_memory_mb <= msg.total_memory_mb);
    }

    #[test]
    fn status_zeroes_non_finite_cpu() {
        let clock = ManualClock::new(0);
        for cpu in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let odd = HostSample {
                cpu_usage: cpu,
                ..HostSample::default()
            };
            let msg = build_status(odd, None, &AgentConfig::default(), &clock);
            assert_eq!(msg.cpu_usage, 0.0);
            let js = serde_json::to_value(&msg).unwrap();
            assert_eq!(js["cpuUsage"], 0.0);
        }
    }
}
