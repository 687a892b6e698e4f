//! Host metrics sampling for status_agent.
//!
//! Memory and network counters come from sysinfo. CPU% is derived from two
//! reads of the cumulative tick counters taken `cpu_window` apart: on Linux
//! straight from `/proc/stat`, elsewhere through sysinfo's own double refresh.
//! A metric that cannot be read is zeroed and the sample is flagged `partial`;
//! sampling never fails as a whole.

use crate::types::NetworkInfo;
use futures::future::BoxFuture;
#[cfg(target_os = "linux")]
use std::fs;
#[cfg(target_os = "linux")]
use std::io;
use std::time::Duration;
use sysinfo::{MemoryRefreshKind, Networks, System};
use tokio::time::sleep;
use tracing::warn;

const MB: u64 = 1024 * 1024;

/// Raw host numbers for one status tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostSample {
    pub cpu_usage: f64,
    pub used_memory_mb: u64,
    pub total_memory_mb: u64,
    pub networks: Vec<NetworkInfo>,
    /// Some metric could not be read and was reported as zero.
    pub partial: bool,
}

/// Source of host samples. One instance lives inside each session.
///
/// `sample` is expected to take about as long as the CPU sampling window.
pub trait Sampler: Send {
    fn sample(&mut self) -> BoxFuture<'_, HostSample>;
}

/// Cumulative CPU ticks across all cores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTicks {
    pub idle: u64,
    pub total: u64,
}

/// Parse the aggregate `cpu` line of `/proc/stat`.
///
/// Fields: user nice system idle iowait irq softirq steal ...; idle time
/// includes iowait.
pub fn parse_cpu_ticks(stat: &str) -> Option<CpuTicks> {
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    let vals: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|tok| tok.parse::<u64>())
        .collect::<Result<_, _>>()
        .ok()?;
    if vals.len() < 4 {
        return None;
    }
    let idle = vals[3].saturating_add(vals.get(4).copied().unwrap_or(0));
    let total = vals.iter().fold(0u64, |acc, v| acc.saturating_add(*v));
    Some(CpuTicks { idle, total })
}

/// `100 * (1 - Δidle / Δtotal)`, clamped to 0..=100; no elapsed ticks reads as idle.
pub fn cpu_usage_between(prev: CpuTicks, curr: CpuTicks) -> f64 {
    let total = curr.total.saturating_sub(prev.total);
    if total == 0 {
        return 0.0;
    }
    let idle = curr.idle.saturating_sub(prev.idle).min(total);
    (100.0 * (1.0 - idle as f64 / total as f64)).clamp(0.0, 100.0)
}

/// (used, total) in MB from byte counts; used never exceeds total.
pub fn memory_mb(total_bytes: u64, available_bytes: u64) -> (u64, u64) {
    let total = total_bytes / MB;
    let available = (available_bytes / MB).min(total);
    (total - available, total)
}

#[cfg(target_os = "linux")]
fn read_cpu_ticks() -> io::Result<CpuTicks> {
    let s = fs::read_to_string("/proc/stat")?;
    parse_cpu_ticks(&s).ok_or_else(|| io::Error::other("no cpu line in /proc/stat"))
}

/// Sampler backed by the live host.
pub struct SysinfoSampler {
    sys: System,
    networks: Networks,
    cpu_window: Duration,
}

impl SysinfoSampler {
    pub fn new(cpu_window: Duration) -> Self {
        Self {
            sys: System::new(),
            networks: Networks::new_with_refreshed_list(),
            cpu_window,
        }
    }

    pub async fn collect(&mut self) -> HostSample {
        let cpu = self.cpu_usage().await;
        let mem = self.memory();
        let networks = self.network_totals();
        let (used_memory_mb, total_memory_mb) = mem.unwrap_or((0, 0));
        HostSample {
            cpu_usage: cpu.unwrap_or(0.0),
            used_memory_mb,
            total_memory_mb,
            networks,
            partial: cpu.is_none() || mem.is_none(),
        }
    }

    #[cfg(target_os = "linux")]
    async fn cpu_usage(&mut self) -> Option<f64> {
        let prev = read_cpu_ticks();
        sleep(self.cpu_window).await;
        match (prev, read_cpu_ticks()) {
            (Ok(p), Ok(c)) => Some(cpu_usage_between(p, c)),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "cpu ticks unavailable");
                None
            }
        }
    }

    #[cfg(not(target_os = "linux"))]
    async fn cpu_usage(&mut self) -> Option<f64> {
        self.sys.refresh_cpu_usage();
        sleep(self.cpu_window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL)).await;
        self.sys.refresh_cpu_usage();
        if self.sys.cpus().is_empty() {
            warn!("cpu counters unavailable");
            return None;
        }
        Some(f64::from(self.sys.global_cpu_usage()).clamp(0.0, 100.0))
    }

    fn memory(&mut self) -> Option<(u64, u64)> {
        self.sys
            .refresh_memory_specifics(MemoryRefreshKind::nothing().with_ram());
        let total = self.sys.total_memory();
        if total == 0 {
            warn!("memory totals unavailable");
            return None;
        }
        Some(memory_mb(total, self.sys.available_memory()))
    }

    fn network_totals(&mut self) -> Vec<NetworkInfo> {
        self.networks.refresh(true);
        let mut out: Vec<NetworkInfo> = self
            .networks
            .iter()
            .map(|(name, data)| NetworkInfo {
                name: name.to_string(),
                bytes_sent: data.total_transmitted(),
                bytes_recv: data.total_received(),
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}

impl Sampler for SysinfoSampler {
    fn sample(&mut self) -> BoxFuture<'_, HostSample> {
        Box::pin(self.collect())
    }
}
