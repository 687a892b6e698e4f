//! Types that mirror the agent's JSON schema.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub name: String,
    // cumulative totals; diff across frames to get rates
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    pub backend_status: String,
    pub ai_service_status: String,
    pub traffic_signal_status: String,
    pub timestamp: String,
    pub cpu_usage: f64,
    pub used_memory_mb: u64,
    pub total_memory_mb: u64,
    pub network_stats: Vec<NetworkInfo>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LatencyFrame {
    Ping { timestamp: i64 },
    Pong { latency: i64 },
}
