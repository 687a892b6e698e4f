//! Data types exchanged with clients over WebSocket.
//! Keep this module minimal and stable — it defines the wire format.

use serde::{Deserialize, Serialize};

/// Health of one reported service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceHealth {
    Healthy,
    Degraded,
}

impl ServiceHealth {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceHealth::Healthy => "healthy",
            ServiceHealth::Degraded => "degraded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub name: String,
    // cumulative totals since boot (client should diff to get rates)
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

/// Periodic status push, rebuilt from a fresh sample on every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
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

/// Latency frames, tagged by `"type"`. The agent only ever sends `Pong`,
/// carrying `receive time - ping timestamp` in ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LatencyFrame {
    Ping { timestamp: i64 },
    Pong { latency: i64 },
}

fn ping_type() -> String {
    "ping".to_string()
}

/// Inbound ping: the client's send time in ms since the epoch.
///
/// `type` may be omitted and then reads as `"ping"`; clients that skip
/// default-valued fields send `{"timestamp":..}` alone.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LatencyPing {
    #[serde(rename = "type", default = "ping_type")]
    pub kind: String,
    pub timestamp: i64,
}

impl LatencyPing {
    /// Parse an inbound text frame; anything that is not a well-formed ping is `None`.
    pub fn parse(text: &str) -> Option<i64> {
        match serde_json::from_str::<LatencyPing>(text) {
            Ok(ping) if ping.kind == "ping" => Some(ping.timestamp),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn status_uses_camel_case_field_names() {
        let msg = StatusMessage {
            backend_status: ServiceHealth::Healthy.as_str().into(),
            ai_service_status: "healthy".into(),
            traffic_signal_status: "healthy".into(),
            timestamp: "2024-01-01T00:00:00Z".into(),
            cpu_usage: 12.5,
            used_memory_mb: 512,
            total_memory_mb: 2048,
            network_stats: vec![NetworkInfo {
                name: "eth0".into(),
                bytes_sent: 10,
                bytes_recv: 20,
            }],
        };
        let v: Value = serde_json::to_value(&msg).unwrap();
        for key in [
            "backendStatus",
            "aiServiceStatus",
            "trafficSignalStatus",
            "timestamp",
            "cpuUsage",
            "usedMemoryMb",
            "totalMemoryMb",
            "networkStats",
        ] {
            assert!(v.get(key).is_some(), "missing {key} in {v}");
        }
        assert_eq!(v["networkStats"][0]["bytesSent"], 10);
        assert_eq!(v["networkStats"][0]["bytesRecv"], 20);
        assert_eq!(v["usedMemoryMb"], 512);
    }

    #[test]
    fn pong_wire_shape() {
        let s = serde_json::to_string(&LatencyFrame::Pong { latency: 50 }).unwrap();
        assert_eq!(s, r#"{"type":"pong","latency":50}"#);
    }

    #[test]
    fn ping_parsing_accepts_only_pings() {
        assert_eq!(
            LatencyPing::parse(r#"{"type":"ping","timestamp":1000}"#),
            Some(1000)
        );
        assert_eq!(LatencyPing::parse(r#"{"timestamp":1000}"#), Some(1000));
        assert_eq!(LatencyPing::parse(r#"{"foo":"bar"}"#), None);
        assert_eq!(LatencyPing::parse("hello"), None);
        assert_eq!(LatencyPing::parse(r#"{"type":"pong","latency":3}"#), None);
        assert_eq!(LatencyPing::parse(r#"{"type":"pong","timestamp":3}"#), None);
        assert_eq!(LatencyPing::parse(r#"{"type":"ping"}"#), None);
        assert_eq!(
            LatencyPing::parse(r#"{"type":"ping","timestamp":"soon"}"#),
            None
        );
    }
}
