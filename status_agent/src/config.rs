//! Agent configuration: defaults, environment overrides, then command-line flags.

use crate::error::AgentError;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const STATUS_PATH: &str = "/ws/system-status";

pub const USAGE: &str = "Usage: status_agent [--host ADDR] [--port PORT|-p PORT] \
[--interval-ms MS] [--cpu-window-ms MS]\n\
Environment: STATUS_AGENT_HOST, STATUS_AGENT_PORT, STATUS_AGENT_INTERVAL_MS, \
STATUS_AGENT_CPU_WINDOW_MS, STATUS_AGENT_DEGRADED_LATENCY_MS, \
STATUS_AGENT_AI_STATUS, STATUS_AGENT_SIGNAL_STATUS";

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub host: String,
    pub port: u16,
    /// Period between status pushes on each session.
    pub status_interval: Duration,
    /// Time between the two CPU tick reads of one sample.
    pub cpu_window: Duration,
    /// Last measured latency above this marks the backend "degraded".
    pub degraded_latency_ms: i64,
    pub ai_service_status: String,
    pub traffic_signal_status: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            status_interval: Duration::from_millis(1_000),
            cpu_window: Duration::from_millis(1_000),
            degraded_latency_ms: 500,
            ai_service_status: "healthy".to_string(),
            traffic_signal_status: "healthy".to_string(),
        }
    }
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Run(AgentConfig),
    Help,
}

fn parse_num<T: FromStr>(key: &'static str, value: &str) -> Result<T, AgentError> {
    value.trim().parse::<T>().map_err(|_| AgentError::InvalidConfig {
        key,
        value: value.to_string(),
    })
}

fn parse_millis(key: &'static str, value: &str) -> Result<Duration, AgentError> {
    parse_num::<u64>(key, value).map(Duration::from_millis)
}

impl AgentConfig {
    /// Build from the process environment and arguments.
    pub fn load() -> Result<Invocation, AgentError> {
        Self::from_sources(std::env::args(), |k| std::env::var(k).ok())
    }

    /// `args` includes the program name; `env` looks up a variable.
    pub fn from_sources<I, F>(args: I, env: F) -> Result<Invocation, AgentError>
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = AgentConfig::default();

        if let Some(v) = env("STATUS_AGENT_HOST") {
            cfg.host = v;
        }
        if let Some(v) = env("STATUS_AGENT_PORT") {
            cfg.port = parse_num("STATUS_AGENT_PORT", &v)?;
        }
        if let Some(v) = env("STATUS_AGENT_INTERVAL_MS") {
            cfg.status_interval = parse_millis("STATUS_AGENT_INTERVAL_MS", &v)?;
        }
        if let Some(v) = env("STATUS_AGENT_CPU_WINDOW_MS") {
            cfg.cpu_window = parse_millis("STATUS_AGENT_CPU_WINDOW_MS", &v)?;
        }
        if let Some(v) = env("STATUS_AGENT_DEGRADED_LATENCY_MS") {
            cfg.degraded_latency_ms = parse_num("STATUS_AGENT_DEGRADED_LATENCY_MS", &v)?;
        }
        if let Some(v) = env("STATUS_AGENT_AI_STATUS") {
            cfg.ai_service_status = v;
        }
        if let Some(v) = env("STATUS_AGENT_SIGNAL_STATUS") {
            cfg.traffic_signal_status = v;
        }

        let mut it = args.into_iter();
        let _ = it.next(); // program name
        while let Some(arg) = it.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((f, v)) if f.starts_with("--") => (f.to_string(), Some(v.to_string())),
                _ => (arg.clone(), None),
            };
            let mut value = |key: &'static str| {
                inline
                    .clone()
                    .or_else(|| it.next())
                    .ok_or(AgentError::InvalidConfig {
                        key,
                        value: String::new(),
                    })
            };
            match flag.as_str() {
                "-h" | "--help" => return Ok(Invocation::Help),
                "--host" => cfg.host = value("--host")?,
                "--port" | "-p" => cfg.port = parse_num("--port", &value("--port")?)?,
                "--interval-ms" => {
                    cfg.status_interval = parse_millis("--interval-ms", &value("--interval-ms")?)?
                }
                "--cpu-window-ms" => {
                    cfg.cpu_window = parse_millis("--cpu-window-ms", &value("--cpu-window-ms")?)?
                }
                _ => return Err(AgentError::UnexpectedArg(arg)),
            }
        }

        if cfg.status_interval.is_zero() {
            return Err(AgentError::InvalidConfig {
                key: "status interval",
                value: "0".into(),
            });
        }
        Ok(Invocation::Run(cfg))
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, AgentError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| AgentError::Addr(self.host.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}
