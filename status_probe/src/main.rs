//! Entry point for status_probe. Prints status frames and optionally one latency probe.

use status_probe::ws::{connect, measure_latency, next_status};
use std::env;

const DEFAULT_URL: &str = "ws://127.0.0.1:8080/ws/system-status";

#[derive(Debug, PartialEq)]
struct ParsedArgs {
    url: String,
    count: usize,
    ping: bool,
}

/// Why argument parsing stopped short of a run.
#[derive(Debug, PartialEq)]
enum ParseOutcome {
    /// `--help`: usage on stdout, exit 0.
    Help(String),
    /// Bad input: message on stderr, nonzero exit.
    Invalid(String),
}

fn usage(prog: &str) -> String {
    format!("Usage: {prog} [--count N|-n N] [--ping] [ws://HOST:PORT/ws/system-status]")
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<ParsedArgs, ParseOutcome> {
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "status_probe".into());
    let mut url: Option<String> = None;
    let mut count: usize = 1;
    let mut ping = false;

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-h" | "--help" => return Err(ParseOutcome::Help(usage(&prog))),
            "--count" | "-n" => {
                count = it
                    .next()
                    .and_then(|v| v.parse().ok())
                    .ok_or_else(|| ParseOutcome::Invalid(usage(&prog)))?;
            }
            "--ping" => ping = true,
            _ if arg.starts_with("--count=") => {
                count = arg
                    .split_once('=')
                    .and_then(|(_, v)| v.parse().ok())
                    .ok_or_else(|| ParseOutcome::Invalid(usage(&prog)))?;
            }
            _ => {
                if url.is_none() {
                    url = Some(arg);
                } else {
                    return Err(ParseOutcome::Invalid(format!(
                        "Unexpected argument. {}",
                        usage(&prog)
                    )));
                }
            }
        }
    }
    Ok(ParsedArgs {
        url: url.unwrap_or_else(|| DEFAULT_URL.to_string()),
        count,
        ping,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let parsed = match parse_args(env::args()) {
        Ok(v) => v,
        Err(ParseOutcome::Help(msg)) => {
            println!("{msg}");
            return Ok(());
        }
        Err(ParseOutcome::Invalid(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };

    let mut ws = connect(&parsed.url).await?;
    for _ in 0..parsed.count {
        match next_status(&mut ws).await {
            Some(status) => println!("{}", serde_json::to_string(&status)?),
            None => anyhow::bail!("connection closed before a status frame arrived"),
        }
    }
    if parsed.ping {
        match measure_latency(&mut ws).await {
            Some(s) => println!(
                "latency: agent-reported {} ms, round trip {} ms",
                s.reported_ms,
                s.round_trip.as_millis()
            ),
            None => anyhow::bail!("no pong received"),
        }
    }
    let _ = ws.close(None).await;
    Ok(())
}
