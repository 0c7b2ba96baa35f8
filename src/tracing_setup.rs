// file: src/tracing_setup.rs
// description: structured logging configuration and tracing initialization
// reference: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/

use anyhow::{Context, Result};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

/// Dependencies that are chatty at debug level.
const QUIET_TARGETS: [&str; 4] = ["tungstenite", "tokio_tungstenite", "hyper_util", "reqwest"];

/// `RUST_LOG` wins when set; otherwise this crate logs at `log_level`,
/// everything else at `warn`.
pub fn filter_for(log_level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    EnvFilter::try_new(default_directives(log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn,edgecheck=info"))
}

fn default_directives(log_level: &str) -> String {
    let mut directives = vec![format!("warn,edgecheck={}", log_level)];
    directives.extend(QUIET_TARGETS.iter().map(|target| format!("{}=warn", target)));
    directives.join(",")
}

fn span_events(log_level: &str) -> FmtSpan {
    match log_level.to_ascii_lowercase().as_str() {
        "trace" | "debug" => FmtSpan::CLOSE,
        _ => FmtSpan::NONE,
    }
}

/// Installs the global subscriber. Logs always go to stderr; stdout carries
/// dashboard output only.
pub fn setup_tracing(log_level: &str, json_logs: bool, ansi: bool) -> Result<()> {
    let filter = filter_for(log_level);

    let fmt_layer = if json_logs {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(false)
            .with_span_list(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_ansi(ansi)
            .with_target(false)
            .with_span_events(span_events(log_level))
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(())
}
