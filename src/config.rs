// file: src/config.rs
// description: Configuration model and push endpoint derivation from CLI arguments
// reference: backend routes /api/checks/ws, /api/checks/*, /api/history, /api/config
use crate::{cli::Args, error::SetupError, formatter::OutputFormat};
use std::time::Duration;
use url::Url;

/// Path of the push endpoint on the checker backend.
pub const PUSH_PATH: &str = "/api/checks/ws";

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3_000);

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub channel: ChannelConfig,
    pub metrics: MetricsConfig,
    pub output: OutputConfig,
    pub dashboard: DashboardOptions,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Backend origin used for REST calls.
    pub origin: Url,
    pub api_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub endpoint: Url,
    pub reconnect_delay: Duration,
}

impl ChannelConfig {
    pub fn for_origin(origin: &Url) -> Result<Self, SetupError> {
        Ok(Self {
            endpoint: push_endpoint(origin)?,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub colored: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone)]
pub struct DashboardOptions {
    pub status_interval: Duration,
    /// How long `run` waits for the push channel before submitting anyway.
    pub connect_grace: Duration,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            status_interval: Duration::from_secs(2),
            connect_grace: Duration::from_secs(5),
        }
    }
}

/// `http` origins map to `ws`, `https` to `wss`; `ws`/`wss` are kept.
/// Host and port are kept, path/query/fragment are replaced.
pub fn push_endpoint(origin: &Url) -> Result<Url, SetupError> {
    let scheme = match origin.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(SetupError::InvalidConfig(format!(
                "unsupported origin scheme '{other}' (expected http, https, ws or wss)"
            )));
        }
    };
    if origin.host_str().is_none() {
        return Err(SetupError::InvalidConfig(format!(
            "origin '{origin}' has no host"
        )));
    }

    let mut endpoint = origin.clone();
    endpoint
        .set_scheme(scheme)
        .map_err(|()| SetupError::InvalidConfig(format!("cannot use scheme {scheme} for {origin}")))?;
    endpoint.set_path(PUSH_PATH);
    endpoint.set_query(None);
    endpoint.set_fragment(None);
    Ok(endpoint)
}

fn parse_origin(raw: &str) -> Result<Url, SetupError> {
    let origin = Url::parse(raw)
        .map_err(|e| SetupError::InvalidConfig(format!("invalid server origin '{raw}': {e}")))?;
    match origin.scheme() {
        "http" | "https" => Ok(origin),
        "ws" | "wss" => {
            // REST calls need the http flavour of the same origin
            let mut http = origin.clone();
            let scheme = if origin.scheme() == "wss" { "https" } else { "http" };
            http.set_scheme(scheme).map_err(|()| {
                SetupError::InvalidConfig(format!("cannot use scheme {scheme} for {origin}"))
            })?;
            Ok(http)
        }
        other => Err(SetupError::InvalidConfig(format!(
            "unsupported origin scheme '{other}' (expected http, https, ws or wss)"
        ))),
    }
}

impl Config {
    pub fn from_args(args: &Args) -> Result<Self, SetupError> {
        let origin = parse_origin(&args.server)?;
        let endpoint = push_endpoint(&origin)?;

        if args.reconnect_delay_ms == 0 {
            return Err(SetupError::InvalidConfig(
                "reconnect delay must be at least 1 ms".to_string(),
            ));
        }
        if args.status_interval == 0 {
            return Err(SetupError::InvalidConfig(
                "status interval must be at least 1 second".to_string(),
            ));
        }

        Ok(Config {
            server: ServerConfig {
                origin,
                api_timeout: Duration::from_secs(args.api_timeout),
            },
            channel: ChannelConfig {
                endpoint,
                reconnect_delay: Duration::from_millis(args.reconnect_delay_ms),
            },
            metrics: MetricsConfig {
                enabled: args.metrics,
                port: args.metrics_port,
            },
            output: OutputConfig {
                format: OutputFormat::from(args.format.as_str()),
                colored: !args.no_color,
                quiet: args.quiet,
            },
            dashboard: DashboardOptions {
                status_interval: Duration::from_secs(args.status_interval),
                ..DashboardOptions::default()
            },
        })
    }
}
