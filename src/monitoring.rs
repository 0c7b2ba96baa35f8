use crate::{client_state::ClientState, error::SetupError};
use metrics::{Counter, Gauge, counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::{net::SocketAddr, sync::LazyLock};
use tracing::{error, info};

// Global metrics
pub static FRAMES_RECEIVED_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("edgecheck_frames_received_total"));
pub static FRAMES_DROPPED_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("edgecheck_frames_dropped_total"));
pub static RECONNECT_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("edgecheck_reconnects_total"));
pub static LISTENER_FAILURE_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("edgecheck_listener_failures_total"));
pub static CONNECTED_GAUGE: LazyLock<Gauge> = LazyLock::new(|| gauge!("edgecheck_connected"));

pub fn setup_metrics(port: u16) -> Result<(), SetupError> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    let builder = PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", "edgecheck")
        .add_global_label("version", env!("CARGO_PKG_VERSION"));

    match builder.install() {
        Ok(_) => {
            info!(
                "Prometheus metrics server started on http://{}/metrics",
                addr
            );

            // Initialize metrics with default values
            FRAMES_RECEIVED_COUNTER.absolute(0);
            FRAMES_DROPPED_COUNTER.absolute(0);
            RECONNECT_COUNTER.absolute(0);
            LISTENER_FAILURE_COUNTER.absolute(0);
            CONNECTED_GAUGE.set(0.0);

            Ok(())
        }
        Err(e) => {
            error!("Failed to start metrics server: {}", e);
            Err(SetupError::MetricsError(e.to_string()))
        }
    }
}

#[derive(Debug)]
pub struct HealthStatus {
    pub is_healthy: bool,
    pub session_id: Option<String>,
    pub last_message_age: Option<std::time::Duration>,
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub total_reconnects: u64,
    pub uptime: chrono::Duration,
}

impl HealthStatus {
    pub fn from_state(state: &ClientState) -> Self {
        let uptime = state
            .connected_since
            .and_then(|since| chrono::Duration::from_std(since.elapsed()).ok())
            .unwrap_or_else(chrono::Duration::zero);

        Self {
            is_healthy: state.is_connected(),
            session_id: state.session_id.clone(),
            last_message_age: state.last_message_time.map(|at| at.elapsed()),
            frames_received: state.frames_received,
            frames_dropped: state.frames_dropped,
            total_reconnects: state.total_reconnects,
            uptime,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "status": if self.is_healthy { "healthy" } else { "unhealthy" },
            "session_id": self.session_id,
            "last_message_age_ms": self.last_message_age.map(|age| age.as_millis() as u64),
            "frames_received": self.frames_received,
            "frames_dropped": self.frames_dropped,
            "total_reconnects": self.total_reconnects,
            "uptime_seconds": self.uptime.num_seconds(),
            "timestamp": chrono::Utc::now()
        })
    }
}
