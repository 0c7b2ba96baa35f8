// file: src/ui.rs
// description: dashboard controller that drives the channel client and renders its events
use crate::{
    api::ApiClient,
    client::ChannelClient,
    config::DashboardOptions,
    events::{ChannelEvent, ErrorEvent, EventKind, EventReceiver, create_event_channel, forward_to},
    formatter::EventFormatter,
    monitoring::HealthStatus,
    types::{CheckResult, CheckStatus, CheckType, HistoryEntry, HistoryQuery, RunChecksRequest},
};
use anyhow::{Context, Result, anyhow};
use std::{collections::BTreeMap, time::Duration};
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{debug, info, warn};

/// Upper bound on waiting for the push channel to close on exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Running,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Finished,
}

pub struct Dashboard {
    client: ChannelClient,
    api: ApiClient,
    formatter: EventFormatter,
    options: DashboardOptions,
    events: EventReceiver,
    phase: RunPhase,
    results: BTreeMap<String, CheckResult>,
    last_status: Option<CheckStatus>,
}

impl Dashboard {
    /// Takes ownership of the client and subscribes to every event kind.
    pub fn new(
        client: ChannelClient,
        api: ApiClient,
        formatter: EventFormatter,
        options: DashboardOptions,
    ) -> Self {
        let (sender, events) = create_event_channel();
        for kind in EventKind::ALL {
            client.on(kind, forward_to(sender.clone()));
        }

        Self {
            client,
            api,
            formatter,
            options,
            events,
            phase: RunPhase::Idle,
            results: BTreeMap::new(),
            last_status: None,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Latest result per check type seen since the dashboard started.
    pub fn results(&self) -> &BTreeMap<String, CheckResult> {
        &self.results
    }

    /// Streams events until Ctrl+C.
    pub async fn watch(&mut self) -> Result<()> {
        self.start_channel();

        // pick up a run that was started elsewhere
        self.poll_status().await;

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut status_tick = interval(self.options.status_interval);
        status_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        status_tick.tick().await;

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => { self.handle_event(event); }
                    None => break,
                },
                _ = status_tick.tick() => {
                    self.poll_status().await;
                }
                _ = &mut ctrl_c => {
                    self.print_connection("STOPPING", "Interrupted, shutting down");
                    break;
                }
            }
        }

        self.stop().await;
        Ok(())
    }

    /// Submits a run and follows it until the aggregate result arrives.
    ///
    /// Results are only pushed to sockets connected at that moment, so the
    /// backend status is polled as well: once it reports idle without the
    /// aggregate having arrived, the result is read back from history.
    pub async fn run(&mut self, request: RunChecksRequest) -> Result<CheckResult> {
        self.start_channel();
        self.wait_for_connect().await;

        let previous = self.latest_aggregate().await.ok().flatten().map(|entry| entry.id);

        let accepted = match self.api.run_checks(&request).await {
            Ok(accepted) => accepted,
            Err(e) => {
                self.stop().await;
                return Err(e).context("check run was rejected");
            }
        };
        info!(checks = ?accepted.checks, "{}", accepted.message);
        self.print_connection("RUNNING", &format!("checks: {}", accepted.checks.join(", ")));
        self.results.clear();
        self.phase = RunPhase::Running;

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut status_tick = interval(self.options.status_interval);
        status_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        status_tick.tick().await;

        let outcome = loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => {
                        if self.handle_event(event) == Flow::Finished {
                            break self.aggregate_result();
                        }
                    }
                    None => break Err(anyhow!("push channel closed before the run finished")),
                },
                _ = status_tick.tick() => {
                    if self.poll_status().await.is_some_and(|status| !status.is_running) {
                        break self.recover_result(previous).await;
                    }
                }
                _ = &mut ctrl_c => {
                    self.print_connection("STOPPING", "Interrupted before the run finished");
                    break Err(anyhow!("check run interrupted"));
                }
            }
        };

        self.stop().await;
        outcome
    }

    fn aggregate_result(&self) -> Result<CheckResult> {
        self.results
            .get(CheckType::All.as_str())
            .cloned()
            .ok_or_else(|| anyhow!("aggregate result missing"))
    }

    async fn latest_aggregate(&self) -> Result<Option<HistoryEntry>> {
        let query = HistoryQuery {
            check_type: Some(CheckType::All),
            ..HistoryQuery::new(1, 1)
        };
        let page = self.api.history(&query).await?;
        Ok(page.items.into_iter().next())
    }

    /// The backend went idle without the aggregate reaching us.
    async fn recover_result(&mut self, previous: Option<i64>) -> Result<CheckResult> {
        // the aggregate may be queued behind the status reply
        while let Ok(event) = self.events.try_recv() {
            if self.handle_event(event) == Flow::Finished {
                return self.aggregate_result();
            }
        }

        self.phase = RunPhase::Done;
        warn!("Backend finished the run without pushing the aggregate result; reading history");
        let missed = "check run ended but its aggregate result was missed";
        match self.latest_aggregate().await.context(missed)? {
            Some(entry) if Some(entry.id) != previous => {
                let result = CheckResult::from_history(entry);
                println!("{}", self.formatter.result_line(&result));
                self.results.insert(result.check_type.clone(), result.clone());
                Ok(result)
            }
            _ => Err(anyhow!(missed)),
        }
    }

    fn start_channel(&self) {
        self.print_connection("CONNECTING", self.client.endpoint().as_str());
        self.client.connect();
    }

    async fn wait_for_connect(&mut self) {
        let grace = self.options.connect_grace;
        let connected = timeout(grace, async {
            while let Some(event) = self.events.recv().await {
                let is_connect = event == ChannelEvent::Connect;
                self.handle_event(event);
                if is_connect {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap_or(false);

        if !connected {
            warn!(
                "Push channel not connected after {:?}; submitting anyway, early progress may be missed",
                grace
            );
        }
    }

    fn handle_event(&mut self, event: ChannelEvent) -> Flow {
        match event {
            ChannelEvent::Connect => {
                self.print_connection("CONNECTED", self.client.endpoint().as_str());
            }
            ChannelEvent::Disconnect => {
                self.print_connection("DISCONNECTED", "Push channel closed, reconnecting");
            }
            ChannelEvent::Progress(update) => {
                if let Some(line) = self.formatter.progress_line(&update) {
                    println!("{}", line);
                }
            }
            ChannelEvent::Result(result) => {
                println!("{}", self.formatter.result_line(&result));
                let finished = result.is_aggregate();
                self.results.insert(result.check_type.clone(), result);
                if finished && self.phase == RunPhase::Running {
                    self.phase = RunPhase::Done;
                    return Flow::Finished;
                }
            }
            ChannelEvent::Error(ErrorEvent::Transport { reason }) => {
                self.print_connection("ERROR", &reason);
            }
            ChannelEvent::Error(ErrorEvent::Check(failure)) => {
                println!("{}", self.formatter.check_error_line(&failure));
            }
        }
        Flow::Continue
    }

    async fn poll_status(&mut self) -> Option<CheckStatus> {
        let status = match self.api.check_status().await {
            Ok(status) => status,
            Err(e) => {
                debug!("Status poll failed: {}", e);
                return None;
            }
        };

        if status.is_running && self.phase != RunPhase::Running {
            self.phase = RunPhase::Running;
        }
        if self.last_status.as_ref() != Some(&status) {
            if !self.formatter.is_quiet() {
                println!("{}", self.formatter.status_line(&status));
            }
            self.last_status = Some(status.clone());
        }
        Some(status)
    }

    fn print_connection(&self, status: &str, message: &str) {
        if let Some(line) = self.formatter.connection_line(status, message) {
            println!("{}", line);
        }
    }

    async fn stop(&mut self) {
        if !self.client.shutdown(SHUTDOWN_GRACE).await {
            warn!("Push channel did not close within {:?}", SHUTDOWN_GRACE);
        }
        let health = HealthStatus::from_state(&self.client.state().await);
        info!(health = %health.to_json(), "Dashboard stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ChannelConfig, formatter::OutputFormat};
    use serde_json::json;
    use url::Url;

    fn dashboard() -> Dashboard {
        let origin = Url::parse("http://127.0.0.1:9").unwrap();
        let client = ChannelClient::new(&ChannelConfig::for_origin(&origin).unwrap()).unwrap();
        let api = ApiClient::new(&origin, Duration::from_secs(1)).unwrap();
        let formatter = EventFormatter::new(OutputFormat::Minimal, false, true);
        Dashboard::new(client, api, formatter, DashboardOptions::default())
    }

    fn check_result(check_type: &str, status: &str) -> ChannelEvent {
        ChannelEvent::Result(CheckResult {
            check_type: check_type.to_string(),
            result: json!({ "status": status, "timestamp": "2024-05-01T09:30:00" }),
        })
    }

    /// Shape of the aggregate the backend pushes when a run completes.
    fn aggregate(overall: &str) -> ChannelEvent {
        ChannelEvent::Result(CheckResult {
            check_type: "all".to_string(),
            result: json!({
                "timestamp": "2024-05-01T09:30:00",
                "summary": { "ups": "PASS", "nas": "FAIL", "overall": overall },
                "checks": { "ups": { "status": "PASS" }, "nas": { "status": "FAIL" } },
                "duration_seconds": 41
            }),
        })
    }

    #[tokio::test]
    async fn aggregate_result_finishes_a_running_run() {
        let mut dashboard = dashboard();
        dashboard.phase = RunPhase::Running;

        assert_eq!(dashboard.handle_event(check_result("ups", "PASS")), Flow::Continue);
        assert_eq!(dashboard.phase(), RunPhase::Running);

        assert_eq!(dashboard.handle_event(aggregate("FAIL")), Flow::Finished);
        assert_eq!(dashboard.phase(), RunPhase::Done);
        assert_eq!(dashboard.results().len(), 2);
        assert_eq!(dashboard.results()["all"].status(), "FAIL");
    }

    #[tokio::test]
    async fn aggregate_result_outside_a_run_is_only_recorded() {
        let mut dashboard = dashboard();

        assert_eq!(dashboard.handle_event(aggregate("PASS")), Flow::Continue);
        assert_eq!(dashboard.phase(), RunPhase::Idle);
        assert!(dashboard.results().contains_key("all"));
    }

    #[tokio::test]
    async fn connection_events_never_finish_a_run() {
        let mut dashboard = dashboard();
        dashboard.phase = RunPhase::Running;

        for event in [
            ChannelEvent::Connect,
            ChannelEvent::Disconnect,
            ChannelEvent::Error(ErrorEvent::Transport {
                reason: "connection reset".to_string(),
            }),
        ] {
            assert_eq!(dashboard.handle_event(event), Flow::Continue);
        }
        assert_eq!(dashboard.phase(), RunPhase::Running);
    }
}
