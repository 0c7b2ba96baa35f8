use crate::types::{
    CheckFailure, CheckResult, CheckStatus, DashboardConfig, HistoryEntry, HistoryPage,
    ProgressUpdate,
};
use serde_json::json;

// ANSI color codes
pub struct Colors;

impl Colors {
    pub const RESET: &'static str = "\x1b[0m";
    pub const BOLD: &'static str = "\x1b[1m";
    pub const DIM: &'static str = "\x1b[2m";

    // Colors
    pub const RED: &'static str = "\x1b[31m";
    pub const GREEN: &'static str = "\x1b[32m";
    pub const YELLOW: &'static str = "\x1b[33m";
    pub const CYAN: &'static str = "\x1b[36m";
    pub const WHITE: &'static str = "\x1b[37m";
    pub const GRAY: &'static str = "\x1b[90m";

    // Bright colors
    pub const BRIGHT_RED: &'static str = "\x1b[91m";
    pub const BRIGHT_GREEN: &'static str = "\x1b[92m";
    pub const BRIGHT_YELLOW: &'static str = "\x1b[93m";
    pub const BRIGHT_BLUE: &'static str = "\x1b[94m";
    pub const BRIGHT_MAGENTA: &'static str = "\x1b[95m";
    pub const BRIGHT_CYAN: &'static str = "\x1b[96m";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Minimal,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "minimal" => OutputFormat::Minimal,
            _ => OutputFormat::Table,
        }
    }
}

const PROGRESS_BAR_WIDTH: usize = 20;

pub struct EventFormatter {
    format: OutputFormat,
    colored: bool,
    quiet: bool,
}

impl EventFormatter {
    pub fn new(format: OutputFormat, colored: bool, quiet: bool) -> Self {
        Self {
            format,
            colored,
            quiet,
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.colored {
            format!("{}{}{}", color, text, Colors::RESET)
        } else {
            text.to_string()
        }
    }

    fn status_color(status: &str) -> &'static str {
        match status.to_ascii_uppercase().as_str() {
            "PASS" | "COMPLETED" => Colors::BRIGHT_GREEN,
            "FAIL" | "ERROR" => Colors::BRIGHT_RED,
            "RUNNING" => Colors::BRIGHT_BLUE,
            _ => Colors::BRIGHT_YELLOW,
        }
    }

    /// Connection lifecycle line; `None` when quiet (errors still print).
    pub fn connection_line(&self, status: &str, message: &str) -> Option<String> {
        if self.quiet && status != "ERROR" {
            return None;
        }

        let line = match self.format {
            OutputFormat::Json => json!({"event": "connection", "status": status, "message": message})
                .to_string(),
            OutputFormat::Minimal => format!("{} {}", status.to_lowercase(), message),
            OutputFormat::Table => {
                let (color, symbol) = match status {
                    "CONNECTING" => (Colors::BRIGHT_YELLOW, "*"),
                    "CONNECTED" => (Colors::BRIGHT_GREEN, "+"),
                    "DISCONNECTED" => (Colors::BRIGHT_RED, "X"),
                    "ERROR" => (Colors::BRIGHT_RED, "!"),
                    "STOPPING" => (Colors::BRIGHT_MAGENTA, "!"),
                    _ => (Colors::WHITE, "-"),
                };
                format!(
                    "{} {} {}",
                    self.paint(&format!("{}{}", Colors::BOLD, color), &format!("[{}]", status)),
                    symbol,
                    message
                )
            }
        };
        Some(line)
    }

    pub fn progress_line(&self, update: &ProgressUpdate) -> Option<String> {
        if self.quiet {
            return None;
        }

        let line = match self.format {
            OutputFormat::Json => json!({"event": "progress", "data": update}).to_string(),
            OutputFormat::Minimal => format!(
                "{} {}% {} {}",
                update.check_type, update.progress, update.status, update.message
            ),
            OutputFormat::Table => {
                let filled = usize::from(update.progress.min(100)) * PROGRESS_BAR_WIDTH / 100;
                let bar = format!(
                    "{}{}",
                    "█".repeat(filled),
                    "░".repeat(PROGRESS_BAR_WIDTH - filled)
                );
                format!(
                    "{} {:<7} {} {:>3}% {} {}",
                    self.paint(Colors::BRIGHT_CYAN, "[PROGRESS]"),
                    update.check_type,
                    self.paint(Colors::CYAN, &bar),
                    update.progress,
                    self.paint(Self::status_color(&update.status), &format!("{:<9}", update.status)),
                    update.message
                )
            }
        };
        Some(line)
    }

    pub fn result_line(&self, result: &CheckResult) -> String {
        let status = result.status();
        match self.format {
            OutputFormat::Json => json!({"event": "result", "data": result}).to_string(),
            OutputFormat::Minimal => {
                let mut line = format!("{} {}", result.check_type, status);
                for (check, check_status) in result.summary() {
                    line.push_str(&format!(" {}={}", check, check_status));
                }
                line
            }
            OutputFormat::Table => {
                let mut line = format!(
                    "{} {:<7} {}",
                    self.paint(Colors::BRIGHT_GREEN, "[RESULT]"),
                    result.check_type,
                    self.paint(Self::status_color(status), status)
                );
                let summary = result.summary();
                if !summary.is_empty() {
                    let parts: Vec<String> = summary
                        .iter()
                        .map(|(check, check_status)| {
                            format!(
                                "{}={}",
                                check,
                                self.paint(Self::status_color(check_status), check_status)
                            )
                        })
                        .collect();
                    line.push_str(&format!(" ({})", parts.join(" ")));
                }
                line
            }
        }
    }

    pub fn check_error_line(&self, failure: &CheckFailure) -> String {
        match self.format {
            OutputFormat::Json => json!({"event": "error", "data": failure}).to_string(),
            OutputFormat::Minimal => format!("{} ERROR {}", failure.check_type, failure.error),
            OutputFormat::Table => format!(
                "{} {:<7} {}",
                self.paint(&format!("{}{}", Colors::BOLD, Colors::BRIGHT_RED), "[CHECK ERROR]"),
                failure.check_type,
                self.paint(Colors::RED, &failure.error)
            ),
        }
    }

    pub fn status_line(&self, status: &CheckStatus) -> String {
        match self.format {
            OutputFormat::Json => json!({"event": "status", "data": status}).to_string(),
            OutputFormat::Minimal => match &status.current_check {
                Some(check) if status.is_running => format!("running {}", check),
                _ if status.is_running => "running".to_string(),
                _ => "idle".to_string(),
            },
            OutputFormat::Table => {
                let state = if status.is_running {
                    self.paint(Colors::BRIGHT_BLUE, "RUNNING")
                } else {
                    self.paint(Colors::GRAY, "IDLE")
                };
                let mut line = format!("{} {}", self.paint(Colors::BOLD, "[STATUS]"), state);
                if let Some(check) = &status.current_check {
                    line.push_str(&format!(" current check: {}", check));
                }
                if let Some(progress) = status.progress {
                    line.push_str(&format!(" ({}%)", progress));
                }
                line
            }
        }
    }

    pub fn history_table(&self, page: &HistoryPage) -> String {
        match self.format {
            OutputFormat::Json => json!(page).to_string(),
            OutputFormat::Minimal => page
                .items
                .iter()
                .map(|entry| {
                    format!(
                        "{} {} {} {}",
                        entry.id,
                        entry.timestamp.to_rfc3339(),
                        entry.check_type,
                        entry.status
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
            OutputFormat::Table => {
                let mut out = Vec::with_capacity(page.items.len() + 4);
                out.push(self.paint(
                    Colors::GRAY,
                    "┌────────┬─────────────────────┬─────────┬────────┬──────────┐",
                ));
                out.push(format!(
                    "│ {:<6} │ {:<19} │ {:<7} │ {:<6} │ {:<8} │",
                    "ID", "TIMESTAMP (UTC)", "CHECK", "STATUS", "DURATION"
                ));
                out.push(self.paint(
                    Colors::GRAY,
                    "├────────┼─────────────────────┼─────────┼────────┼──────────┤",
                ));
                for entry in &page.items {
                    let duration = entry
                        .duration_seconds
                        .map(|secs| format!("{}s", secs))
                        .unwrap_or_else(|| "-".to_string());
                    out.push(format!(
                        "│ {:<6} │ {:<19} │ {:<7} │ {} │ {:<8} │",
                        entry.id,
                        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        entry.check_type,
                        self.paint(Self::status_color(&entry.status), &format!("{:<6}", entry.status)),
                        duration
                    ));
                }
                out.push(self.paint(
                    Colors::GRAY,
                    "└────────┴─────────────────────┴─────────┴────────┴──────────┘",
                ));
                out.push(format!(
                    "page {}/{} ({} entries)",
                    page.page,
                    page.total_pages().max(1),
                    page.total
                ));
                out.join("\n")
            }
        }
    }

    pub fn history_detail(&self, entry: &HistoryEntry) -> String {
        match self.format {
            OutputFormat::Json => json!(entry).to_string(),
            OutputFormat::Minimal | OutputFormat::Table => {
                let mut out = vec![
                    format!("{} {}", self.paint(Colors::BOLD, "id:       "), entry.id),
                    format!("{} {}", self.paint(Colors::BOLD, "time:     "), entry.timestamp.to_rfc3339()),
                    format!("{} {}", self.paint(Colors::BOLD, "check:    "), entry.check_type),
                    format!(
                        "{} {}",
                        self.paint(Colors::BOLD, "status:   "),
                        self.paint(Self::status_color(&entry.status), &entry.status)
                    ),
                ];
                if let Some(secs) = entry.duration_seconds {
                    out.push(format!("{} {}s", self.paint(Colors::BOLD, "duration: "), secs));
                }
                if let Some(cameras) = entry.camera_count {
                    out.push(format!("{} {}", self.paint(Colors::BOLD, "cameras:  "), cameras));
                }
                if let Some(error) = &entry.error_message {
                    out.push(format!(
                        "{} {}",
                        self.paint(Colors::BOLD, "error:    "),
                        self.paint(Colors::RED, error)
                    ));
                }
                if let Some(results) = &entry.results {
                    let pretty = serde_json::to_string_pretty(results)
                        .unwrap_or_else(|_| results.to_string());
                    out.push(self.paint(Colors::BOLD, "results:"));
                    out.push(self.paint(Colors::DIM, &pretty));
                }
                out.join("\n")
            }
        }
    }

    pub fn config_block(&self, config: &DashboardConfig) -> String {
        match self.format {
            OutputFormat::Json => json!(config).to_string(),
            OutputFormat::Minimal | OutputFormat::Table => {
                let flag = |enabled: bool| {
                    if enabled {
                        self.paint(Colors::GREEN, "enabled")
                    } else {
                        self.paint(Colors::YELLOW, "disabled")
                    }
                };
                [
                    format!("camera count:  {}", config.camera_count),
                    format!("auto mode:     {}", flag(config.auto_mode)),
                    format!("scheduler:     {}", flag(config.scheduler_enabled)),
                    format!("notifications: {}", flag(config.notification_enabled)),
                ]
                .join("\n")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn plain(format: OutputFormat) -> EventFormatter {
        EventFormatter::new(format, false, false)
    }

    fn update() -> ProgressUpdate {
        ProgressUpdate {
            check_type: "ups".into(),
            progress: 50,
            message: "checking".into(),
            status: "running".into(),
        }
    }

    #[test]
    fn progress_bar_reflects_percentage() {
        let line = plain(OutputFormat::Table).progress_line(&update()).unwrap();
        assert!(line.contains(&format!("{}{}", "█".repeat(10), "░".repeat(10))));
        assert!(line.contains(" 50%"));
        assert!(line.ends_with("checking"));
    }

    #[test]
    fn json_progress_uses_payload_field_names() {
        let line = plain(OutputFormat::Json).progress_line(&update()).unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["event"], "progress");
        assert_eq!(value["data"]["checkType"], "ups");
        assert_eq!(value["data"]["progress"], 50);
    }

    #[test]
    fn quiet_suppresses_progress_but_not_errors() {
        let quiet = EventFormatter::new(OutputFormat::Minimal, false, true);
        assert!(quiet.progress_line(&update()).is_none());
        assert!(quiet.connection_line("CONNECTED", "ok").is_none());
        assert_eq!(
            quiet.connection_line("ERROR", "refused").as_deref(),
            Some("error refused")
        );
    }

    #[test]
    fn aggregate_result_lists_summary() {
        let result = CheckResult {
            check_type: "all".into(),
            result: json!({
                "timestamp": "2024-05-01T09:30:00",
                "summary": {"nas": "FAIL", "ups": "PASS", "overall": "FAIL"},
                "checks": {},
                "duration_seconds": 41
            }),
        };
        assert_eq!(
            plain(OutputFormat::Minimal).result_line(&result),
            "all FAIL nas=FAIL ups=PASS"
        );
        assert!(plain(OutputFormat::Table).result_line(&result).ends_with("(nas=FAIL ups=PASS)"));
    }

    #[test]
    fn single_check_summary_is_not_rendered() {
        let result = CheckResult {
            check_type: "system".into(),
            result: json!({"status": "PASS", "summary": {"pass_count": 12, "fail_count": 0}}),
        };
        assert_eq!(plain(OutputFormat::Minimal).result_line(&result), "system PASS");
        assert!(!plain(OutputFormat::Table).result_line(&result).contains("pass_count"));
    }

    #[test]
    fn status_line_describes_current_check() {
        let status = CheckStatus {
            is_running: true,
            current_check: Some("camera".into()),
            progress: None,
        };
        assert_eq!(plain(OutputFormat::Minimal).status_line(&status), "running camera");
        assert!(plain(OutputFormat::Table)
            .status_line(&status)
            .contains("current check: camera"));
    }

    #[test]
    fn colored_output_wraps_in_ansi_codes() {
        let colored = EventFormatter::new(OutputFormat::Table, true, false);
        let failure = CheckFailure {
            check_type: "nas".into(),
            error: "ssh refused".into(),
        };
        let line = colored.check_error_line(&failure);
        assert!(line.contains(Colors::RED));
        assert!(line.contains(Colors::RESET));
    }
}
