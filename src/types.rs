/// file: src/types.rs
/// description: wire models for the check push channel and the dashboard REST api
use crate::events::{ChannelEvent, ErrorEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// Helper for history timestamps: the backend emits RFC 3339 for tz-aware rows
// and naive ISO 8601 for rows stored without an offset (treated as UTC).
mod flexible_timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&s) {
            return Ok(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S%.f"))
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}

/// Upper bound of the `progress` field.
pub const MAX_PROGRESS: u8 = 100;

// Push channel frames
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundMessage {
    Progress {
        check_type: String,
        progress: f64,
        message: String,
        status: String,
    },
    Result {
        check_type: String,
        #[serde(default)]
        result: Value,
    },
    Error {
        check_type: String,
        error: String,
    },
    /// Message kinds this client does not know about yet.
    #[serde(other)]
    Unknown,
}

impl InboundMessage {
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Translates a decoded frame into the event handed to listeners.
    /// Returns `None` for unknown message kinds.
    pub fn into_event(self) -> Option<ChannelEvent> {
        match self {
            InboundMessage::Progress {
                check_type,
                progress,
                message,
                status,
            } => Some(ChannelEvent::Progress(ProgressUpdate {
                check_type,
                progress: clamp_progress(progress),
                message,
                status,
            })),
            InboundMessage::Result { check_type, result } => {
                Some(ChannelEvent::Result(CheckResult { check_type, result }))
            }
            InboundMessage::Error { check_type, error } => {
                Some(ChannelEvent::Error(ErrorEvent::Check(CheckFailure {
                    check_type,
                    error,
                })))
            }
            InboundMessage::Unknown => None,
        }
    }
}

/// Rounds to a whole percentage within `0..=MAX_PROGRESS`.
fn clamp_progress(raw: f64) -> u8 {
    raw.round().clamp(0.0, f64::from(MAX_PROGRESS)) as u8
}

// Event payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub check_type: String,
    pub progress: u8,
    pub message: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub check_type: String,
    pub result: Value,
}

impl CheckResult {
    /// Rebuilds an aggregate result from its stored history entry.
    pub fn from_history(entry: HistoryEntry) -> Self {
        Self {
            check_type: entry.check_type,
            result: entry.results.unwrap_or(Value::Null),
        }
    }

    /// Status of the check. Single checks carry a top-level `status`; the
    /// aggregate reports `summary.overall` instead.
    pub fn status(&self) -> &str {
        self.result
            .get("status")
            .or_else(|| {
                self.is_aggregate()
                    .then(|| self.result.get("summary")?.get("overall"))
                    .flatten()
            })
            .and_then(Value::as_str)
            .unwrap_or("UNKNOWN")
    }

    /// Per-check statuses of the aggregate `all` result, without `overall`.
    /// Empty for single checks, whose `summary` holds check-specific data.
    pub fn summary(&self) -> Vec<(String, String)> {
        if !self.is_aggregate() {
            return Vec::new();
        }
        self.result
            .get("summary")
            .and_then(Value::as_object)
            .map(|summary| {
                summary
                    .iter()
                    .filter(|(check, _)| check.as_str() != "overall")
                    .map(|(check, status)| {
                        let status = status.as_str().unwrap_or("UNKNOWN").to_string();
                        (check.clone(), status)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_aggregate(&self) -> bool {
        self.check_type == CheckType::All.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckFailure {
    pub check_type: String,
    pub error: String,
}

// Check identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    Ups,
    Camera,
    Nas,
    System,
    /// Aggregate over every check.
    All,
}

impl CheckType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckType::Ups => "ups",
            CheckType::Camera => "camera",
            CheckType::Nas => "nas",
            CheckType::System => "system",
            CheckType::All => "all",
        }
    }
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckOutcome {
    Pass,
    Fail,
    Error,
    Skip,
}

// REST request/response types
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunChecksRequest {
    /// `None` runs every check.
    pub checks: Option<Vec<CheckType>>,
    pub camera_count: u32,
    pub auto_mode: bool,
}

impl RunChecksRequest {
    pub const DEFAULT_CAMERA_COUNT: u32 = 4;

    /// An empty selection, or one containing `all`, means every check.
    pub fn new(selected: Vec<CheckType>, camera_count: u32, auto_mode: bool) -> Self {
        let checks = if selected.is_empty() || selected.contains(&CheckType::All) {
            None
        } else {
            let mut unique = Vec::with_capacity(selected.len());
            for check in selected {
                if !unique.contains(&check) {
                    unique.push(check);
                }
            }
            Some(unique)
        };

        Self {
            checks,
            camera_count,
            auto_mode,
        }
    }
}

impl Default for RunChecksRequest {
    fn default() -> Self {
        Self::new(Vec::new(), Self::DEFAULT_CAMERA_COUNT, true)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunChecksResponse {
    pub message: String,
    #[serde(default)]
    pub checks: Vec<String>,
    pub camera_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckStatus {
    pub is_running: bool,
    #[serde(default)]
    pub current_check: Option<String>,
    #[serde(default)]
    pub progress: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    #[serde(deserialize_with = "flexible_timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
    pub check_type: String,
    pub status: String,
    #[serde(default)]
    pub results: Option<Value>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<i64>,
    #[serde(default)]
    pub camera_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub total: u64,
    pub items: Vec<HistoryEntry>,
    pub page: u32,
    pub page_size: u32,
}

impl HistoryPage {
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.page_size))
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.page) < self.total_pages()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryQuery {
    pub page: u32,
    pub page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_type: Option<CheckType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CheckOutcome>,
}

impl HistoryQuery {
    pub const MAX_PAGE_SIZE: u32 = 100;

    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, Self::MAX_PAGE_SIZE),
            check_type: None,
            status: None,
        }
    }
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub camera_count: u32,
    pub auto_mode: bool,
    pub scheduler_enabled: bool,
    pub notification_enabled: bool,
}
