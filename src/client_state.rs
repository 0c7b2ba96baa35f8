/// file: src/client_state.rs
/// description: Connection state shared between the channel driver and its consumers
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClientState {
    pub connection: ConnectionState,
    /// Fresh id per established session.
    pub session_id: Option<String>,
    /// Reconnects scheduled since the last established session.
    pub reconnect_attempts: u32,
    pub total_reconnects: u64,
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub connected_since: Option<Instant>,
    pub last_message_time: Option<Instant>,
    pub last_disconnection_time: Option<Instant>,
}

impl ClientState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    pub fn begin_connecting(&mut self) {
        self.connection = ConnectionState::Connecting;
    }

    pub fn mark_connected(&mut self) -> String {
        let session_id = uuid::Uuid::new_v4().to_string();
        self.connection = ConnectionState::Connected;
        self.session_id = Some(session_id.clone());
        self.reconnect_attempts = 0;
        self.connected_since = Some(Instant::now());
        session_id
    }

    pub fn mark_disconnected(&mut self) {
        if self.connection == ConnectionState::Connected {
            self.last_disconnection_time = Some(Instant::now());
        }
        self.connection = ConnectionState::Disconnected;
        self.session_id = None;
        self.connected_since = None;
    }

    pub fn increment_reconnect(&mut self) -> u32 {
        self.reconnect_attempts = self.reconnect_attempts.saturating_add(1);
        self.total_reconnects += 1;
        self.reconnect_attempts
    }

    pub fn record_message(&mut self) {
        self.last_message_time = Some(Instant::now());
        self.frames_received += 1;
    }

    pub fn record_dropped(&mut self) {
        self.frames_dropped += 1;
    }
}

pub type SharedClientState = Arc<Mutex<ClientState>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_resets_attempts_and_assigns_session() {
        let mut state = ClientState::new();
        state.begin_connecting();
        assert_eq!(state.increment_reconnect(), 1);
        assert_eq!(state.increment_reconnect(), 2);

        let id = state.mark_connected();
        assert!(state.is_connected());
        assert_eq!(state.session_id.as_deref(), Some(id.as_str()));
        assert_eq!(state.reconnect_attempts, 0);
        assert_eq!(state.total_reconnects, 2);

        state.mark_disconnected();
        assert_eq!(state.connection, ConnectionState::Disconnected);
        assert!(state.session_id.is_none());
        assert!(state.last_disconnection_time.is_some());
    }

    #[test]
    fn sessions_get_distinct_ids() {
        let mut state = ClientState::new();
        let first = state.mark_connected();
        state.mark_disconnected();
        let second = state.mark_connected();
        assert_ne!(first, second);
    }
}
