// file: src/client.rs
// description: Reconnecting push-channel client for check progress streaming
// reference: backend endpoint /api/checks/ws

use crate::{
    client_state::{ClientState, ConnectionState, SharedClientState},
    config::ChannelConfig,
    error::ChannelError,
    events::{ChannelEvent, ErrorEvent, EventKind},
    monitoring::{
        CONNECTED_GAUGE, FRAMES_DROPPED_COUNTER, FRAMES_RECEIVED_COUNTER, RECONNECT_COUNTER,
    },
    registry::{self, EventRegistry, Listener, SharedRegistry},
    transport::{Frame, Session, Transport, WsTransport},
    types::InboundMessage,
};
use futures_util::future::BoxFuture;
use std::{
    pin::Pin,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{
    runtime::Handle,
    sync::{mpsc, oneshot},
    time::{Sleep, sleep, timeout},
};
use tracing::{debug, error, info, trace, warn};
use url::Url;

#[derive(Debug)]
enum Command {
    Connect,
    /// Carries an acknowledgement once the link is torn down.
    Disconnect(Option<oneshot::Sender<()>>),
}

/// Handle to the push channel.
///
/// The connection itself lives on a driver task spawned at construction.
/// `connect` and `disconnect` only enqueue a command and return; outcomes are
/// observed through the listeners registered with [`ChannelClient::on`].
/// Dropping the handle closes the command queue, which stops the driver and
/// closes any open session.
pub struct ChannelClient {
    endpoint: Url,
    commands: mpsc::UnboundedSender<Command>,
    registry: SharedRegistry,
    state: SharedClientState,
}

impl ChannelClient {
    pub fn new(config: &ChannelConfig) -> Result<Self, ChannelError> {
        Self::with_transport(config, WsTransport)
    }

    pub fn with_transport<T: Transport>(
        config: &ChannelConfig,
        transport: T,
    ) -> Result<Self, ChannelError> {
        let runtime = Handle::try_current().map_err(|_| ChannelError::NoRuntime)?;

        let (commands, command_rx) = mpsc::unbounded_channel();
        let registry: SharedRegistry = Arc::new(Mutex::new(EventRegistry::new()));
        let state: SharedClientState = Arc::new(tokio::sync::Mutex::new(ClientState::new()));

        let driver = Driver {
            transport: Arc::new(transport),
            endpoint: config.endpoint.clone(),
            reconnect_delay: config.reconnect_delay,
            commands: command_rx,
            registry: registry.clone(),
            state: state.clone(),
            link: Link::Idle,
        };
        runtime.spawn(driver.run());

        Ok(Self {
            endpoint: config.endpoint.clone(),
            commands,
            registry,
            state,
        })
    }

    pub fn connect(&self) {
        self.send(Command::Connect);
    }

    pub fn disconnect(&self) {
        self.send(Command::Disconnect(None));
    }

    /// Disconnects and waits up to `grace` for the driver to close the session.
    /// Returns false if the driver is gone or did not finish in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        let (ack, done) = oneshot::channel();
        self.send(Command::Disconnect(Some(ack)));
        matches!(timeout(grace, done).await, Ok(Ok(())))
    }

    pub fn on(&self, kind: EventKind, listener: Listener) {
        registry::lock(&self.registry).on(kind, listener);
    }

    /// Removes the first registration of `listener`; returns false if none matched.
    pub fn off(&self, kind: EventKind, listener: &Listener) -> bool {
        registry::lock(&self.registry).off(kind, listener)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub async fn state(&self) -> ClientState {
        self.state.lock().await.clone()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.state.lock().await.connection
    }

    fn send(&self, command: Command) {
        if let Err(mpsc::error::SendError(command)) = self.commands.send(command) {
            error!("Channel driver has stopped; dropping {:?}", command);
        }
    }
}

enum Link<S> {
    /// Disconnected with nothing scheduled.
    Idle,
    Dialing(BoxFuture<'static, Result<S, ChannelError>>),
    Open(S),
    /// Disconnected, with the single pending reconnect timer.
    Waiting(Pin<Box<Sleep>>),
}

enum Wake<S> {
    Command(Option<Command>),
    Dialed(Result<S, ChannelError>),
    Frame(Option<Result<Frame, ChannelError>>),
    TimerFired,
}

struct Driver<T: Transport> {
    transport: Arc<T>,
    endpoint: Url,
    reconnect_delay: Duration,
    commands: mpsc::UnboundedReceiver<Command>,
    registry: SharedRegistry,
    state: SharedClientState,
    link: Link<T::Session>,
}

impl<T: Transport> Driver<T> {
    async fn run(mut self) {
        debug!(endpoint = %self.endpoint, "Channel driver started");

        loop {
            let wake = match &mut self.link {
                Link::Idle => Wake::Command(self.commands.recv().await),
                Link::Dialing(dial) => tokio::select! {
                    biased;
                    command = self.commands.recv() => Wake::Command(command),
                    result = dial => Wake::Dialed(result),
                },
                Link::Open(session) => tokio::select! {
                    biased;
                    command = self.commands.recv() => Wake::Command(command),
                    frame = session.next_frame() => Wake::Frame(frame),
                },
                Link::Waiting(timer) => tokio::select! {
                    biased;
                    command = self.commands.recv() => Wake::Command(command),
                    () = timer.as_mut() => Wake::TimerFired,
                },
            };

            match wake {
                Wake::Command(Some(command)) => self.apply(command).await,
                Wake::Command(None) => {
                    self.shutdown().await;
                    break;
                }
                Wake::Dialed(result) => self.on_dialed(result).await,
                Wake::Frame(frame) => self.on_frame(frame).await,
                Wake::TimerFired => {
                    info!("Reconnecting to {}", self.endpoint);
                    self.begin_dial().await;
                }
            }
        }

        debug!("Channel driver stopped");
    }

    async fn apply(&mut self, command: Command) {
        match command {
            Command::Connect if matches!(self.link, Link::Idle | Link::Waiting(_)) => {
                self.begin_dial().await
            }
            Command::Connect => {
                debug!("Connect ignored: a session is already open or being established");
            }
            Command::Disconnect(ack) => {
                self.close_link().await;
                if let Some(ack) = ack {
                    let _ = ack.send(());
                }
            }
        }
    }

    async fn begin_dial(&mut self) {
        let transport = self.transport.clone();
        let endpoint = self.endpoint.clone();

        // replacing a Waiting link drops, and so cancels, the pending timer
        self.link = Link::Dialing(Box::pin(
            async move { transport.dial(&endpoint).await },
        ));
        self.state.lock().await.begin_connecting();
        debug!("Connecting to {}", self.endpoint);
    }

    async fn on_dialed(&mut self, result: Result<T::Session, ChannelError>) {
        match result {
            Ok(session) => {
                self.link = Link::Open(session);
                let session_id = self.state.lock().await.mark_connected();
                CONNECTED_GAUGE.set(1.0);
                info!(session_id = %session_id, "Push channel connected to {}", self.endpoint);
                self.emit(ChannelEvent::Connect);
            }
            Err(e) => {
                warn!("Failed to connect to {}: {}", self.endpoint, e);
                self.link = Link::Idle;
                self.lose_connection(Some(e)).await;
            }
        }
    }

    async fn on_frame(&mut self, frame: Option<Result<Frame, ChannelError>>) {
        match frame {
            Some(Ok(Frame::Text(text))) => self.handle_text(&text).await,
            Some(Ok(Frame::Ignored)) => trace!("Ignoring control frame"),
            Some(Ok(Frame::Close(reason))) => {
                info!("Server closed the push channel: {:?}", reason);
                self.link = Link::Idle;
                self.lose_connection(None).await;
            }
            Some(Err(e)) => {
                error!("Push channel stream error: {}", e);
                self.link = Link::Idle;
                self.lose_connection(Some(e)).await;
            }
            None => {
                info!("Push channel stream ended");
                self.link = Link::Idle;
                self.lose_connection(None).await;
            }
        }
    }

    async fn handle_text(&mut self, text: &str) {
        self.state.lock().await.record_message();
        FRAMES_RECEIVED_COUNTER.increment(1);

        let event = match InboundMessage::decode(text) {
            Ok(message) => message.into_event(),
            Err(e) => {
                warn!(
                    "Dropping malformed frame: {}. Frame: {}",
                    e,
                    text.chars().take(100).collect::<String>()
                );
                None
            }
        };

        match event {
            Some(event) => self.emit(event),
            None => {
                debug!("Dropping frame without a known type");
                self.state.lock().await.record_dropped();
                FRAMES_DROPPED_COUNTER.increment(1);
            }
        }
    }

    /// Connection went away on its own: report it and schedule the reconnect.
    async fn lose_connection(&mut self, cause: Option<ChannelError>) {
        self.state.lock().await.mark_disconnected();
        CONNECTED_GAUGE.set(0.0);

        if let Some(e) = cause {
            self.emit(ChannelEvent::Error(ErrorEvent::Transport {
                reason: e.to_string(),
            }));
        }
        self.emit(ChannelEvent::Disconnect);

        let attempt = self.state.lock().await.increment_reconnect();
        RECONNECT_COUNTER.increment(1);
        warn!(
            "Reconnecting in {} ms (attempt {})",
            self.reconnect_delay.as_millis(),
            attempt
        );
        self.link = Link::Waiting(Box::pin(sleep(self.reconnect_delay)));
    }

    /// Explicit disconnect: tear down whatever is in flight, schedule nothing.
    async fn close_link(&mut self) {
        match std::mem::replace(&mut self.link, Link::Idle) {
            Link::Open(mut session) => {
                session.close().await;
                self.state.lock().await.mark_disconnected();
                CONNECTED_GAUGE.set(0.0);
                info!("Push channel disconnected");
                self.emit(ChannelEvent::Disconnect);
            }
            Link::Dialing(_) => {
                self.state.lock().await.mark_disconnected();
                debug!("Connection attempt abandoned");
            }
            Link::Waiting(_) => debug!("Pending reconnect cancelled"),
            Link::Idle => {}
        }
    }

    async fn shutdown(&mut self) {
        if let Link::Open(mut session) = std::mem::replace(&mut self.link, Link::Idle) {
            session.close().await;
            CONNECTED_GAUGE.set(0.0);
        }
        self.state.lock().await.mark_disconnected();
    }

    fn emit(&self, event: ChannelEvent) {
        registry::dispatch(&self.registry, &event);
    }
}
