// file: src/transport.rs
// description: Transport seam under the channel client, with the tungstenite implementation

use crate::error::ChannelError;
use futures_util::StreamExt;
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::Message,
};
use tracing::{debug, trace};
use url::Url;

/// One inbound unit as far as the channel client cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    /// The peer started a close handshake.
    Close(Option<String>),
    /// Binary, ping, pong and raw frames.
    Ignored,
}

pub trait Session: Send + 'static {
    /// Next frame from the peer; `None` once the stream has ended.
    /// Must be cancel safe: the driver polls it inside `select!`.
    fn next_frame(&mut self) -> impl Future<Output = Option<Result<Frame, ChannelError>>> + Send;

    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

pub trait Transport: Send + Sync + 'static {
    type Session: Session;

    fn dial(
        &self,
        endpoint: &Url,
    ) -> impl Future<Output = Result<Self::Session, ChannelError>> + Send;
}

/// How long `close` waits for the peer to acknowledge a close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

pub struct WsSession {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Transport for WsTransport {
    type Session = WsSession;

    async fn dial(&self, endpoint: &Url) -> Result<WsSession, ChannelError> {
        let (stream, response) = connect_async(endpoint.as_str()).await?;
        debug!(
            status = %response.status(),
            endpoint = %endpoint,
            "WebSocket handshake completed"
        );
        Ok(WsSession { stream })
    }
}

impl Session for WsSession {
    async fn next_frame(&mut self) -> Option<Result<Frame, ChannelError>> {
        let message = self.stream.next().await?;
        Some(message.map(Frame::from).map_err(ChannelError::from))
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("Close handshake failed: {}", e);
            return;
        }
        let drain = async {
            while let Some(Ok(message)) = self.stream.next().await {
                trace!("Discarding frame after close: {:?}", message);
            }
        };
        if tokio::time::timeout(CLOSE_GRACE, drain).await.is_err() {
            debug!("Peer did not acknowledge close within {:?}", CLOSE_GRACE);
        }
    }
}

impl From<Message> for Frame {
    fn from(message: Message) -> Self {
        match message {
            Message::Text(text) => Frame::Text(text.as_str().to_owned()),
            Message::Close(frame) => Frame::Close(frame.map(|f| f.reason.as_str().to_owned())),
            Message::Binary(data) => {
                debug!("Ignoring binary message of {} bytes", data.len());
                Frame::Ignored
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Frame::Ignored,
        }
    }
}
