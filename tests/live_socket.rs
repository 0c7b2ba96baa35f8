// Channel client against a real WebSocket server on loopback.

use edgecheck::{
    client::ChannelClient,
    client_state::ConnectionState,
    config::ChannelConfig,
    events::{ChannelEvent, ErrorEvent, EventKind},
    registry::listener,
};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::{
    net::TcpListener,
    sync::{mpsc, oneshot},
    time::timeout,
};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use url::Url;

const WAIT: Duration = Duration::from_secs(10);

fn config(addr: std::net::SocketAddr, delay_ms: u64) -> ChannelConfig {
    ChannelConfig {
        endpoint: Url::parse(&format!("ws://{}/api/checks/ws", addr)).unwrap(),
        reconnect_delay: Duration::from_millis(delay_ms),
    }
}

fn record_all(client: &ChannelClient) -> mpsc::UnboundedReceiver<ChannelEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    for kind in EventKind::ALL {
        let tx = tx.clone();
        client.on(
            kind,
            listener(move |event| {
                tx.send(event.clone())?;
                Ok(())
            }),
        );
    }
    rx
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<ChannelEvent>) -> ChannelEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event stream closed")
}

/// Each accepted connection gets the next script entry: the frames are sent,
/// then the server closes. Connections past the end of the script stay open.
async fn scripted_server(script: Vec<Vec<&'static str>>) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut script = script.into_iter();
        loop {
            let Ok((tcp, _)) = listener.accept().await else {
                return;
            };
            let frames = script.next();
            tokio::spawn(async move {
                let mut ws = accept_async(tcp).await.unwrap();
                match frames {
                    Some(frames) => {
                        for frame in frames {
                            ws.send(Message::text(frame)).await.unwrap();
                        }
                        let _ = ws.close(None).await;
                        while let Some(Ok(_)) = ws.next().await {}
                    }
                    None => while let Some(Ok(_)) = ws.next().await {},
                }
            });
        }
    });

    addr
}

#[tokio::test]
async fn frames_are_delivered_and_a_server_close_triggers_reconnect() {
    let addr = scripted_server(vec![vec![
        r#"{"type":"progress","check_type":"ups","progress":40,"message":"polling battery","status":"running"}"#,
        r#"{"type":"heartbeat"}"#,
        r#"{"type":"result","check_type":"ups","result":{"status":"PASS","battery":97}}"#,
    ]])
    .await;

    let client = ChannelClient::new(&config(addr, 100)).unwrap();
    let mut events = record_all(&client);
    client.connect();

    assert_eq!(next_event(&mut events).await, ChannelEvent::Connect);

    match next_event(&mut events).await {
        ChannelEvent::Progress(update) => {
            assert_eq!(update.check_type, "ups");
            assert_eq!(update.progress, 40);
            assert_eq!(update.message, "polling battery");
        }
        other => panic!("expected progress, got {:?}", other),
    }

    // the heartbeat has no listener-visible event
    match next_event(&mut events).await {
        ChannelEvent::Result(result) => {
            assert_eq!(result.check_type, "ups");
            assert_eq!(result.status(), "PASS");
        }
        other => panic!("expected result, got {:?}", other),
    }

    assert_eq!(next_event(&mut events).await, ChannelEvent::Disconnect);
    assert_eq!(next_event(&mut events).await, ChannelEvent::Connect);

    let state = client.state().await;
    assert_eq!(state.connection, ConnectionState::Connected);
    assert_eq!(state.total_reconnects, 1);
    assert_eq!(state.frames_received, 3);
    assert_eq!(state.frames_dropped, 1);
}

#[tokio::test]
async fn refused_endpoint_reports_transport_errors_and_keeps_retrying() {
    // reserve a port, then free it so nothing is listening there
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let client = ChannelClient::new(&config(addr, 50)).unwrap();
    let mut events = record_all(&client);
    client.connect();

    for _ in 0..2 {
        match next_event(&mut events).await {
            ChannelEvent::Error(ErrorEvent::Transport { reason }) => assert!(!reason.is_empty()),
            other => panic!("expected transport error, got {:?}", other),
        }
        assert_eq!(next_event(&mut events).await, ChannelEvent::Disconnect);
    }

    client.disconnect();
    tokio::time::sleep(Duration::from_millis(200)).await;
    while let Ok(event) = events.try_recv() {
        // one attempt may already have been in flight when disconnect landed
        assert!(
            matches!(event, ChannelEvent::Error(_) | ChannelEvent::Disconnect),
            "unexpected {:?}",
            event
        );
    }
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(events.try_recv().is_err(), "retries continued after disconnect");
    assert_eq!(client.connection_state().await, ConnectionState::Disconnected);
}

#[tokio::test]
async fn shutdown_sends_a_close_frame_before_returning() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (closed_tx, closed_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(tcp).await.unwrap();
        let mut closed_tx = Some(closed_tx);
        while let Some(Ok(message)) = ws.next().await {
            if message.is_close() {
                if let Some(tx) = closed_tx.take() {
                    let _ = tx.send(());
                }
            }
        }
    });

    let client = ChannelClient::new(&config(addr, 100)).unwrap();
    let mut events = record_all(&client);
    client.connect();
    assert_eq!(next_event(&mut events).await, ChannelEvent::Connect);

    assert!(client.shutdown(WAIT).await);
    assert_eq!(client.connection_state().await, ConnectionState::Disconnected);
    assert_eq!(next_event(&mut events).await, ChannelEvent::Disconnect);
    timeout(WAIT, closed_rx)
        .await
        .expect("server never saw a close frame")
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(events.try_recv().is_err(), "no reconnect after explicit disconnect");
}
