//! WebSocket implementation of the channel capability.
//!
//! One spawned task per attempt: it connects, reports `Open` or `Closed`,
//! then shuttles JSON text frames both ways until the connection ends or
//! the handle's token is cancelled. Cancellation sends a close frame with
//! the normal code so the server does not treat teardown as an error.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::channel::{ChannelEvent, ChannelFactory, ChannelHandle};
use crate::types::{CLOSE_ABNORMAL, ChatMessage, OutboundFrame};

/// Opens WebSocket channels against `{base_url}/chat/{room}`.
pub struct WsChannelFactory {
    base_url: String,
}

impl WsChannelFactory {
    /// `base_url` is the ws/wss root, e.g. `ws://localhost:8000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    fn room_url(&self, room: &str) -> String {
        format!("{}/chat/{}", self.base_url, room)
    }
}

impl ChannelFactory for WsChannelFactory {
    fn open(&self, room: &str) -> ChannelHandle {
        let url = self.room_url(room);
        let (out_tx, out_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::channel(256);
        let cancel = CancellationToken::new();

        tokio::spawn(run_channel(url, out_rx, event_tx, cancel.clone()));

        ChannelHandle {
            outbound: out_tx,
            events: event_rx,
            cancel,
        }
    }
}

async fn run_channel(
    url: String,
    mut outbound: mpsc::Receiver<OutboundFrame>,
    events: mpsc::Sender<ChannelEvent>,
    cancel: CancellationToken,
) {
    let stream = tokio::select! {
        _ = cancel.cancelled() => return,
        result = tokio_tungstenite::connect_async(&url) => match result {
            Ok((stream, _)) => stream,
            Err(err) => {
                debug!(url = %url, error = %err, "websocket connect failed");
                let _ = events
                    .send(ChannelEvent::Closed {
                        code: CLOSE_ABNORMAL,
                        reason: err.to_string(),
                    })
                    .await;
                return;
            }
        },
    };

    if events.send(ChannelEvent::Open).await.is_err() {
        return;
    }

    let (mut ws_write, mut ws_read) = stream.split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let frame = tungstenite::protocol::CloseFrame {
                    code: tungstenite::protocol::frame::coding::CloseCode::Normal,
                    reason: "client shutdown".into(),
                };
                let _ = ws_write.send(tungstenite::Message::Close(Some(frame))).await;
                return;
            }

            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    // Handle dropped without an explicit cancel; still part ways cleanly.
                    let close = tungstenite::protocol::CloseFrame {
                        code: tungstenite::protocol::frame::coding::CloseCode::Normal,
                        reason: "client shutdown".into(),
                    };
                    let _ = ws_write.send(tungstenite::Message::Close(Some(close))).await;
                    return;
                };
                let json = match serde_json::to_string(&frame) {
                    Ok(json) => json,
                    Err(err) => {
                        warn!(error = %err, "failed to encode outbound frame");
                        continue;
                    }
                };
                if let Err(err) = ws_write.send(tungstenite::Message::Text(json.into())).await {
                    let _ = events
                        .send(ChannelEvent::Closed {
                            code: CLOSE_ABNORMAL,
                            reason: err.to_string(),
                        })
                        .await;
                    return;
                }
            }

            msg = ws_read.next() => {
                match msg {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        match serde_json::from_str::<ChatMessage>(&text) {
                            Ok(message) => {
                                if events.send(ChannelEvent::Message(message)).await.is_err() {
                                    return;
                                }
                            }
                            Err(err) => {
                                warn!(error = %err, "skipping unparseable chat frame");
                            }
                        }
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        let (code, reason) = match frame {
                            Some(frame) => (u16::from(frame.code), frame.reason.to_string()),
                            None => (CLOSE_ABNORMAL, String::new()),
                        };
                        let _ = events.send(ChannelEvent::Closed { code, reason }).await;
                        return;
                    }
                    // Ping/pong are answered by tungstenite; binary frames
                    // are not part of the protocol.
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        let _ = events
                            .send(ChannelEvent::Closed {
                                code: CLOSE_ABNORMAL,
                                reason: err.to_string(),
                            })
                            .await;
                        return;
                    }
                    None => {
                        let _ = events
                            .send(ChannelEvent::Closed {
                                code: CLOSE_ABNORMAL,
                                reason: "stream ended".into(),
                            })
                            .await;
                        return;
                    }
                }
            }
        }
    }
}
