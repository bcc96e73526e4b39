//! In-memory fakes for driving the client deterministically in tests.

use std::sync::Arc;
use std::sync::Mutex;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::channel::{ChannelEvent, ChannelFactory, ChannelHandle};
use crate::error::HistoryError;
use crate::history::HistoryProvider;
use crate::types::{ChatMessage, OutboundFrame};

/// Server-side ends of one faked channel attempt.
///
/// Every method ignores a gone peer: the client is allowed to drop a
/// superseded handle at any time.
pub struct FakePeer {
    pub room: String,
    /// Frames the client pushed to the wire.
    pub sent: mpsc::Receiver<OutboundFrame>,
    /// Cancelled when the client shuts this channel down.
    pub cancel: CancellationToken,
    events: mpsc::Sender<ChannelEvent>,
}

impl FakePeer {
    /// Report the connection as established.
    pub async fn open(&self) {
        let _ = self.events.send(ChannelEvent::Open).await;
    }

    /// Deliver one inbound message.
    pub async fn message(&self, msg: ChatMessage) {
        let _ = self.events.send(ChannelEvent::Message(msg)).await;
    }

    /// End the connection with the given close code.
    pub async fn close(&self, code: u16, reason: &str) {
        let _ = self
            .events
            .send(ChannelEvent::Closed {
                code,
                reason: reason.to_string(),
            })
            .await;
    }
}

/// Channel factory that hands each attempt's peer ends to the test.
pub struct FakeChannelFactory {
    peers: mpsc::UnboundedSender<FakePeer>,
}

impl FakeChannelFactory {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<FakePeer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { peers: tx }), rx)
    }
}

impl ChannelFactory for FakeChannelFactory {
    fn open(&self, room: &str) -> ChannelHandle {
        let (out_tx, out_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let _ = self.peers.send(FakePeer {
            room: room.to_string(),
            sent: out_rx,
            cancel: cancel.clone(),
            events: event_tx,
        });

        ChannelHandle {
            outbound: out_tx,
            events: event_rx,
            cancel,
        }
    }
}

/// History provider that resolves immediately with a canned result.
pub struct FakeHistory {
    result: Mutex<Option<Result<Vec<ChatMessage>, HistoryError>>>,
}

impl FakeHistory {
    pub fn with_messages(messages: Vec<ChatMessage>) -> Self {
        Self {
            result: Mutex::new(Some(Ok(messages))),
        }
    }

    pub fn empty() -> Self {
        Self::with_messages(Vec::new())
    }

    pub fn failing() -> Self {
        Self {
            result: Mutex::new(Some(Err(HistoryError::Status(500)))),
        }
    }
}

impl HistoryProvider for FakeHistory {
    fn fetch(&self, _room: &str) -> oneshot::Receiver<Result<Vec<ChatMessage>, HistoryError>> {
        let (tx, rx) = oneshot::channel();
        if let Some(result) = self.result.lock().expect("poisoned").take() {
            let _ = tx.send(result);
        }
        // A taken result leaves the sender to drop, which the client treats
        // as a failed fetch.
        rx
    }
}

/// History provider the test resolves by hand, for racing live messages
/// against an in-flight fetch.
pub struct ManualHistory {
    pending: Mutex<Vec<oneshot::Sender<Result<Vec<ChatMessage>, HistoryError>>>>,
}

impl ManualHistory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pending: Mutex::new(Vec::new()),
        })
    }

    /// Resolve every outstanding fetch with `result`.
    pub fn resolve(&self, result: Result<Vec<ChatMessage>, HistoryError>) {
        let pending = std::mem::take(&mut *self.pending.lock().expect("poisoned"));
        for tx in pending {
            let cloned = match &result {
                Ok(messages) => Ok(messages.clone()),
                Err(_) => Err(HistoryError::Status(500)),
            };
            let _ = tx.send(cloned);
        }
    }
}

impl HistoryProvider for ManualHistory {
    fn fetch(&self, _room: &str) -> oneshot::Receiver<Result<Vec<ChatMessage>, HistoryError>> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().expect("poisoned").push(tx);
        rx
    }
}
