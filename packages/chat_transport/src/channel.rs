//! The injected connection capability.
//!
//! The client never constructs sockets itself: it is handed a
//! [`ChannelFactory`] and works purely in terms of [`ChannelEvent`]s. The
//! production implementation lives in [`crate::ws`]; tests substitute an
//! in-memory factory.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::types::{ChatMessage, OutboundFrame};

/// Events surfaced by one channel attempt.
///
/// Everything that can go wrong at the transport level arrives as `Closed`
/// with an abnormal code; there is no separate error event. Whether a close
/// is fatal is decided by the client's retry budget, not here.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The connection was established.
    Open,
    /// One inbound message frame.
    Message(ChatMessage),
    /// The connection ended, or could never be established.
    Closed { code: u16, reason: String },
}

/// Handle to one channel attempt.
///
/// The event stream carries at most one `Open`, any number of `Message`s,
/// and ends with a `Closed`.
pub struct ChannelHandle {
    /// Outbound frames to the server.
    pub outbound: mpsc::Sender<OutboundFrame>,
    /// Inbound events from the channel task.
    pub events: mpsc::Receiver<ChannelEvent>,
    /// Cancelling closes the connection with the normal-closure code.
    pub cancel: CancellationToken,
}

impl ChannelHandle {
    /// Close the underlying connection cleanly.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Capability to open live channels for rooms.
pub trait ChannelFactory: Send + Sync + 'static {
    /// Begin opening a channel for `room`. Returns immediately; the outcome
    /// of the attempt arrives as the first event on the handle: `Open` on
    /// success, `Closed` if the connection could not be established.
    fn open(&self, room: &str) -> ChannelHandle;
}
