//! Client boundary errors.

/// Errors from [`crate::ChatClient::start`].
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("room name must not be empty")]
    EmptyRoom,
}

/// Errors from [`crate::ChatClient::send_message`].
///
/// A rejected send performs no network action: messages are not queued or
/// retried while the connection is down.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("not connected")]
    NotConnected,
    #[error("client is stopped")]
    Stopped,
}

/// Errors from a history fetch. Non-fatal to the client: a failed fetch is
/// logged and chat proceeds with an empty log.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("history request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("history endpoint returned status {0}")]
    Status(u16),
}
