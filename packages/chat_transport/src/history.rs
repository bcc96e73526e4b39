//! One-shot history fetch for a room.

use tokio::sync::oneshot;

use crate::error::HistoryError;
use crate::types::{ChatMessage, HistoryResponse};

/// Capability to fetch a room's prior messages.
///
/// Fire-and-forget: `fetch` returns immediately and the result arrives on
/// the receiver, so a slow history endpoint never delays channel opening.
pub trait HistoryProvider: Send + Sync + 'static {
    fn fetch(&self, room: &str) -> oneshot::Receiver<Result<Vec<ChatMessage>, HistoryError>>;
}

/// `GET {base_url}/history/{room}` over HTTP.
pub struct HttpHistoryProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpHistoryProvider {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }
}

impl HistoryProvider for HttpHistoryProvider {
    fn fetch(&self, room: &str) -> oneshot::Receiver<Result<Vec<ChatMessage>, HistoryError>> {
        let (tx, rx) = oneshot::channel();
        let client = self.client.clone();
        let url = format!("{}/history/{}", self.base_url, room);

        tokio::spawn(async move {
            let _ = tx.send(fetch_history(client, url).await);
        });

        rx
    }
}

async fn fetch_history(
    client: reqwest::Client,
    url: String,
) -> Result<Vec<ChatMessage>, HistoryError> {
    let response = client.get(&url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(HistoryError::Status(status.as_u16()));
    }
    let body: HistoryResponse = response.json().await?;
    Ok(body.messages)
}
