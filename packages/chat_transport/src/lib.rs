//! # Chat Transport
//!
//! A reconnecting client for one support-chat conversation room: it loads
//! the room's prior history once, keeps a persistent bidirectional channel
//! open, and exposes the room as an append-only message log plus a
//! connection-status stream.
//!
//! The client owns the whole connection lifecycle:
//! - abnormal closures re-enter a capped exponential backoff
//!   ([`ReconnectPolicy`]) with a bounded attempt budget,
//! - a normal closure (code 1000) never reconnects,
//! - once the budget is exhausted the client parks in a terminal failed
//!   state until a manual [`ChatClient::reconnect_now`].
//!
//! The connection primitive itself is injected as a [`ChannelFactory`], so
//! tests drive the client with in-memory channels while production uses the
//! WebSocket implementation in [`ws`].
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chat_transport::{ChatClient, ClientOptions, HttpHistoryProvider, WsChannelFactory};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let http = reqwest::Client::new();
//! let client = ChatClient::start(
//!     "general",
//!     "alice",
//!     Arc::new(WsChannelFactory::new("ws://localhost:8000")),
//!     Arc::new(HttpHistoryProvider::new(http, "http://localhost:8000")),
//!     ClientOptions::default(),
//! )?;
//!
//! let mut updates = client.updates();
//! updates.wait_for(|u| u.state.is_open()).await?;
//! client.send_message("hello").await?;
//! client.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod channel;
mod client;
mod error;
pub mod history;
mod log;
mod policy;
mod types;
pub mod ws;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use channel::{ChannelEvent, ChannelFactory, ChannelHandle};
pub use client::{ChatClient, ClientOptions, ClientUpdate};
pub use error::{HistoryError, SendError, StartError};
pub use history::{HistoryProvider, HttpHistoryProvider};
pub use log::MessageLog;
pub use policy::ReconnectPolicy;
pub use types::{
    CLOSE_ABNORMAL, CLOSE_NORMAL, ChatMessage, ConnectionState, HistoryResponse, OutboundFrame,
};
pub use ws::WsChannelFactory;
