//! The chat transport client: one room, one connection lifecycle, one log.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::{ChannelEvent, ChannelFactory, ChannelHandle};
use crate::error::{SendError, StartError};
use crate::history::HistoryProvider;
use crate::log::MessageLog;
use crate::policy::ReconnectPolicy;
use crate::types::{CLOSE_ABNORMAL, CLOSE_NORMAL, ChatMessage, ConnectionState, OutboundFrame};

const STATUS_CONNECTING: &str = "connecting";
const STATUS_CONNECTED: &str = "connected";
const STATUS_DISCONNECTED: &str = "disconnected";

/// Latest client state, published to observers through a watch channel.
#[derive(Debug, Clone)]
pub struct ClientUpdate {
    pub state: ConnectionState,
    /// Human-readable connection status for display.
    pub status: String,
    /// Snapshot of the room's message log.
    pub messages: Arc<[ChatMessage]>,
}

/// Tunables for [`ChatClient::start`].
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub policy: ReconnectPolicy,
    /// Append sent messages locally instead of waiting for the server echo.
    /// Off by default: the backend echoes every room message back to its
    /// sender, so a local copy would duplicate it.
    pub local_echo: bool,
}

enum Command {
    Send {
        text: String,
        reply: oneshot::Sender<Result<(), SendError>>,
    },
    Reconnect,
}

/// Handle to a running client.
///
/// A client is live from construction until [`stop`](Self::stop); there is
/// no unstarted client value, so starting one twice cannot be expressed.
/// Dropping the handle without `stop` also tears the driver down, just
/// without waiting for it.
pub struct ChatClient {
    cmd_tx: mpsc::Sender<Command>,
    updates: watch::Receiver<ClientUpdate>,
    cancel: CancellationToken,
    driver: tokio::task::JoinHandle<()>,
}

impl ChatClient {
    /// Start a client for `room`: immediately fetch its history and open
    /// the live channel. `author` tags outbound messages.
    pub fn start(
        room: &str,
        author: &str,
        factory: Arc<dyn ChannelFactory>,
        history: Arc<dyn HistoryProvider>,
        options: ClientOptions,
    ) -> Result<Self, StartError> {
        if room.trim().is_empty() {
            return Err(StartError::EmptyRoom);
        }

        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (update_tx, updates) = watch::channel(ClientUpdate {
            state: ConnectionState::Connecting,
            status: STATUS_CONNECTING.to_string(),
            messages: Vec::new().into(),
        });
        let cancel = CancellationToken::new();

        let driver = Driver {
            room: room.to_string(),
            author: author.to_string(),
            factory,
            history,
            policy: options.policy,
            local_echo: options.local_echo,
            log: MessageLog::new(),
            attempts: 0,
            state: ConnectionState::Connecting,
            status: STATUS_CONNECTING.to_string(),
            update_tx,
            cancel: cancel.clone(),
        };
        let driver = tokio::spawn(driver.run(cmd_rx));

        Ok(Self {
            cmd_tx,
            updates,
            cancel,
            driver,
        })
    }

    /// Subscribe to `(state, status, log)` updates.
    pub fn updates(&self) -> watch::Receiver<ClientUpdate> {
        self.updates.clone()
    }

    /// Send one message on the live channel.
    ///
    /// The text must be non-empty after trimming, and the connection must
    /// currently be open: a send while disconnected is rejected without any
    /// network action — nothing is queued or retried.
    pub async fn send_message(&self, text: &str) -> Result<(), SendError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SendError::EmptyMessage);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Send {
                text: text.to_string(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| SendError::Stopped)?;
        reply_rx.await.map_err(|_| SendError::Stopped)?
    }

    /// Drop any pending backoff timer, reset the attempt budget, and try
    /// to reopen immediately. Available in any state.
    pub async fn reconnect_now(&self) {
        let _ = self.cmd_tx.send(Command::Reconnect).await;
    }

    /// Tear the client down: cancel any pending reconnect, close the live
    /// channel with the normal-closure code, and wait for the driver to
    /// finish. The final update still carries the full log.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.driver.await;
    }
}

/// Single task owning all client state. Channel events, the (single)
/// retry timer, the history result, and caller commands are multiplexed
/// through one `select!` loop, so no two of them ever race on the state.
struct Driver {
    room: String,
    author: String,
    factory: Arc<dyn ChannelFactory>,
    history: Arc<dyn HistoryProvider>,
    policy: ReconnectPolicy,
    local_echo: bool,
    log: MessageLog,
    attempts: u32,
    state: ConnectionState,
    status: String,
    update_tx: watch::Sender<ClientUpdate>,
    cancel: CancellationToken,
}

impl Driver {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<Command>) {
        info!(room = %self.room, "chat client starting");

        let mut history_rx = Some(self.history.fetch(&self.room));
        let mut channel = Some(self.factory.open(&self.room));
        let mut retry_at: Option<Instant> = None;

        self.publish();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,

                result = async { history_rx.as_mut().expect("guarded by is_some").await },
                    if history_rx.is_some() =>
                {
                    history_rx = None;
                    match result {
                        Ok(Ok(batch)) => {
                            debug!(room = %self.room, count = batch.len(), "history loaded");
                            self.log.resolve_history(batch);
                        }
                        Ok(Err(err)) => {
                            warn!(room = %self.room, error = %err, "history fetch failed");
                            self.log.resolve_history(Vec::new());
                        }
                        Err(_) => {
                            warn!(room = %self.room, "history fetch abandoned");
                            self.log.resolve_history(Vec::new());
                        }
                    }
                    self.publish();
                }

                event = async { channel.as_mut().expect("guarded by is_some").events.recv().await },
                    if channel.is_some() =>
                {
                    match event {
                        Some(ChannelEvent::Open) => self.on_open(),
                        Some(ChannelEvent::Message(msg)) => {
                            self.log.append(msg);
                            self.publish();
                        }
                        Some(ChannelEvent::Closed { code, reason }) => {
                            channel = None;
                            self.on_closed(code, reason, &mut retry_at);
                        }
                        None => {
                            // Channel task died without a close event.
                            channel = None;
                            self.on_closed(CLOSE_ABNORMAL, "channel task ended".into(), &mut retry_at);
                        }
                    }
                }

                _ = async { tokio::time::sleep_until(retry_at.expect("guarded by is_some")).await },
                    if retry_at.is_some() =>
                {
                    retry_at = None;
                    info!(room = %self.room, attempt = self.attempts, "reconnecting");
                    self.set_state(ConnectionState::Connecting, STATUS_CONNECTING);
                    channel = Some(self.factory.open(&self.room));
                }

                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(Command::Send { text, reply }) => {
                            let result = self.handle_send(channel.as_ref(), text).await;
                            let _ = reply.send(result);
                        }
                        Some(Command::Reconnect) => {
                            retry_at = None;
                            self.attempts = 0;
                            if let Some(old) = channel.take() {
                                // Drop the old handle so a late event from it
                                // cannot reach this loop.
                                old.shutdown();
                            }
                            info!(room = %self.room, "manual reconnect");
                            self.set_state(ConnectionState::Connecting, STATUS_CONNECTING);
                            channel = Some(self.factory.open(&self.room));
                        }
                        None => break,
                    }
                }
            }
        }

        // Teardown: no reopen can happen past this point; the live channel,
        // if any, parts with the normal-closure code.
        if let Some(channel) = channel {
            channel.shutdown();
        }
        self.set_state(ConnectionState::Idle, STATUS_DISCONNECTED);
        info!(room = %self.room, "chat client stopped");
    }

    fn on_open(&mut self) {
        self.attempts = 0;
        info!(room = %self.room, "channel open");
        self.set_state(ConnectionState::Open, STATUS_CONNECTED);
    }

    fn on_closed(&mut self, code: u16, reason: String, retry_at: &mut Option<Instant>) {
        if code == CLOSE_NORMAL {
            info!(room = %self.room, "channel closed normally");
            self.set_state(ConnectionState::Closed { code, reason }, STATUS_DISCONNECTED);
            return;
        }

        if self.attempts < self.policy.max_attempts {
            self.attempts += 1;
            let delay = self.policy.delay_for(self.attempts);
            *retry_at = Some(Instant::now() + delay);
            let status = format!(
                "reconnecting in {}s, attempt {}/{}",
                delay.as_secs(),
                self.attempts,
                self.policy.max_attempts
            );
            warn!(
                room = %self.room,
                code,
                attempt = self.attempts,
                delay_secs = delay.as_secs(),
                "channel closed, reconnect scheduled"
            );
            self.set_state(ConnectionState::Closed { code, reason }, status);
        } else {
            warn!(room = %self.room, code, "retry budget exhausted");
            let status = format!(
                "connection failed after {} attempts",
                self.policy.max_attempts
            );
            self.set_state(ConnectionState::Failed, status);
        }
    }

    async fn handle_send(
        &mut self,
        channel: Option<&ChannelHandle>,
        text: String,
    ) -> Result<(), SendError> {
        if !self.state.is_open() {
            return Err(SendError::NotConnected);
        }
        let Some(channel) = channel else {
            return Err(SendError::NotConnected);
        };

        let frame = OutboundFrame {
            message: text.clone(),
            user: self.author.clone(),
        };
        if channel.outbound.send(frame).await.is_err() {
            // The channel task is gone; its close event is on the way.
            return Err(SendError::NotConnected);
        }

        if self.local_echo {
            self.log.append(ChatMessage {
                user: self.author.clone(),
                content: text,
                is_bot: false,
                timestamp: chrono::Utc::now(),
            });
            self.publish();
        }
        Ok(())
    }

    fn set_state(&mut self, state: ConnectionState, status: impl Into<String>) {
        self.state = state;
        self.status = status.into();
        self.publish();
    }

    fn publish(&self) {
        let _ = self.update_tx.send(ClientUpdate {
            state: self.state.clone(),
            status: self.status.clone(),
            messages: self.log.snapshot(),
        });
    }
}
