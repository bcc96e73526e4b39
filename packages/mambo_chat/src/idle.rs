//! Idle-assistance monitor: activity reporting and periodic "need help?"
//! polling against the chatbot assistance endpoints.
//!
//! The backend owns the actual idle clock; this monitor reports user
//! activity to it and polls the assistance endpoint, surfacing show/hide
//! transitions edge-triggered. It is an owned instance with explicit
//! teardown, one per running client.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Assistance prompt surfaced to the user.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssistNotification {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub assistance_options: Vec<String>,
}

/// Body of `GET {base}/idle-assistance/`.
#[derive(Debug, Deserialize)]
struct IdleStatusBody {
    #[serde(default)]
    show_assistance: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    subtitle: String,
    #[serde(default)]
    assistance_options: Vec<String>,
}

pub struct IdleMonitor {
    http: reqwest::Client,
    base_url: String,
    notifications: Arc<watch::Sender<Option<AssistNotification>>>,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl IdleMonitor {
    /// Spawn the poll task. `base_url` is the backend's HTTP root.
    pub fn start(http: reqwest::Client, base_url: impl Into<String>, interval: Duration) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        let (tx, _rx) = watch::channel(None);
        let notifications = Arc::new(tx);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(poll_loop(
            http.clone(),
            base_url.clone(),
            interval,
            notifications.clone(),
            cancel.clone(),
        ));

        Self {
            http,
            base_url,
            notifications,
            cancel,
            task,
        }
    }

    /// Latest assistance prompt; `None` when there is nothing to show.
    pub fn notifications(&self) -> watch::Receiver<Option<AssistNotification>> {
        self.notifications.subscribe()
    }

    /// Report user activity to the backend. Fire-and-forget; failures are
    /// logged and ignored.
    pub fn track_activity(&self) {
        let http = self.http.clone();
        let url = format!("{}/track-activity/", self.base_url);
        tokio::spawn(async move {
            if let Err(err) = http.post(&url).send().await {
                debug!(error = %err, "activity report failed");
            }
        });
    }

    /// Dismiss the current assistance prompt, locally and on the backend.
    pub async fn dismiss(&self) {
        let _ = self.notifications.send(None);
        let url = format!("{}/dismiss-assistance/", self.base_url);
        if let Err(err) = self.http.post(&url).send().await {
            debug!(error = %err, "dismiss failed");
        }
    }

    /// Tear the monitor down; no further polls once this resolves.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

async fn poll_loop(
    http: reqwest::Client,
    base_url: String,
    interval: Duration,
    notifications: Arc<watch::Sender<Option<AssistNotification>>>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(10)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it so a fresh session is not
    // greeted with an assistance check before it has done anything.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match check_idle(&http, &base_url).await {
                    Ok(body) => {
                        let showing = notifications.borrow().is_some();
                        if body.show_assistance && !showing {
                            let _ = notifications.send(Some(AssistNotification {
                                message: body.message,
                                subtitle: body.subtitle,
                                assistance_options: body.assistance_options,
                            }));
                        } else if !body.show_assistance && showing {
                            let _ = notifications.send(None);
                        }
                    }
                    Err(err) => debug!(error = %err, "idle check failed"),
                }
            }
        }
    }
}

async fn check_idle(http: &reqwest::Client, base_url: &str) -> Result<IdleStatusBody, reqwest::Error> {
    http.get(format!("{base_url}/idle-assistance/"))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FAST_POLL: Duration = Duration::from_millis(20);

    async fn wait_for_note(
        rx: &mut watch::Receiver<Option<AssistNotification>>,
        want_some: bool,
    ) -> Option<AssistNotification> {
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|n| n.is_some() == want_some))
            .await
            .expect("timed out waiting for notification change")
            .expect("monitor gone")
            .clone()
    }

    #[tokio::test]
    async fn assistance_notifications_are_edge_triggered() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/idle-assistance/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "show_assistance": true,
                "message": "Need help?",
                "subtitle": "You have been quiet for a while",
                "assistance_options": ["Check today's orders", "Talk to support"],
            })))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/idle-assistance/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "show_assistance": false })),
            )
            .mount(&server)
            .await;

        let monitor = IdleMonitor::start(reqwest::Client::new(), server.uri(), FAST_POLL);
        let mut notes = monitor.notifications();

        let note = wait_for_note(&mut notes, true).await.expect("note");
        assert_eq!(note.message, "Need help?");
        assert_eq!(note.assistance_options.len(), 2);

        // Once the backend stops asking, the prompt clears.
        assert!(wait_for_note(&mut notes, false).await.is_none());

        monitor.stop().await;
    }

    #[tokio::test]
    async fn track_activity_posts_to_the_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/track-activity/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/idle-assistance/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "show_assistance": false })),
            )
            .mount(&server)
            .await;

        let monitor = IdleMonitor::start(reqwest::Client::new(), server.uri(), FAST_POLL);
        monitor.track_activity();

        // Give the fire-and-forget task time to land before verification.
        tokio::time::sleep(Duration::from_millis(200)).await;
        monitor.stop().await;
    }

    #[tokio::test]
    async fn dismiss_clears_the_prompt_and_notifies_the_backend() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/idle-assistance/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "show_assistance": true,
                "message": "Need help?",
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        // After the dismissal the backend's idle clock is reset.
        Mock::given(method("GET"))
            .and(path("/idle-assistance/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "show_assistance": false })),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/dismiss-assistance/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let monitor = IdleMonitor::start(reqwest::Client::new(), server.uri(), FAST_POLL);
        let mut notes = monitor.notifications();
        wait_for_note(&mut notes, true).await;

        monitor.dismiss().await;
        assert!(notes.borrow().is_none());

        monitor.stop().await;
    }

    #[tokio::test]
    async fn endpoint_failures_do_not_kill_the_monitor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/idle-assistance/"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/idle-assistance/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "show_assistance": true,
                "message": "Need help?",
            })))
            .mount(&server)
            .await;

        let monitor = IdleMonitor::start(reqwest::Client::new(), server.uri(), FAST_POLL);
        let mut notes = monitor.notifications();

        // Survives the 500s and picks up the later prompt.
        assert!(wait_for_note(&mut notes, true).await.is_some());

        monitor.stop().await;
    }
}
