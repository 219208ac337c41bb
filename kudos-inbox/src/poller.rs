//! Background poller for conversation previews.
//!
//! Fetches once on start, then every `interval`. Each successful poll replaces
//! the published rows wholesale; a failed poll keeps the previous rows and sets
//! an error string. The task ends when its token (a child of the owning view's
//! lifecycle) is cancelled, and a request in flight at that moment is dropped
//! without publishing anything.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::api::NotificationApi;
use crate::models::ConversationPreview;
use crate::timestamp::{Timestamp, INVALID_DATE};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_DISPLAY_CAP: usize = 6;
/// Keeps a misconfigured interval from turning into a busy loop.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewSettings {
    pub interval: Duration,
    pub display_cap: usize,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            display_cap: DEFAULT_DISPLAY_CAP,
        }
    }
}

/// One conversation as displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewRow {
    pub user_id: String,
    pub name: String,
    pub last_message: String,
    pub time_label: String,
    pub unread_count: u32,
    pub is_last_message_read: bool,
    pub is_last_message_from_me: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewFeed {
    pub rows: Vec<PreviewRow>,
    pub error: Option<String>,
    /// Completed polls, successful or not.
    pub polls: u64,
}

/// `HH:MM` for today, `Mon D` otherwise.
pub fn time_label(at: Option<&Timestamp>, now: &Timestamp) -> String {
    match at {
        Some(at) if at.is_same_day(now) => at.time_of_day(),
        Some(at) => at.short_date(),
        None => INVALID_DATE.to_string(),
    }
}

/// One row per user (first occurrence wins), at most `cap` rows, backend order.
pub fn display_rows(previews: Vec<ConversationPreview>, cap: usize, now: &Timestamp) -> Vec<PreviewRow> {
    let mut seen = HashSet::new();
    previews
        .into_iter()
        .filter(|p| seen.insert(p.user_id.clone()))
        .take(cap)
        .map(|p| PreviewRow {
            time_label: time_label(p.last_message_date.as_ref(), now),
            user_id: p.user_id,
            name: p.name,
            last_message: p.last_message,
            unread_count: p.unread_count,
            is_last_message_read: p.is_last_message_read,
            is_last_message_from_me: p.is_last_message_from_me,
        })
        .collect()
}

pub type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

pub struct PreviewPoller;

impl PreviewPoller {
    pub fn spawn(
        api: Arc<dyn NotificationApi>,
        settings: PreviewSettings,
        parent: &CancellationToken,
    ) -> PreviewPollerHandle {
        Self::spawn_with_clock(api, settings, parent, Arc::new(Timestamp::now))
    }

    pub fn spawn_with_clock(
        api: Arc<dyn NotificationApi>,
        settings: PreviewSettings,
        parent: &CancellationToken,
        clock: Clock,
    ) -> PreviewPollerHandle {
        let cancel = parent.child_token();
        let (tx, rx) = watch::channel(PreviewFeed::default());
        let interval = settings.interval.max(MIN_POLL_INTERVAL);

        let task = tokio::spawn(run(
            api,
            interval,
            settings.display_cap,
            clock,
            tx,
            cancel.clone(),
        ));

        PreviewPollerHandle {
            cancel,
            task: Some(task),
            feed: rx,
        }
    }
}

async fn run(
    api: Arc<dyn NotificationApi>,
    interval: Duration,
    cap: usize,
    clock: Clock,
    feed: watch::Sender<PreviewFeed>,
    cancel: CancellationToken,
) {
    tracing::info!(interval_ms = interval.as_millis() as u64, cap, "conversation preview poller started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let envelope = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            envelope = api.fetch_conversation_previews() => envelope,
        };

        match envelope.into_result() {
            Ok(previews) => {
                counter!("inbox_preview_polls_total", "outcome" => "ok").increment(1);
                let rows = display_rows(previews, cap, &clock());
                feed.send_modify(|f| {
                    f.rows = rows;
                    f.error = None;
                    f.polls += 1;
                });
            }
            Err(e) => {
                counter!("inbox_preview_polls_total", "outcome" => "error").increment(1);
                tracing::warn!(error = %e, "conversation preview poll failed");
                feed.send_modify(|f| {
                    f.error = Some(format!("Failed to load conversations: {}", e.message()));
                    f.polls += 1;
                });
            }
        }
    }

    tracing::info!("conversation preview poller stopped");
}

/// Owns the poller task. Dropping the handle stops the poller.
pub struct PreviewPollerHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    feed: watch::Receiver<PreviewFeed>,
}

impl PreviewPollerHandle {
    pub fn subscribe(&self) -> watch::Receiver<PreviewFeed> {
        self.feed.clone()
    }

    pub fn current(&self) -> PreviewFeed {
        self.feed.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cancel and wait for the task to wind down.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "preview poller task ended abnormally");
            }
        }
    }
}

impl Drop for PreviewPollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
