//! Read/seen synchronization with the backend.
//!
//! The backend is the authority: the store only changes after a request has
//! been confirmed. Per item the state moves `Unseen -> Pending -> Seen` on
//! confirmation or back to `Unseen` on failure; nothing here ever moves an
//! item out of `Seen` or `Read`.

pub mod runner;

use std::sync::Arc;

use metrics::counter;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use kudos_shared::ClientError;

use crate::api::{NotificationApi, NotificationPatch};
use crate::models::{Notification, PartitionKind};
use crate::store::NotificationStore;

pub use runner::{ErrorPolicy, RunReport, SequentialRunner};

/// A non-blocking message for the user, e.g. shown as a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserNotice {
    pub message: String,
    pub notification_id: Option<String>,
}

#[derive(Debug, Default)]
pub struct BulkReport {
    pub confirmed: Vec<String>,
    pub failed: Vec<(String, ClientError)>,
    /// Never attempted: the run aborted or the view closed first.
    pub skipped: Vec<String>,
    /// Confirmed by the backend after the owning view went away; not applied.
    pub discarded: Vec<String>,
}

impl BulkReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
enum Flag {
    Read,
    Seen,
}

impl Flag {
    fn op(self) -> &'static str {
        match self {
            Self::Read => "mark_read",
            Self::Seen => "mark_seen",
        }
    }

    fn patch(self, id: &str) -> NotificationPatch {
        match self {
            Self::Read => NotificationPatch::read(id),
            Self::Seen => NotificationPatch::seen(id),
        }
    }

    fn apply(self, store: &mut NotificationStore, kind: PartitionKind, id: &str) -> bool {
        match self {
            Self::Read => store.mark_read(kind, id),
            Self::Seen => store.mark_seen(kind, id),
        }
    }

    fn failure_notice(self) -> &'static str {
        match self {
            Self::Read => "Could not mark the notification as read. Please try again.",
            Self::Seen => "Could not mark the notification as seen. Please try again.",
        }
    }
}

fn record(op: &'static str, outcome: &'static str) {
    counter!("inbox_sync_requests_total", "op" => op, "outcome" => outcome).increment(1);
}

pub struct ReadStateSynchronizer {
    api: Arc<dyn NotificationApi>,
    policy: ErrorPolicy,
    notices: Option<mpsc::UnboundedSender<UserNotice>>,
    lifecycle: CancellationToken,
}

impl ReadStateSynchronizer {
    pub fn new(api: Arc<dyn NotificationApi>) -> Self {
        Self {
            api,
            policy: ErrorPolicy::default(),
            notices: None,
            lifecycle: CancellationToken::new(),
        }
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_notices(mut self, notices: mpsc::UnboundedSender<UserNotice>) -> Self {
        self.notices = Some(notices);
        self
    }

    /// Once `lifecycle` is cancelled no request is sent and late confirmations are dropped.
    pub fn set_lifecycle(&mut self, lifecycle: CancellationToken) {
        self.lifecycle = lifecycle;
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    fn notify(&self, message: &str, notification_id: Option<&str>) {
        let Some(notices) = &self.notices else {
            return;
        };
        let notice = UserNotice {
            message: message.to_string(),
            notification_id: notification_id.map(str::to_string),
        };
        if notices.send(notice).is_err() {
            tracing::debug!("notice receiver dropped");
        }
    }

    pub async fn mark_read(
        &self,
        store: &mut NotificationStore,
        kind: PartitionKind,
        id: &str,
    ) -> Result<bool, ClientError> {
        self.confirm_single(store, kind, id, Flag::Read).await
    }

    pub async fn mark_seen(
        &self,
        store: &mut NotificationStore,
        kind: PartitionKind,
        id: &str,
    ) -> Result<bool, ClientError> {
        self.confirm_single(store, kind, id, Flag::Seen).await
    }

    /// Returns whether the store changed.
    async fn confirm_single(
        &self,
        store: &mut NotificationStore,
        kind: PartitionKind,
        id: &str,
        flag: Flag,
    ) -> Result<bool, ClientError> {
        if self.lifecycle.is_cancelled() {
            tracing::debug!(notification_id = %id, op = flag.op(), "view closed, update not sent");
            return Ok(false);
        }

        let result = self
            .api
            .update_notification(&flag.patch(id))
            .await
            .into_unit_result();

        if let Err(e) = result {
            record(flag.op(), "error");
            tracing::warn!(notification_id = %id, op = flag.op(), error = %e, "notification update rejected");
            self.notify(flag.failure_notice(), Some(id));
            return Err(e);
        }

        record(flag.op(), "ok");
        if self.lifecycle.is_cancelled() {
            tracing::debug!(notification_id = %id, op = flag.op(), "view closed, confirmation ignored");
            return Ok(false);
        }
        Ok(flag.apply(store, kind, id))
    }

    /// Mark every unseen notification as seen, one confirmed request at a time.
    pub async fn mark_all_seen(&self, store: &mut NotificationStore) -> BulkReport {
        let unseen = store.unseen_all();
        if unseen.is_empty() {
            return BulkReport::default();
        }

        tracing::info!(count = unseen.len(), policy = ?self.policy, "marking all notifications as seen");

        let api = &self.api;
        let lifecycle = &self.lifecycle;
        let mut discarded = Vec::new();

        let run = SequentialRunner::new(self.policy)
            .until(self.lifecycle.clone())
            .run(
                unseen,
                |item: &Arc<Notification>| {
                    let api = Arc::clone(api);
                    let patch = NotificationPatch::seen(&item.id);
                    async move { api.update_notification(&patch).await.into_unit_result() }
                },
                |item, result| match result {
                    Ok(()) => {
                        record("mark_seen", "ok");
                        if lifecycle.is_cancelled() {
                            discarded.push(item.id.clone());
                            return;
                        }
                        store.mark_seen(item.partition(), &item.id);
                        if item.is_message() {
                            store.reset_message_count(&item.id);
                        }
                    }
                    Err(e) => {
                        record("mark_seen", "error");
                        tracing::warn!(notification_id = %item.id, error = %e, "mark-as-seen rejected");
                        self.notify(Flag::Seen.failure_notice(), Some(&item.id));
                    }
                },
            )
            .await;

        let report = BulkReport {
            confirmed: run
                .succeeded
                .iter()
                .map(|n| n.id.clone())
                .filter(|id| !discarded.contains(id))
                .collect(),
            failed: run
                .failed
                .into_iter()
                .map(|(n, e)| (n.id.clone(), e))
                .collect(),
            skipped: run.skipped.iter().map(|n| n.id.clone()).collect(),
            discarded,
        };

        tracing::info!(
            confirmed = report.confirmed.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "mark-all-as-seen finished"
        );
        report
    }

    /// One call marks every message notification read server-side.
    pub async fn mark_messages_read(&self, store: &mut NotificationStore) -> Result<usize, ClientError> {
        if self.lifecycle.is_cancelled() {
            return Ok(0);
        }

        let result = self.api.mark_messages_read().await.into_unit_result();
        if let Err(e) = result {
            record("mark_messages_read", "error");
            tracing::warn!(error = %e, "mark-messages-read rejected");
            self.notify("Could not mark messages as read. Please try again.", None);
            return Err(e);
        }

        record("mark_messages_read", "ok");
        if self.lifecycle.is_cancelled() {
            return Ok(0);
        }
        Ok(store.mark_all_read(PartitionKind::Message))
    }
}
