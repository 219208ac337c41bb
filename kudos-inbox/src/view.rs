//! One inbox view session: owns the store, routes user actions through the
//! synchronizer and keeps the preview poller alive while active.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use kudos_shared::types::pagination::PageSpec;
use kudos_shared::ClientError;

use crate::api::NotificationApi;
use crate::config::InboxConfig;
use crate::feed::{self, FeedPage, FeedQuery};
use crate::models::{NotificationTarget, NotificationUpdate, PartitionKind};
use crate::poller::{PreviewFeed, PreviewPoller, PreviewPollerHandle, PreviewSettings};
use crate::store::{NotificationStore, StoreError, UpsertOutcome};
use crate::sync::{BulkReport, ReadStateSynchronizer, UserNotice};

pub struct InboxView {
    api: Arc<dyn NotificationApi>,
    store: NotificationStore,
    synchronizer: ReadStateSynchronizer,
    preview_settings: PreviewSettings,
    page_size: usize,
    lifecycle: CancellationToken,
    poller: Option<PreviewPollerHandle>,
    notices: mpsc::UnboundedReceiver<UserNotice>,
}

impl InboxView {
    pub fn new(api: Arc<dyn NotificationApi>, config: &InboxConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let synchronizer = ReadStateSynchronizer::new(api.clone())
            .with_policy(config.bulk_error_policy)
            .with_notices(tx);

        Self {
            api,
            store: NotificationStore::new(),
            synchronizer,
            preview_settings: config.preview_settings(),
            page_size: config.page_size,
            lifecycle: CancellationToken::new(),
            poller: None,
            notices: rx,
        }
    }

    pub fn is_active(&self) -> bool {
        self.poller.is_some()
    }

    /// Populate the store, then start polling previews. No-op when already active.
    pub async fn activate(&mut self) {
        if self.is_active() {
            return;
        }

        // a cancelled token cannot be reused
        self.lifecycle = CancellationToken::new();
        self.synchronizer.set_lifecycle(self.lifecycle.clone());

        self.populate().await;
        self.poller = Some(PreviewPoller::spawn(
            self.api.clone(),
            self.preview_settings,
            &self.lifecycle,
        ));
        tracing::info!(notifications = self.store.total_len(), "inbox view activated");
    }

    /// Full refetch. A failed fetch leaves both partitions empty. Does nothing
    /// once the view has been deactivated.
    pub async fn populate(&mut self) {
        if self.lifecycle.is_cancelled() {
            tracing::debug!("view closed, fetch not sent");
            return;
        }

        let result = self.api.fetch_notifications().await.into_result();
        if self.lifecycle.is_cancelled() {
            return;
        }

        match result {
            Ok(list) => {
                tracing::debug!(count = list.len(), "notifications fetched");
                self.store.ingest(list);
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch notifications");
                for kind in PartitionKind::ALL {
                    self.store.clear(kind);
                }
            }
        }
    }

    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    /// Apply an update pushed from outside the fetch cycle.
    pub fn apply_update(
        &mut self,
        kind: PartitionKind,
        update: NotificationUpdate,
    ) -> Result<UpsertOutcome, StoreError> {
        self.store.upsert(kind, update)
    }

    pub fn feed(&self, query: &FeedQuery) -> FeedPage {
        feed::project(&self.store, query)
    }

    pub fn first_page(&self) -> FeedPage {
        self.feed(&FeedQuery::default().page(PageSpec::new(0, self.page_size)))
    }

    /// Opening an unread item marks it read first. The target is returned even
    /// if the backend rejects the update; the failure goes out as a notice.
    pub async fn open(&mut self, kind: PartitionKind, id: &str) -> Option<NotificationTarget> {
        let entry = self.store.get(kind, id)?.clone();

        if !entry.notification_is_read {
            if let Err(e) = self.synchronizer.mark_read(&mut self.store, kind, id).await {
                tracing::debug!(notification_id = %id, error = %e, "opening without read confirmation");
            }
        }

        Some(entry.target())
    }

    pub async fn mark_all_seen(&mut self) -> BulkReport {
        self.synchronizer.mark_all_seen(&mut self.store).await
    }

    pub async fn mark_messages_read(&mut self) -> Result<usize, ClientError> {
        self.synchronizer.mark_messages_read(&mut self.store).await
    }

    pub fn previews(&self) -> Option<watch::Receiver<PreviewFeed>> {
        self.poller.as_ref().map(PreviewPollerHandle::subscribe)
    }

    pub fn drain_notices(&mut self) -> Vec<UserNotice> {
        let mut notices = Vec::new();
        while let Ok(notice) = self.notices.try_recv() {
            notices.push(notice);
        }
        notices
    }

    pub async fn deactivate(&mut self) {
        self.lifecycle.cancel();
        if let Some(poller) = self.poller.take() {
            poller.stop().await;
            tracing::info!("inbox view deactivated");
        }
    }
}

impl Drop for InboxView {
    fn drop(&mut self) {
        self.lifecycle.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Notification, NotificationType, Party};
    use crate::testing::{preview, FakeApi};
    use kudos_shared::types::api::ApiEnvelope;
    use std::time::Duration;

    fn view(api: &Arc<FakeApi>) -> InboxView {
        InboxView::new(api.clone(), &InboxConfig::default())
    }

    fn sample() -> Vec<Notification> {
        let mut message = Notification::new("m1", NotificationType::Message, "Are you free?");
        message.sender = Some(Party { id: "42".into(), name: "Ana".into() });
        vec![
            message,
            Notification::new("a1", NotificationType::Appraisal, "Appraisal submitted"),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn empty_fetch_yields_empty_feed() {
        let api = Arc::new(FakeApi::default());
        let mut view = view(&api);
        view.activate().await;

        assert!(view.store().is_empty());
        let page = view.first_page();
        assert!(page.is_empty());
        assert_eq!(page.total, 0);
        assert!(view.drain_notices().is_empty());
        view.deactivate().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refetch_empties_both_partitions() {
        let api = Arc::new(FakeApi::default());
        api.set_notifications(ApiEnvelope::ok(200, sample()));
        let mut view = view(&api);
        view.activate().await;
        assert_eq!(view.store().total_len(), 2);

        api.set_notifications(ApiEnvelope::transport_failure("connection refused"));
        view.populate().await;
        assert!(view.store().is_empty());
        assert!(view.first_page().is_empty());
        view.deactivate().await;
    }

    #[tokio::test(start_paused = true)]
    async fn opening_marks_read_and_resolves_target() {
        let api = Arc::new(FakeApi::default());
        api.set_notifications(ApiEnvelope::ok(200, sample()));
        let mut view = view(&api);
        view.activate().await;

        let target = view.open(PartitionKind::Message, "m1").await;
        assert_eq!(
            target,
            Some(NotificationTarget::Conversation { user_id: Some("42".into()) })
        );
        assert!(view.store().get(PartitionKind::Message, "m1").unwrap().notification_is_read);

        // already read: no second request
        view.open(PartitionKind::Message, "m1").await;
        assert_eq!(api.patches().len(), 1);

        assert_eq!(view.open(PartitionKind::Other, "missing").await, None);
        view.deactivate().await;
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_open_still_navigates_and_notifies() {
        let api = Arc::new(FakeApi::default());
        api.set_notifications(ApiEnvelope::ok(200, sample()));
        api.fail_patch_for("a1");
        let mut view = view(&api);
        view.activate().await;

        let target = view.open(PartitionKind::Other, "a1").await;
        assert_eq!(target, Some(NotificationTarget::Appraisals));
        assert!(!view.store().get(PartitionKind::Other, "a1").unwrap().notification_is_read);
        assert_eq!(view.drain_notices().len(), 1);
        view.deactivate().await;
    }

    #[tokio::test(start_paused = true)]
    async fn no_fetch_after_deactivate() {
        let api = Arc::new(FakeApi::default());
        api.set_notifications(ApiEnvelope::ok(200, sample()));
        let mut view = view(&api);
        view.activate().await;
        view.deactivate().await;
        assert_eq!(api.fetch_calls(), 1);

        api.set_notifications(ApiEnvelope::ok(200, Vec::new()));
        view.populate().await;
        assert_eq!(api.fetch_calls(), 1);
        assert_eq!(view.store().total_len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn previews_live_only_while_active() {
        let api = Arc::new(FakeApi::default());
        api.push_previews(ApiEnvelope::ok(200, vec![preview("7", "Bo", None)]));
        let mut view = view(&api);
        assert!(view.previews().is_none());

        view.activate().await;
        let mut previews = view.previews().unwrap();
        previews.changed().await.unwrap();
        assert_eq!(previews.borrow().rows[0].name, "Bo");

        view.deactivate().await;
        assert!(!view.is_active());
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(api.preview_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_view_stops_the_poller() {
        let api = Arc::new(FakeApi::default());
        let mut view = view(&api);
        view.activate().await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(view);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(api.preview_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pushed_update_merges_into_store() {
        let api = Arc::new(FakeApi::default());
        api.set_notifications(ApiEnvelope::ok(200, sample()));
        let mut view = view(&api);
        view.activate().await;

        let mut update = NotificationUpdate::new("m1");
        update.message_count = Some(3);
        let outcome = view.apply_update(PartitionKind::Message, update).unwrap();
        assert_eq!(outcome, UpsertOutcome::Merged);
        let entry = view.store().get(PartitionKind::Message, "m1").unwrap();
        assert_eq!(entry.message_count, 3);
        assert_eq!(entry.content, "Are you free?");
        view.deactivate().await;
    }

    #[tokio::test(start_paused = true)]
    async fn mark_all_seen_routes_through_synchronizer() {
        let api = Arc::new(FakeApi::default());
        api.set_notifications(ApiEnvelope::ok(200, sample()));
        let mut view = view(&api);
        view.activate().await;

        let report = view.mark_all_seen().await;
        assert_eq!(report.confirmed, vec!["m1", "a1"]);
        assert!(view.store().unseen_all().is_empty());

        assert_eq!(view.mark_messages_read().await.unwrap(), 1);
        view.deactivate().await;
    }
}
