//! Scripted in-memory backend for unit tests.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use kudos_shared::types::api::ApiEnvelope;

use crate::api::{NotificationApi, NotificationPatch};
use crate::models::{ConversationPreview, Notification};
use crate::timestamp::Timestamp;

pub(crate) struct FakeApi {
    notifications: Mutex<ApiEnvelope<Vec<Notification>>>,
    fetch_calls: AtomicUsize,
    failing_patches: Mutex<HashSet<String>>,
    patches: Mutex<Vec<NotificationPatch>>,
    patch_delay: Mutex<Duration>,
    fail_mark_messages: AtomicBool,
    mark_messages_calls: AtomicUsize,
    previews: Mutex<VecDeque<ApiEnvelope<Vec<ConversationPreview>>>>,
    preview_delay: Mutex<Duration>,
    preview_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self {
            notifications: Mutex::new(ApiEnvelope::ok(200, Vec::new())),
            fetch_calls: AtomicUsize::new(0),
            failing_patches: Mutex::new(HashSet::new()),
            patches: Mutex::new(Vec::new()),
            patch_delay: Mutex::new(Duration::ZERO),
            fail_mark_messages: AtomicBool::new(false),
            mark_messages_calls: AtomicUsize::new(0),
            previews: Mutex::new(VecDeque::new()),
            preview_delay: Mutex::new(Duration::ZERO),
            preview_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

impl FakeApi {
    pub fn set_notifications(&self, envelope: ApiEnvelope<Vec<Notification>>) {
        *self.notifications.lock().unwrap() = envelope;
    }

    pub fn fail_patch_for(&self, id: &str) {
        self.failing_patches.lock().unwrap().insert(id.to_string());
    }

    pub fn set_patch_delay(&self, delay: Duration) {
        *self.patch_delay.lock().unwrap() = delay;
    }

    pub fn fail_mark_messages(&self) {
        self.fail_mark_messages.store(true, Ordering::SeqCst);
    }

    /// Queue a response for the next preview poll. Once the queue is empty the
    /// last scripted response repeats.
    pub fn push_previews(&self, envelope: ApiEnvelope<Vec<ConversationPreview>>) {
        self.previews.lock().unwrap().push_back(envelope);
    }

    pub fn set_preview_delay(&self, delay: Duration) {
        *self.preview_delay.lock().unwrap() = delay;
    }

    pub fn patches(&self) -> Vec<NotificationPatch> {
        self.patches.lock().unwrap().clone()
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn mark_messages_calls(&self) -> usize {
        self.mark_messages_calls.load(Ordering::SeqCst)
    }

    pub fn preview_calls(&self) -> usize {
        self.preview_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

pub(crate) fn preview(user_id: &str, name: &str, at: Option<Timestamp>) -> ConversationPreview {
    ConversationPreview {
        user_id: user_id.to_string(),
        name: name.to_string(),
        last_message: format!("hello from {name}"),
        last_message_date: at,
        unread_count: 0,
        is_last_message_read: true,
        is_last_message_from_me: false,
    }
}

#[async_trait]
impl NotificationApi for FakeApi {
    async fn fetch_notifications(&self) -> ApiEnvelope<Vec<Notification>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.notifications.lock().unwrap().clone()
    }

    async fn update_notification(&self, patch: &NotificationPatch) -> ApiEnvelope<Value> {
        self.enter();
        self.patches.lock().unwrap().push(patch.clone());
        let delay = *self.patch_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.leave();

        if self.failing_patches.lock().unwrap().contains(&patch.notification_id) {
            ApiEnvelope::failure(500, "update rejected")
        } else {
            ApiEnvelope::ok(200, Value::Null)
        }
    }

    async fn mark_messages_read(&self) -> ApiEnvelope<Value> {
        self.mark_messages_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_mark_messages.load(Ordering::SeqCst) {
            ApiEnvelope::failure(500, "bulk update rejected")
        } else {
            ApiEnvelope::ok(200, Value::Null)
        }
    }

    async fn fetch_conversation_previews(&self) -> ApiEnvelope<Vec<ConversationPreview>> {
        self.preview_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.preview_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.previews.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap_or_else(|| ApiEnvelope::ok(200, Vec::new()))
        } else {
            script
                .front()
                .cloned()
                .unwrap_or_else(|| ApiEnvelope::ok(200, Vec::new()))
        }
    }
}
