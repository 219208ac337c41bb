//! Client core for the Kudos notification inbox: a partitioned notification
//! store, a derived feed, backend-confirmed read/seen synchronization and a
//! lifecycle-scoped conversation preview poller.

pub mod api;
pub mod config;
pub mod feed;
pub mod models;
pub mod poller;
pub mod store;
pub mod sync;
pub mod timestamp;
pub mod view;

#[cfg(test)]
mod testing;

pub use api::{HttpNotificationApi, NotificationApi, NotificationPatch};
pub use config::InboxConfig;
pub use feed::{FeedPage, FeedQuery, SortBy, SortOrder, SortSpec};
pub use models::{
    ConversationPreview, Notification, NotificationTarget, NotificationType, NotificationUpdate,
    PartitionKind,
};
pub use poller::{PreviewFeed, PreviewPoller, PreviewPollerHandle, PreviewRow, PreviewSettings};
pub use store::{NotificationStore, StoreError, UpsertOutcome};
pub use sync::{BulkReport, ErrorPolicy, ReadStateSynchronizer, UserNotice};
pub use timestamp::Timestamp;
pub use view::InboxView;
