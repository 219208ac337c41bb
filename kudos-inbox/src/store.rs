//! The notification store: two disjoint partitions and the only writer to them.
//!
//! Partitions are copy-on-write (`Arc<Vec<Arc<Notification>>>`). A mutation
//! swaps in a new vector in which untouched entries keep their `Arc`, and a
//! no-op leaves the partition handle itself untouched, so consumers can diff by
//! pointer or by [`NotificationStore::revision`].

use std::sync::Arc;

use crate::models::{Notification, NotificationUpdate, PartitionKind};

pub type Partition = Arc<Vec<Arc<Notification>>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("notification {id} belongs to the {actual} partition, not {expected}")]
    PartitionMismatch {
        id: String,
        expected: PartitionKind,
        actual: PartitionKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Merged,
    Unchanged,
}

#[derive(Debug, Default, Clone)]
pub struct NotificationStore {
    messages: Partition,
    others: Partition,
    revision: u64,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Selectors =====

    pub fn partition(&self, kind: PartitionKind) -> &Partition {
        match kind {
            PartitionKind::Message => &self.messages,
            PartitionKind::Other => &self.others,
        }
    }

    pub fn get(&self, kind: PartitionKind, id: &str) -> Option<&Arc<Notification>> {
        self.partition(kind).iter().find(|n| n.id == id)
    }

    pub fn len(&self, kind: PartitionKind) -> usize {
        self.partition(kind).len()
    }

    pub fn total_len(&self) -> usize {
        self.messages.len() + self.others.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }

    /// Advances on every effective change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn unread_count(&self, kind: PartitionKind) -> usize {
        self.partition(kind)
            .iter()
            .filter(|n| !n.notification_is_read)
            .count()
    }

    pub fn unseen(&self, kind: PartitionKind) -> Vec<Arc<Notification>> {
        self.partition(kind)
            .iter()
            .filter(|n| !n.notification_is_seen)
            .cloned()
            .collect()
    }

    /// Unseen entries of both partitions, message partition first.
    pub fn unseen_all(&self) -> Vec<Arc<Notification>> {
        PartitionKind::ALL
            .iter()
            .flat_map(|kind| self.unseen(*kind))
            .collect()
    }

    /// Sum of the unread-message counters of message notifications not yet read.
    pub fn unread_message_badge(&self) -> u32 {
        self.messages
            .iter()
            .filter(|n| !n.notification_is_read)
            .map(|n| n.message_count)
            .sum()
    }

    // ===== Mutations =====

    fn slot_mut(&mut self, kind: PartitionKind) -> &mut Partition {
        match kind {
            PartitionKind::Message => &mut self.messages,
            PartitionKind::Other => &mut self.others,
        }
    }

    fn bump(&mut self) {
        self.revision += 1;
    }

    /// Swap the whole partition. Entries whose type files them elsewhere are
    /// not stored.
    pub fn replace_partition(&mut self, kind: PartitionKind, list: Vec<Notification>) {
        let entries: Vec<Arc<Notification>> = list
            .into_iter()
            .filter(|n| {
                let fits = n.partition() == kind;
                if !fits {
                    tracing::warn!(
                        notification_id = %n.id,
                        notification_type = n.kind.code(),
                        partition = %kind,
                        "dropping notification filed under the wrong partition"
                    );
                }
                fits
            })
            .map(Arc::new)
            .collect();

        tracing::debug!(partition = %kind, count = entries.len(), "partition replaced");
        *self.slot_mut(kind) = Arc::new(entries);
        self.bump();
    }

    /// Split a full fetch by type and replace both partitions.
    pub fn ingest(&mut self, list: Vec<Notification>) {
        let (messages, others): (Vec<_>, Vec<_>) =
            list.into_iter().partition(Notification::is_message);
        self.replace_partition(PartitionKind::Message, messages);
        self.replace_partition(PartitionKind::Other, others);
    }

    /// Merge into the entry with the same id, or prepend a new one.
    pub fn upsert(
        &mut self,
        kind: PartitionKind,
        update: NotificationUpdate,
    ) -> Result<UpsertOutcome, StoreError> {
        if let Some(declared) = &update.kind {
            if declared.partition() != kind {
                return Err(StoreError::PartitionMismatch {
                    id: update.id,
                    expected: kind,
                    actual: declared.partition(),
                });
            }
        }

        let position = self.partition(kind).iter().position(|n| n.id == update.id);
        match position {
            Some(index) => {
                let mut merged = (*self.partition(kind)[index]).clone();
                if !update.merge_into(&mut merged) {
                    return Ok(UpsertOutcome::Unchanged);
                }
                Arc::make_mut(self.slot_mut(kind))[index] = Arc::new(merged);
                self.bump();
                Ok(UpsertOutcome::Merged)
            }
            None => {
                let fresh = update.into_notification(kind);
                tracing::debug!(notification_id = %fresh.id, partition = %kind, "notification inserted");
                Arc::make_mut(self.slot_mut(kind)).insert(0, Arc::new(fresh));
                self.bump();
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    /// Apply `change` to one entry. `change` reports whether it modified anything.
    fn update_entry<F>(&mut self, kind: PartitionKind, id: &str, change: F) -> bool
    where
        F: FnOnce(&mut Notification) -> bool,
    {
        let Some(index) = self.partition(kind).iter().position(|n| n.id == id) else {
            return false;
        };

        let mut entry = (*self.partition(kind)[index]).clone();
        if !change(&mut entry) {
            return false;
        }
        Arc::make_mut(self.slot_mut(kind))[index] = Arc::new(entry);
        self.bump();
        true
    }

    pub fn mark_read(&mut self, kind: PartitionKind, id: &str) -> bool {
        self.update_entry(kind, id, |n| {
            !std::mem::replace(&mut n.notification_is_read, true)
        })
    }

    pub fn mark_seen(&mut self, kind: PartitionKind, id: &str) -> bool {
        self.update_entry(kind, id, |n| {
            !std::mem::replace(&mut n.notification_is_seen, true)
        })
    }

    pub fn reset_message_count(&mut self, id: &str) -> bool {
        self.update_entry(PartitionKind::Message, id, |n| {
            std::mem::take(&mut n.message_count) != 0
        })
    }

    /// Returns how many entries flipped to read.
    pub fn mark_all_read(&mut self, kind: PartitionKind) -> usize {
        let unread = self.unread_count(kind);
        if unread == 0 {
            return 0;
        }

        let entries: Vec<Arc<Notification>> = self
            .partition(kind)
            .iter()
            .map(|n| {
                if n.notification_is_read {
                    Arc::clone(n)
                } else {
                    let mut read = (**n).clone();
                    read.notification_is_read = true;
                    Arc::new(read)
                }
            })
            .collect();

        *self.slot_mut(kind) = Arc::new(entries);
        self.bump();
        tracing::debug!(partition = %kind, count = unread, "partition marked read");
        unread
    }

    pub fn clear(&mut self, kind: PartitionKind) {
        if self.partition(kind).is_empty() {
            return;
        }
        *self.slot_mut(kind) = Partition::default();
        self.bump();
    }
}
