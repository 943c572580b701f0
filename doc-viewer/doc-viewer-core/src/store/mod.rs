//! In-memory document store with upsert-by-path semantics.
//!
//! The store is the only writer of document state. It is not internally
//! synchronized; callers that share it across tasks wrap it in a lock and hold
//! the write guard for the duration of each mutation.

mod error;
#[cfg(test)]
mod tests;

pub use error::{Result, StoreError};

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};

use crate::document::{generate_id, validate_title, Document, DocumentStatus, NewDocument};
use crate::events::{Event, EventBroadcaster, SubscriberId, Subscription};

struct Entry {
    /// Insertion order, used as the tie-break when listing.
    seq: u64,
    doc: Document,
}

/// Hands out strictly increasing timestamps so `updated_at` ordering never ties.
#[derive(Default)]
struct Clock {
    last: Option<DateTime<Utc>>,
}

impl Clock {
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last {
            Some(last) if now <= last => last + Duration::nanoseconds(1),
            _ => now,
        };
        self.last = Some(stamp);
        stamp
    }
}

#[derive(Default)]
pub struct DocumentStore {
    docs: HashMap<String, Entry>,
    issued: HashSet<String>,
    next_seq: u64,
    clock: Clock,
    events: EventBroadcaster,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store that publishes into an existing broadcaster.
    pub fn with_events(events: EventBroadcaster) -> Self {
        Self {
            events,
            ..Self::default()
        }
    }

    pub fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    fn allocate_id(&mut self) -> String {
        loop {
            let id = generate_id();
            if self.issued.insert(id.clone()) {
                return id;
            }
        }
    }

    /// Insert a brand new active document and announce it to subscribers.
    pub fn create(&mut self, input: NewDocument) -> Result<Document> {
        input.validate()?;
        let id = self.allocate_id();
        let now = self.clock.tick();
        let doc = Document::new(id.clone(), input, now);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.docs.insert(
            id.clone(),
            Entry {
                seq,
                doc: doc.clone(),
            },
        );
        tracing::debug!(id = %id, "document created");
        self.events.publish(Event::NewDocument {
            id,
            title: doc.title.clone(),
        });
        Ok(doc)
    }

    /// Overwrite the active document at `metadata.path` if there is one,
    /// otherwise create a new document.
    pub fn upsert_by_path(&mut self, input: NewDocument) -> Result<Document> {
        input.validate()?;
        let existing = input
            .metadata
            .upsert_key()
            .and_then(|key| self.find_active_by_path(key))
            .map(|doc| doc.id.clone());
        match existing {
            Some(id) => {
                tracing::debug!(id = %id, "upsert matched existing document");
                self.update(&id, input.title, input.content)
            }
            None => self.create(input),
        }
    }

    /// Earliest-inserted active document whose path equals `path`.
    pub fn find_active_by_path(&self, path: &str) -> Option<&Document> {
        self.docs
            .values()
            .filter(|e| e.doc.is_active() && e.doc.metadata.upsert_key() == Some(path))
            .min_by_key(|e| e.seq)
            .map(|e| &e.doc)
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.docs.get(id).map(|e| &e.doc)
    }

    /// Documents ordered by `updated_at` descending, optionally restricted to
    /// one status.
    pub fn list(&self, status: Option<DocumentStatus>) -> Vec<Document> {
        let mut entries: Vec<&Entry> = self
            .docs
            .values()
            .filter(|e| status.map_or(true, |s| e.doc.status == s))
            .collect();
        entries.sort_by(|a, b| {
            b.doc
                .updated_at
                .cmp(&a.doc.updated_at)
                .then(a.seq.cmp(&b.seq))
        });
        entries.into_iter().map(|e| e.doc.clone()).collect()
    }

    pub fn rename(&mut self, id: &str, title: impl Into<String>) -> Result<Document> {
        let title = title.into();
        validate_title(&title)?;
        self.modify(id, |doc| doc.title = title)
    }

    pub fn update(
        &mut self,
        id: &str,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Document> {
        let title = title.into();
        validate_title(&title)?;
        let content = content.into();
        self.modify(id, |doc| {
            doc.title = title;
            doc.content = content;
        })
    }

    /// Mark a document complete. Completing an already complete document
    /// leaves it untouched.
    pub fn complete(&mut self, id: &str) -> Result<Document> {
        let doc = self
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if doc.status == DocumentStatus::Complete {
            return Ok(doc.clone());
        }
        self.modify(id, |doc| doc.status = DocumentStatus::Complete)
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let removed = self.docs.remove(id).is_some();
        if removed {
            tracing::debug!(id = %id, "document deleted");
        }
        removed
    }

    pub fn clear_all(&mut self) -> usize {
        let count = self.docs.len();
        self.docs.clear();
        tracing::debug!(count, "store cleared");
        count
    }

    fn modify(&mut self, id: &str, apply: impl FnOnce(&mut Document)) -> Result<Document> {
        let entry = self
            .docs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let now = self.clock.tick();
        apply(&mut entry.doc);
        entry.doc.touch(now);
        tracing::debug!(id = %id, status = entry.doc.status.as_str(), "document modified");
        Ok(entry.doc.clone())
    }
}
