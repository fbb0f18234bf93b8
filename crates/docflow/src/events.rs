//! In-memory progress broadcast hub
//!
//! Fans status updates out to whichever clients are currently watching a
//! document. Purely best-effort: nothing is persisted, late subscribers see
//! only subsequent events, and a slow subscriber never stalls the pipeline.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::types::{ProcessingStatus, ProgressEvent};

/// Per-subscriber channel capacity. A consumer this far behind starts
/// losing updates instead of blocking the publisher.
const SUBSCRIBER_BUFFER: usize = 32;

/// Publish/subscribe hub keyed by document ID. Cheap to clone; all clones
/// share the same subscriber map.
#[derive(Clone)]
pub struct ProgressBroadcaster {
    inner: Arc<BroadcasterInner>,
}

struct BroadcasterInner {
    subscribers: DashMap<Uuid, Vec<SubscriberSlot>>,
    next_id: AtomicU64,
}

struct SubscriberSlot {
    id: u64,
    tx: mpsc::Sender<ProgressEvent>,
}

impl ProgressBroadcaster {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BroadcasterInner {
                subscribers: DashMap::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a new subscriber for a document. Any number of subscribers
    /// may watch the same document. The returned handle yields events via
    /// `recv` and unsubscribes itself when dropped.
    pub fn subscribe(&self, document_id: Uuid) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        self.inner
            .subscribers
            .entry(document_id)
            .or_default()
            .push(SubscriberSlot { id, tx });

        tracing::debug!(%document_id, subscriber = id, "Subscriber registered");

        Subscription {
            document_id,
            id,
            rx,
            hub: self.inner.clone(),
        }
    }

    /// Deliver an update to every live subscriber of the document, stamping
    /// it with the current timestamp. Zero subscribers means the update is
    /// silently discarded. Delivery never blocks: a full subscriber queue is
    /// skipped with a warning and a closed one is pruned.
    pub fn broadcast(&self, document_id: Uuid, mut event: ProgressEvent) {
        event.timestamp = Some(Utc::now());

        let Some(mut slots) = self.inner.subscribers.get_mut(&document_id) else {
            tracing::debug!(%document_id, "No subscribers, dropping update");
            return;
        };

        let mut closed: Vec<u64> = Vec::new();
        for slot in slots.iter() {
            match slot.tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        %document_id,
                        subscriber = slot.id,
                        "Subscriber queue full, dropping update"
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(slot.id),
            }
        }

        if !closed.is_empty() {
            slots.retain(|slot| !closed.contains(&slot.id));
        }
        let now_empty = slots.is_empty();
        drop(slots);
        if now_empty {
            self.inner
                .subscribers
                .remove_if(&document_id, |_, slots| slots.is_empty());
        }
    }

    /// Convenience form building the structured update from named fields
    pub fn broadcast_progress(
        &self,
        document_id: Uuid,
        status: ProcessingStatus,
        step: Option<&str>,
        progress: Option<u8>,
        error: Option<&str>,
        chunk_count: Option<u32>,
    ) {
        let mut event = ProgressEvent::status(document_id, status);
        event.processing_step = step.map(|s| s.to_string());
        event.processing_progress = progress;
        event.error_message = error.map(|e| e.to_string());
        event.chunk_count = chunk_count;
        self.broadcast(document_id, event);
    }

    /// Number of live subscribers for a document
    pub fn listener_count(&self, document_id: &Uuid) -> usize {
        self.inner
            .subscribers
            .get(document_id)
            .map(|slots| slots.len())
            .unwrap_or(0)
    }
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// A live subscription to one document's progress events
///
/// Dropping the handle removes it from the hub, so an SSE connection that
/// goes away cleans up after itself. Dropping the last subscriber for a
/// document drops the document's entry entirely.
pub struct Subscription {
    document_id: Uuid,
    id: u64,
    rx: mpsc::Receiver<ProgressEvent>,
    hub: Arc<BroadcasterInner>,
}

impl Subscription {
    /// Receive the next event for this document
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    pub fn document_id(&self) -> Uuid {
        self.document_id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut now_empty = false;
        if let Some(mut slots) = self.hub.subscribers.get_mut(&self.document_id) {
            slots.retain(|slot| slot.id != self.id);
            now_empty = slots.is_empty();
        }
        if now_empty {
            self.hub
                .subscribers
                .remove_if(&self.document_id, |_, slots| slots.is_empty());
        }
        tracing::debug!(document_id = %self.document_id, subscriber = self.id, "Subscriber removed");
    }
}
