//! Live processing progress over server-sent events

use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::events::Subscription;
use crate::server::state::AppState;

/// Stream progress updates for one document as server-sent events.
///
/// Opens with a `connected` event, relays every update published for the
/// document, and closes with a `done` event once a terminal status has been
/// relayed. A keepalive comment goes out every 30 seconds so intermediaries
/// keep the connection open. Subscribing to an unknown document is allowed;
/// the client simply waits until its processing starts.
pub async fn stream_progress(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let subscription = state.broadcaster().subscribe(document_id);

    let stream = event_payloads(subscription).map(|payload| Event::default().json_data(&payload));

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keep-alive"),
    )
}

/// Stages of one subscriber's event sequence
enum Phase {
    Connected(Subscription),
    Relaying(Subscription),
    Done,
    Closed,
}

/// The JSON payloads for one subscription: `connected`, then every relayed
/// update, then `done` after a terminal update or once the publisher side
/// goes away. Dropping the subscription (by leaving `Relaying`) is what
/// unsubscribes from the broadcast hub.
fn event_payloads(subscription: Subscription) -> impl Stream<Item = Value> {
    stream::unfold(Phase::Connected(subscription), |phase| async move {
        match phase {
            Phase::Connected(sub) => {
                let payload = json!({
                    "type": "connected",
                    "document_id": sub.document_id(),
                });
                Some((payload, Phase::Relaying(sub)))
            }
            Phase::Relaying(mut sub) => match sub.recv().await {
                Some(update) => {
                    let next = if update.processing_status.is_terminal() {
                        Phase::Done
                    } else {
                        Phase::Relaying(sub)
                    };
                    let payload = serde_json::to_value(&update).unwrap_or_default();
                    Some((payload, next))
                }
                None => Some((json!({ "type": "done" }), Phase::Closed)),
            },
            Phase::Done => Some((json!({ "type": "done" }), Phase::Closed)),
            Phase::Closed => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ProgressBroadcaster;
    use crate::types::ProcessingStatus;

    #[tokio::test]
    async fn payloads_open_with_connected_and_end_after_terminal() {
        let hub = ProgressBroadcaster::new();
        let document_id = Uuid::new_v4();
        let subscription = hub.subscribe(document_id);

        hub.broadcast_progress(
            document_id,
            ProcessingStatus::Processing,
            Some("chunking"),
            Some(30),
            None,
            None,
        );
        hub.broadcast_progress(
            document_id,
            ProcessingStatus::Completed,
            None,
            Some(100),
            None,
            Some(4),
        );

        let mut payloads = Box::pin(event_payloads(subscription));

        let connected = payloads.next().await.unwrap();
        assert_eq!(connected["type"], "connected");
        assert_eq!(connected["document_id"], document_id.to_string());

        let update = payloads.next().await.unwrap();
        assert_eq!(update["processing_status"], "processing");
        assert_eq!(update["processing_step"], "chunking");
        assert_eq!(update["processing_progress"], 30);

        let update = payloads.next().await.unwrap();
        assert_eq!(update["processing_status"], "completed");
        assert_eq!(update["chunk_count"], 4);

        let done = payloads.next().await.unwrap();
        assert_eq!(done["type"], "done");

        assert!(payloads.next().await.is_none());
    }

    #[tokio::test]
    async fn failed_status_also_ends_the_stream() {
        let hub = ProgressBroadcaster::new();
        let document_id = Uuid::new_v4();
        let subscription = hub.subscribe(document_id);

        hub.broadcast_progress(
            document_id,
            ProcessingStatus::Failed,
            None,
            None,
            Some("Text extraction failed: unreadable scan"),
            None,
        );

        let mut payloads = Box::pin(event_payloads(subscription));

        assert_eq!(payloads.next().await.unwrap()["type"], "connected");

        let update = payloads.next().await.unwrap();
        assert_eq!(update["processing_status"], "failed");
        assert_eq!(
            update["error_message"],
            "Text extraction failed: unreadable scan"
        );

        assert_eq!(payloads.next().await.unwrap()["type"], "done");
        assert!(payloads.next().await.is_none());
    }
}
