//! Live feed of worker location changes.
//!
//! Employer sessions subscribe and receive an initial snapshot of online
//! workers followed by incremental deltas. Delivery rides on a bounded
//! tokio broadcast channel: a slow subscriber observes drop-oldest
//! semantics (`Lagged`) and is re-synced with a fresh snapshot at the SSE
//! layer, so it can never block location ingestion.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::geoindex::WorkerLocation;

/// Default per-subscriber event buffer.
pub const DEFAULT_FEED_BUFFER: usize = 256;

/// A single change to the set of online workers.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    /// A worker came online or moved.
    Upsert { worker: WorkerLocation },
    /// A worker explicitly went offline.
    Remove { worker_id: String },
}

/// Broadcast hub for [`FeedEvent`]s.
#[derive(Debug, Clone)]
pub struct LiveFeed {
    tx: broadcast::Sender<FeedEvent>,
}

impl LiveFeed {
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self { tx }
    }

    /// Sender handle for the GeoIndex to publish deltas through.
    pub fn sender(&self) -> broadcast::Sender<FeedEvent> {
        self.tx.clone()
    }

    /// Subscribe to deltas. The caller is responsible for emitting the
    /// initial snapshot before draining the receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for LiveFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_BUFFER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn loc(id: &str) -> WorkerLocation {
        WorkerLocation {
            worker_id: id.to_string(),
            latitude: 18.52,
            longitude: 73.85,
            is_online: true,
            last_updated: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_deltas_in_order() {
        let feed = LiveFeed::new(16);
        let mut rx = feed.subscribe();

        feed.sender()
            .send(FeedEvent::Upsert { worker: loc("w1") })
            .unwrap();
        feed.sender()
            .send(FeedEvent::Remove {
                worker_id: "w1".to_string(),
            })
            .unwrap();

        match rx.recv().await.unwrap() {
            FeedEvent::Upsert { worker } => assert_eq!(worker.worker_id, "w1"),
            other => panic!("expected upsert, got {other:?}"),
        }
        match rx.recv().await.unwrap() {
            FeedEvent::Remove { worker_id } => assert_eq!(worker_id, "w1"),
            other => panic!("expected remove, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_harmless() {
        let feed = LiveFeed::new(16);
        // send() errors when nobody is listening; publishers ignore that.
        assert!(feed.sender().send(FeedEvent::Upsert { worker: loc("w1") }).is_err());
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_instead_of_blocking() {
        let feed = LiveFeed::new(2);
        let mut rx = feed.subscribe();

        for i in 0..5 {
            let _ = feed.sender().send(FeedEvent::Remove {
                worker_id: format!("w{i}"),
            });
        }

        // Oldest events were dropped; the receiver learns how many.
        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(n)) => assert!(n >= 1),
            other => panic!("expected lag, got {other:?}"),
        }
    }

    #[test]
    fn test_feed_event_serializes_with_type_tag() {
        let json = serde_json::to_value(FeedEvent::Remove {
            worker_id: "w9".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "remove");
        assert_eq!(json["worker_id"], "w9");
    }
}
