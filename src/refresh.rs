use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing::info;

use crate::ingest::{collect_videos, SearchSource};
use crate::store::TopicStore;

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Refreshed {
        fetched: usize,
        merged: usize,
        update_count: i64,
    },
    /// Throttled; carries the human-readable status.
    Cooling(String),
    InProgress,
}

/// Per-topic leases held for the duration of a refresh. Only guards
/// refreshes inside this process.
#[derive(Debug, Clone, Default)]
pub struct RefreshLeases {
    active: Arc<Mutex<HashSet<String>>>,
}

pub struct LeaseGuard {
    topic: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl RefreshLeases {
    pub fn try_acquire(&self, topic: &str) -> Option<LeaseGuard> {
        let mut active = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !active.insert(topic.to_string()) {
            return None;
        }
        Some(LeaseGuard {
            topic: topic.to_string(),
            active: Arc::clone(&self.active),
        })
    }

    pub fn is_active(&self, topic: &str) -> bool {
        self.active
            .lock()
            .map(|active| active.contains(topic))
            .unwrap_or(false)
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        let mut active = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        active.remove(&self.topic);
    }
}

/// Gate check, scrape, merge, then record the refresh. The gate runs before
/// any network call; a throttled or busy topic never reaches the source.
pub async fn refresh_topic(
    store: &TopicStore,
    source: &dyn SearchSource,
    leases: &RefreshLeases,
    topic: &str,
) -> Result<RefreshOutcome> {
    let Some(_lease) = leases.try_acquire(topic) else {
        info!("refresh of {topic} already running");
        return Ok(RefreshOutcome::InProgress);
    };

    let status = store
        .refresh_status(topic)
        .with_context(|| format!("failed reading refresh status of {topic}"))?;
    if !status.can_refresh() {
        info!("refresh of {topic} throttled: {status}");
        return Ok(RefreshOutcome::Cooling(status.to_string()));
    }

    let videos = collect_videos(source, topic).await?;
    let merged = if videos.is_empty() {
        info!("no videos fetched for {topic}");
        0
    } else {
        store
            .merge_scores(topic, &videos)
            .with_context(|| format!("failed merging scores into {topic}"))?
    };
    let record = store
        .record_refresh(topic)
        .with_context(|| format!("failed recording refresh of {topic}"))?;
    info!(
        "refreshed {topic}: {} fetched, {merged} merged, refresh #{}",
        videos.len(),
        record.update_count
    );
    Ok(RefreshOutcome::Refreshed {
        fetched: videos.len(),
        merged,
        update_count: record.update_count,
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::{refresh_topic, RefreshLeases, RefreshOutcome};
    use crate::ingest::testing::FakeSource;
    use crate::store::{TopicStore, VideoScore};

    fn demo_store() -> (TempDir, TopicStore) {
        let dir = tempfile::tempdir().expect("failed creating temp dir");
        let store = TopicStore::open(&dir.path().join("topics.db")).expect("failed opening store");
        store.create_topic("demo").expect("failed creating topic");
        (dir, store)
    }

    #[tokio::test]
    async fn refresh_merges_and_records() {
        let (_dir, store) = demo_store();
        let source = FakeSource::with_pages(vec![vec![
            VideoScore::new("id1", 10.0),
            VideoScore::new("id2", 20.0),
        ]]);
        let leases = RefreshLeases::default();

        let outcome = refresh_topic(&store, &source, &leases, "demo")
            .await
            .expect("refresh failed");
        assert_eq!(
            outcome,
            RefreshOutcome::Refreshed {
                fetched: 2,
                merged: 2,
                update_count: 1
            }
        );
        assert_eq!(store.count_rows("demo"), 2);
        assert!(!store.can_refresh("demo").unwrap());
        assert!(!leases.is_active("demo"));
    }

    #[tokio::test]
    async fn cooling_topic_skips_the_network() {
        let (_dir, store) = demo_store();
        store.record_refresh("demo").expect("record failed");
        let source = FakeSource::with_pages(vec![vec![VideoScore::new("id1", 1.0)]]);

        let outcome = refresh_topic(&store, &source, &RefreshLeases::default(), "demo")
            .await
            .expect("refresh failed");
        match outcome {
            RefreshOutcome::Cooling(status) => assert!(status.contains("updated 1 times")),
            other => panic!("expected cooling, got {other:?}"),
        }
        assert_eq!(source.request_count(), 0);
        assert_eq!(store.count_rows("demo"), 0);
    }

    #[tokio::test]
    async fn held_lease_rejects_second_refresh() {
        let (_dir, store) = demo_store();
        let source = FakeSource::default();
        let leases = RefreshLeases::default();
        let _held = leases.try_acquire("demo").expect("lease should be free");

        let outcome = refresh_topic(&store, &source, &leases, "demo")
            .await
            .expect("refresh failed");
        assert_eq!(outcome, RefreshOutcome::InProgress);
        assert_eq!(source.request_count(), 0);
        assert!(leases.try_acquire("other").is_some());
    }

    #[tokio::test]
    async fn empty_scrape_still_counts_as_refresh() {
        let (_dir, store) = demo_store();
        let outcome = refresh_topic(&store, &FakeSource::default(), &RefreshLeases::default(), "demo")
            .await
            .expect("refresh failed");
        assert_eq!(
            outcome,
            RefreshOutcome::Refreshed {
                fetched: 0,
                merged: 0,
                update_count: 1
            }
        );
    }

    #[tokio::test]
    async fn probe_failure_leaves_gate_open() {
        let (_dir, store) = demo_store();
        let source = FakeSource {
            fail_probe: true,
            ..FakeSource::default()
        };
        let leases = RefreshLeases::default();
        assert!(refresh_topic(&store, &source, &leases, "demo").await.is_err());
        assert!(store.can_refresh("demo").unwrap());
        assert!(!leases.is_active("demo"));
    }
}
