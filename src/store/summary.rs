use serde::Serialize;
use tracing::warn;

use crate::store::TopicStore;

/// Per-topic overview used by the index page, `/stats` and the CLI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicSummary {
    pub name: String,
    pub count: usize,
    pub last_update: String,
    pub can_refresh: bool,
}

impl TopicStore {
    pub fn summarize(&self, topic: &str) -> TopicSummary {
        let (last_update, can_refresh) = match self.refresh_status(topic) {
            Ok(status) => (status.to_string(), status.can_refresh()),
            Err(err) => {
                warn!("failed reading refresh status of {topic}: {err}");
                ("status unavailable".to_string(), false)
            }
        };
        TopicSummary {
            name: topic.to_string(),
            count: self.count_rows(topic),
            last_update,
            can_refresh,
        }
    }

    pub fn summaries(&self) -> Vec<TopicSummary> {
        self.list_topics()
            .iter()
            .map(|topic| self.summarize(topic))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::store::{TopicStore, VideoScore};

    #[test]
    fn summarizes_every_topic() {
        let dir = tempfile::tempdir().expect("failed creating temp dir");
        let store = TopicStore::open(&dir.path().join("topics.db")).expect("failed opening store");
        store.create_topic("alpha").expect("create alpha");
        store.create_topic("beta").expect("create beta");
        store
            .merge_scores("beta", &[VideoScore::new("BV1", 1.0)])
            .expect("merge");
        store.record_refresh("beta").expect("record");

        let summaries = store.summaries();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "alpha");
        assert_eq!(summaries[0].count, 0);
        assert_eq!(summaries[0].last_update, "never updated");
        assert!(summaries[0].can_refresh);
        assert_eq!(summaries[1].count, 1);
        assert!(!summaries[1].can_refresh);
        assert!(summaries[1].last_update.starts_with("last updated: "));
    }
}
