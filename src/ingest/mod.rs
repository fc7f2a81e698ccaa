pub mod bilibili;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::store::VideoScore;

pub use bilibili::BilibiliSearch;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub num_pages: u32,
    pub hits: Vec<VideoScore>,
}

#[async_trait]
pub trait SearchSource: Send + Sync {
    fn name(&self) -> &str;
    /// `page = None` asks for the endpoint's default first page.
    async fn search_page(&self, topic: &str, page: Option<u32>) -> Result<SearchPage>;
}

/// Walks every result page of `topic` in order. The page-count probe must
/// succeed; after that the first failing page ends the walk and whatever was
/// gathered so far is returned.
pub async fn collect_videos(source: &dyn SearchSource, topic: &str) -> Result<Vec<VideoScore>> {
    let probe = source
        .search_page(topic, None)
        .await
        .with_context(|| format!("failed discovering result pages for {topic}"))?;
    let num_pages = probe.num_pages;
    debug!("{} reports {num_pages} pages for {topic}", source.name());

    let mut videos = Vec::new();
    for page in 1..=num_pages {
        match source.search_page(topic, Some(page)).await {
            Ok(result) => videos.extend(result.hits),
            Err(err) => {
                warn!(
                    "stopping {topic} search at page {page}/{num_pages} with {} videos: {err:#}",
                    videos.len()
                );
                break;
            }
        }
    }
    info!(
        "collected {} videos for {topic} from {}",
        videos.len(),
        source.name()
    );
    Ok(videos)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use crate::ingest::{SearchPage, SearchSource};
    use crate::store::VideoScore;

    /// Serves canned pages and records every request it sees.
    #[derive(Default)]
    pub struct FakeSource {
        pub pages: BTreeMap<u32, Vec<VideoScore>>,
        pub failing_pages: BTreeSet<u32>,
        pub fail_probe: bool,
        pub requests: Mutex<Vec<Option<u32>>>,
    }

    impl FakeSource {
        pub fn with_pages(pages: Vec<Vec<VideoScore>>) -> Self {
            Self {
                pages: pages
                    .into_iter()
                    .enumerate()
                    .map(|(idx, hits)| (idx as u32 + 1, hits))
                    .collect(),
                ..Self::default()
            }
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().map(|r| r.len()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl SearchSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        async fn search_page(&self, _topic: &str, page: Option<u32>) -> Result<SearchPage> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(page);
            }
            if page.is_none() && self.fail_probe {
                return Err(anyhow!("probe refused"));
            }
            let number = page.unwrap_or(1);
            if self.failing_pages.contains(&number) {
                return Err(anyhow!("page {number} refused"));
            }
            Ok(SearchPage {
                num_pages: self.pages.len() as u32,
                hits: self.pages.get(&number).cloned().unwrap_or_default(),
            })
        }
    }
}
