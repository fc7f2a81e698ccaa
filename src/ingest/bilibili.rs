use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, REFERER};
use reqwest::Client;
use serde::Deserialize;

use crate::config::SearchConfig;
use crate::ingest::{SearchPage, SearchSource};
use crate::store::VideoScore;

const CONNECT_TIMEOUT_SECS: u64 = 6;
const REFERER_URL: &str = "https://www.bilibili.com";

/// Video search against Bilibili's `search/type` endpoint. Each hit becomes
/// `(bvid, like count)`.
#[derive(Debug, Clone)]
pub struct BilibiliSearch {
    client: Client,
    endpoint: String,
    duration: u8,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<SearchData>,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    #[serde(rename = "numPages", default)]
    num_pages: u32,
    #[serde(default)]
    result: Option<Vec<RawHit>>,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    bvid: Option<String>,
    like: Option<f64>,
}

impl BilibiliSearch {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_static(REFERER_URL));
        if !config.cookie.trim().is_empty() {
            let cookie = HeaderValue::from_str(config.cookie.trim())
                .context("search cookie is not a valid header value")?;
            headers.insert(COOKIE, cookie);
        }
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .context("failed building search HTTP client")?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            duration: config.duration,
        })
    }
}

impl BilibiliSearch {
    fn search_query(&self, topic: &str, page: Option<u32>) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("search_type", "video".to_string()),
            ("keyword", topic.to_string()),
            ("duration", self.duration.to_string()),
        ];
        if let Some(page) = page {
            query.push(("page", page.to_string()));
        }
        query
    }
}

#[async_trait]
impl SearchSource for BilibiliSearch {
    fn name(&self) -> &str {
        "bilibili"
    }

    async fn search_page(&self, topic: &str, page: Option<u32>) -> Result<SearchPage> {
        let query = self.search_query(topic, page);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&query)
            .send()
            .await
            .with_context(|| format!("failed GET request: {}", self.endpoint))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("failed reading response body: {}", self.endpoint))?;
        if !status.is_success() {
            let preview: String = body.chars().take(180).collect();
            return Err(anyhow!("GET {} returned {status}: {preview}", self.endpoint));
        }
        parse_search_response(&body)
    }
}

pub fn parse_search_response(body: &str) -> Result<SearchPage> {
    let envelope: Envelope =
        serde_json::from_str(body).context("invalid JSON from search endpoint")?;
    if envelope.code != 0 {
        return Err(anyhow!(
            "search endpoint rejected request (code {}): {}",
            envelope.code,
            envelope.message
        ));
    }
    let data = envelope
        .data
        .ok_or_else(|| anyhow!("search response has no data section"))?;
    let hits = data
        .result
        .unwrap_or_default()
        .into_iter()
        .filter_map(|hit| {
            let identifier = hit.bvid.filter(|id| !id.trim().is_empty())?;
            Some(VideoScore::new(identifier, hit.like.unwrap_or(0.0)))
        })
        .collect();
    Ok(SearchPage {
        num_pages: data.num_pages,
        hits,
    })
}

#[cfg(test)]
mod tests {
    use super::{parse_search_response, BilibiliSearch};
    use crate::config::SearchConfig;
    use crate::store::VideoScore;

    #[test]
    fn parses_hits_and_page_count() {
        let body = r#"{
            "code": 0,
            "message": "0",
            "data": {
                "page": 1,
                "numPages": 50,
                "result": [
                    {"type": "video", "bvid": "BV1xx411c7mD", "like": 1520, "title": "a"},
                    {"type": "video", "bvid": "BV1yy411c7mE", "like": 33},
                    {"type": "video", "title": "no id"}
                ]
            }
        }"#;
        let page = parse_search_response(body).expect("parse failed");
        assert_eq!(page.num_pages, 50);
        assert_eq!(
            page.hits,
            vec![
                VideoScore::new("BV1xx411c7mD", 1520.0),
                VideoScore::new("BV1yy411c7mE", 33.0),
            ]
        );
    }

    #[test]
    fn empty_result_section_is_not_an_error() {
        let page = parse_search_response(r#"{"code":0,"data":{"numPages":0}}"#)
            .expect("parse failed");
        assert_eq!(page.num_pages, 0);
        assert!(page.hits.is_empty());
    }

    #[test]
    fn non_zero_code_is_an_error() {
        let err = parse_search_response(r#"{"code":-412,"message":"request was banned"}"#)
            .expect_err("should fail");
        assert!(err.to_string().contains("-412"));
        assert!(parse_search_response("<html>").is_err());
    }

    #[test]
    fn default_query_asks_for_short_videos() {
        let search = BilibiliSearch::new(&SearchConfig::default()).expect("client build failed");
        let probe = search.search_query("OI", None);
        assert!(probe.contains(&("duration", "1".to_string())));
        assert!(probe.contains(&("keyword", "OI".to_string())));
        assert!(!probe.iter().any(|(key, _)| *key == "page"));

        let paged = search.search_query("OI", Some(3));
        assert!(paged.contains(&("duration", "1".to_string())));
        assert!(paged.contains(&("page", "3".to_string())));
    }

    #[test]
    fn rejects_unusable_cookie() {
        let config = SearchConfig {
            cookie: "bad\ncookie".to_string(),
            ..SearchConfig::default()
        };
        assert!(BilibiliSearch::new(&config).is_err());
        assert!(BilibiliSearch::new(&SearchConfig::default()).is_ok());
    }
}
