pub mod merge;
pub mod migrations;
pub mod refresh_log;
pub mod summary;
pub mod topics;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use refresh_log::{RefreshStatus, UpdateRecord, REFRESH_COOLDOWN_SECS};
pub use summary::TopicSummary;
pub use topics::TopicStore;

/// Name of the bookkeeping table; never listed as a topic.
pub const UPDATE_LOG_TABLE: &str = "update_log";

/// One row keyed by column name.
pub type RowMap = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed preparing database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown topic: {0}")]
    UnknownTopic(String),
    #[error("unknown column {column} in topic {topic}")]
    UnknownColumn { topic: String, column: String },
    #[error("invalid topic name: {0:?}")]
    InvalidTopicName(String),
    #[error("invalid timestamp {raw:?} in update log: {source}")]
    Timestamp {
        raw: String,
        source: chrono::ParseError,
    },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    pub fn flipped(&self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

impl Display for SortOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, Error)]
#[error("unknown sort order: {0}")]
pub struct SortOrderParseError(pub String);

impl FromStr for SortOrder {
    type Err = SortOrderParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            _ => Err(SortOrderParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TablePage {
    pub rows: Vec<RowMap>,
    pub total_count: usize,
    pub total_pages: usize,
    pub page: usize,
    pub per_page: usize,
}

impl TablePage {
    pub fn empty(page: usize, per_page: usize) -> Self {
        Self {
            rows: Vec::new(),
            total_count: 0,
            total_pages: 0,
            page,
            per_page,
        }
    }

    /// Slices an already filtered and sorted row set down to one page.
    pub fn paginate(all: Vec<RowMap>, page: usize, per_page: usize) -> Self {
        let page = page.max(1);
        let total_count = all.len();
        Self {
            rows: all
                .into_iter()
                .skip(page_offset(page, per_page))
                .take(per_page)
                .collect(),
            total_count,
            total_pages: total_pages(total_count, per_page),
            page,
            per_page,
        }
    }
}

/// One scraped search hit, ready to merge into a topic table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoScore {
    pub identifier: String,
    pub score: f64,
}

impl VideoScore {
    pub fn new(identifier: impl Into<String>, score: f64) -> Self {
        Self {
            identifier: identifier.into(),
            score,
        }
    }
}

pub fn total_pages(total_count: usize, per_page: usize) -> usize {
    if per_page == 0 {
        return 0;
    }
    total_count.div_ceil(per_page)
}

pub fn page_offset(page: usize, per_page: usize) -> usize {
    page.max(1).saturating_sub(1).saturating_mul(per_page)
}

/// Double-quotes an SQL identifier. Callers must still check the name
/// against the allow-list before interpolating it.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn validate_topic_name(name: &str) -> StoreResult<&str> {
    let trimmed = name.trim();
    let invalid = trimmed.is_empty()
        || trimmed != name
        || trimmed.eq_ignore_ascii_case(UPDATE_LOG_TABLE)
        || trimmed.to_ascii_lowercase().starts_with("sqlite_")
        || trimmed.chars().any(char::is_control);
    if invalid {
        return Err(StoreError::InvalidTopicName(name.to_string()));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        page_offset, quote_ident, total_pages, validate_topic_name, RowMap, SortOrder, TablePage,
    };

    #[test]
    fn parses_sort_order_case_insensitively() {
        assert_eq!("desc".parse::<SortOrder>().unwrap(), SortOrder::Desc);
        assert_eq!(" Asc ".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert!("sideways".parse::<SortOrder>().is_err());
        assert_eq!(SortOrder::Asc.flipped(), SortOrder::Desc);
    }

    #[test]
    fn pagination_math() {
        assert_eq!(total_pages(45, 20), 3);
        assert_eq!(total_pages(40, 20), 2);
        assert_eq!(total_pages(0, 20), 0);
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(3, 20), 40);
        assert_eq!(page_offset(0, 20), 0);
    }

    #[test]
    fn paginates_filtered_rows() {
        let rows = (0..45)
            .map(|i| {
                let mut row = RowMap::new();
                row.insert("identifier".to_string(), json!(format!("id{i}")));
                row
            })
            .collect::<Vec<_>>();
        let page = TablePage::paginate(rows, 3, 20);
        assert_eq!(page.rows.len(), 5);
        assert_eq!(page.rows[0]["identifier"], json!("id40"));
        assert_eq!(page.total_count, 45);
        assert_eq!(page.total_pages, 3);
        assert!(TablePage::paginate(Vec::new(), 4, 20).rows.is_empty());
    }

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_ident("demo"), "\"demo\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn rejects_reserved_and_blank_topic_names() {
        assert!(validate_topic_name("哈基米音乐").is_ok());
        assert!(validate_topic_name("OI").is_ok());
        assert!(validate_topic_name("").is_err());
        assert!(validate_topic_name(" demo").is_err());
        assert!(validate_topic_name("update_log").is_err());
        assert!(validate_topic_name("sqlite_sequence").is_err());
        assert!(validate_topic_name("bad\nname").is_err());
    }
}
