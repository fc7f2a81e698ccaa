use std::fmt::{Display, Formatter};

use chrono::{Duration, Local, NaiveDateTime};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

use crate::store::{StoreError, StoreResult, TopicStore};

/// Minimum spacing between two refreshes of the same topic.
pub const REFRESH_COOLDOWN_SECS: i64 = 3 * 3600;

const STORED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateRecord {
    pub table_name: String,
    pub last_updated: NaiveDateTime,
    pub update_count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshStatus {
    Never,
    Cooling {
        last_updated: NaiveDateTime,
        update_count: i64,
        remaining: Duration,
    },
    Eligible {
        last_updated: NaiveDateTime,
        update_count: i64,
    },
}

impl RefreshStatus {
    pub fn evaluate(record: Option<&UpdateRecord>, now: NaiveDateTime) -> Self {
        let Some(record) = record else {
            return Self::Never;
        };
        let next_allowed = record.last_updated + Duration::seconds(REFRESH_COOLDOWN_SECS);
        if now < next_allowed {
            Self::Cooling {
                last_updated: record.last_updated,
                update_count: record.update_count,
                remaining: next_allowed - now,
            }
        } else {
            Self::Eligible {
                last_updated: record.last_updated,
                update_count: record.update_count,
            }
        }
    }

    pub fn can_refresh(&self) -> bool {
        !matches!(self, Self::Cooling { .. })
    }
}

impl Display for RefreshStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Never => f.write_str("never updated"),
            Self::Cooling {
                last_updated,
                update_count,
                remaining,
            } => {
                let secs = remaining.num_seconds().max(0);
                write!(
                    f,
                    "last updated: {} (refresh available in {}h {}m, updated {} times)",
                    last_updated.format(DISPLAY_FORMAT),
                    secs / 3600,
                    (secs % 3600) / 60,
                    update_count
                )
            }
            Self::Eligible {
                last_updated,
                update_count,
            } => write!(
                f,
                "last updated: {} (refresh available, updated {} times)",
                last_updated.format(DISPLAY_FORMAT),
                update_count
            ),
        }
    }
}

pub fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

impl TopicStore {
    pub fn update_record(&self, topic: &str) -> StoreResult<Option<UpdateRecord>> {
        let conn = self.connect()?;
        let raw = conn
            .query_row(
                "SELECT last_updated, update_count FROM update_log WHERE table_name = ?1",
                params![topic],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                    ))
                },
            )
            .optional()?;
        let Some((last_updated, update_count)) = raw else {
            return Ok(None);
        };
        Ok(Some(UpdateRecord {
            table_name: topic.to_string(),
            last_updated: parse_timestamp(&last_updated)?,
            update_count,
        }))
    }

    pub fn refresh_status_at(&self, topic: &str, now: NaiveDateTime) -> StoreResult<RefreshStatus> {
        let record = self.update_record(topic)?;
        Ok(RefreshStatus::evaluate(record.as_ref(), now))
    }

    pub fn refresh_status(&self, topic: &str) -> StoreResult<RefreshStatus> {
        self.refresh_status_at(topic, now_local())
    }

    pub fn can_refresh_at(&self, topic: &str, now: NaiveDateTime) -> StoreResult<bool> {
        Ok(self.refresh_status_at(topic, now)?.can_refresh())
    }

    pub fn can_refresh(&self, topic: &str) -> StoreResult<bool> {
        self.can_refresh_at(topic, now_local())
    }

    pub fn describe_refresh_status(&self, topic: &str) -> StoreResult<String> {
        Ok(self.refresh_status(topic)?.to_string())
    }

    pub fn record_refresh_at(&self, topic: &str, now: NaiveDateTime) -> StoreResult<UpdateRecord> {
        let conn = self.connect()?;
        conn.execute(
            r#"
INSERT OR REPLACE INTO update_log (table_name, last_updated, update_count)
VALUES (
    ?1,
    ?2,
    COALESCE((SELECT update_count FROM update_log WHERE table_name = ?1), 0) + 1
)
"#,
            params![topic, now.format(STORED_FORMAT).to_string()],
        )?;
        let update_count: i64 = conn.query_row(
            "SELECT update_count FROM update_log WHERE table_name = ?1",
            params![topic],
            |row| row.get(0),
        )?;
        Ok(UpdateRecord {
            table_name: topic.to_string(),
            last_updated: now,
            update_count,
        })
    }

    pub fn record_refresh(&self, topic: &str) -> StoreResult<UpdateRecord> {
        self.record_refresh_at(topic, now_local())
    }
}

fn parse_timestamp(raw: &str) -> StoreResult<NaiveDateTime> {
    raw.parse::<NaiveDateTime>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map_err(|source| StoreError::Timestamp {
            raw: raw.to_string(),
            source,
        })
}
