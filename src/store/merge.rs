use rusqlite::params;
use tracing::{info, warn};

use crate::store::topics::resolve_topic;
use crate::store::{quote_ident, StoreResult, TopicStore, VideoScore};

impl TopicStore {
    /// Upserts scores keyed on identifier: insert if absent, then overwrite
    /// the score. Rows missing from `pairs` are left alone. A failing pair
    /// stops the loop but everything applied before it is still committed.
    pub fn merge_scores(&self, topic: &str, pairs: &[VideoScore]) -> StoreResult<usize> {
        let mut conn = self.connect()?;
        let topic = resolve_topic(&conn, topic)?;
        let table = quote_ident(&topic);
        let tx = conn.transaction()?;
        let mut applied = 0usize;
        {
            let mut insert = tx.prepare(&format!(
                "INSERT OR IGNORE INTO {table} (identifier, score) VALUES (?1, ?2)"
            ))?;
            let mut update =
                tx.prepare(&format!("UPDATE {table} SET score = ?1 WHERE identifier = ?2"))?;
            for pair in pairs {
                let step = insert
                    .execute(params![pair.identifier, pair.score])
                    .and_then(|_| update.execute(params![pair.score, pair.identifier]));
                if let Err(err) = step {
                    warn!(
                        "merge into {topic} stopped at {} after {applied} pairs: {err}",
                        pair.identifier
                    );
                    break;
                }
                applied += 1;
            }
        }
        tx.commit()?;
        info!("merged {applied} scores into {topic}");
        Ok(applied)
    }
}
