pub const BASE_MIGRATION: &str = r#"
CREATE TABLE IF NOT EXISTS update_log (
    table_name TEXT PRIMARY KEY,
    last_updated TIMESTAMP,
    update_count INTEGER DEFAULT 0
);
"#;

pub fn create_topic_sql(quoted_topic: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {quoted_topic} (
    identifier TEXT NOT NULL,
    score FLOAT NOT NULL,
    PRIMARY KEY (identifier)
)
"#
    )
}
