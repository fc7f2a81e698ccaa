use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{params, params_from_iter, Connection};
use serde_json::{Number, Value};
use tracing::{debug, warn};

use crate::store::migrations::{create_topic_sql, BASE_MIGRATION};
use crate::store::{
    page_offset, quote_ident, total_pages, validate_topic_name, ColumnInfo, RowMap, SortOrder,
    StoreError, StoreResult, TablePage, UPDATE_LOG_TABLE,
};

/// Handle to the topic database. Every operation opens its own connection.
#[derive(Debug, Clone)]
pub struct TopicStore {
    db_path: PathBuf,
}

impl TopicStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let store = Self {
            db_path: path.to_path_buf(),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub(crate) fn connect(&self) -> StoreResult<Connection> {
        Ok(Connection::open(&self.db_path)?)
    }

    fn migrate(&self) -> StoreResult<()> {
        self.connect()?.execute_batch(BASE_MIGRATION)?;
        Ok(())
    }

    pub fn list_topics(&self) -> Vec<String> {
        match self.connect().and_then(|conn| query_topics(&conn)) {
            Ok(topics) => topics,
            Err(err) => {
                warn!("failed listing topics: {err}");
                Vec::new()
            }
        }
    }

    pub fn has_topic(&self, topic: &str) -> bool {
        self.list_topics().iter().any(|known| known == topic)
    }

    pub fn create_topic(&self, name: &str) -> StoreResult<()> {
        let name = validate_topic_name(name)?;
        let conn = self.connect()?;
        conn.execute_batch(&create_topic_sql(&quote_ident(name)))?;
        debug!("provisioned topic table {name}");
        Ok(())
    }

    pub fn describe_schema(&self, topic: &str) -> Vec<ColumnInfo> {
        let result = self.connect().and_then(|conn| {
            let topic = resolve_topic(&conn, topic)?;
            query_schema(&conn, &topic)
        });
        match result {
            Ok(columns) => columns,
            Err(err) => {
                warn!("failed describing schema of {topic}: {err}");
                Vec::new()
            }
        }
    }

    pub fn fetch_page(
        &self,
        topic: &str,
        page: usize,
        per_page: usize,
        sort_column: &str,
        order: SortOrder,
    ) -> TablePage {
        let page = page.max(1);
        match self.try_fetch_page(topic, page, per_page, sort_column, order) {
            Ok(result) => result,
            Err(err) => {
                warn!("failed fetching page {page} of {topic}: {err}");
                TablePage::empty(page, per_page)
            }
        }
    }

    fn try_fetch_page(
        &self,
        topic: &str,
        page: usize,
        per_page: usize,
        sort_column: &str,
        order: SortOrder,
    ) -> StoreResult<TablePage> {
        let conn = self.connect()?;
        let topic = resolve_topic(&conn, topic)?;
        let schema = query_schema(&conn, &topic)?;
        let order_by = order_clause(&topic, &schema, sort_column, order)?;
        let table = quote_ident(&topic);

        let total_count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        let total_count = total_count.max(0) as usize;
        let empty = TablePage {
            rows: Vec::new(),
            total_count,
            total_pages: total_pages(total_count, per_page),
            page,
            per_page,
        };
        let offset = page_offset(page, per_page);
        if offset >= total_count {
            return Ok(empty);
        }
        // SQLite treats a negative OFFSET as 0.
        let (Ok(limit), Ok(offset)) = (i64::try_from(per_page), i64::try_from(offset)) else {
            return Ok(empty);
        };

        let sql = format!("SELECT * FROM {table} {order_by} LIMIT ?1 OFFSET ?2");
        let mut stmt = conn.prepare(&sql)?;
        let rows = collect_rows(&mut stmt, params![limit, offset])?;

        Ok(TablePage { rows, ..empty })
    }

    pub fn search_rows(
        &self,
        topic: &str,
        term: &str,
        sort_column: &str,
        order: SortOrder,
    ) -> Vec<RowMap> {
        match self.try_search_rows(topic, term, sort_column, order) {
            Ok(rows) => rows,
            Err(err) => {
                warn!("search of {topic} for {term:?} failed: {err}");
                Vec::new()
            }
        }
    }

    fn try_search_rows(
        &self,
        topic: &str,
        term: &str,
        sort_column: &str,
        order: SortOrder,
    ) -> StoreResult<Vec<RowMap>> {
        let conn = self.connect()?;
        let topic = resolve_topic(&conn, topic)?;
        let schema = query_schema(&conn, &topic)?;
        let order_by = order_clause(&topic, &schema, sort_column, order)?;
        let table = quote_ident(&topic);

        if term.is_empty() || schema.is_empty() {
            let mut stmt = conn.prepare(&format!("SELECT * FROM {table} {order_by}"))?;
            return collect_rows(&mut stmt, params![]);
        }

        let where_clause = schema
            .iter()
            .map(|column| format!("{} LIKE ?", quote_ident(&column.name)))
            .collect::<Vec<_>>()
            .join(" OR ");
        let pattern = format!("%{term}%");
        let sql = format!("SELECT * FROM {table} WHERE {where_clause} {order_by}");
        let mut stmt = conn.prepare(&sql)?;
        collect_rows(
            &mut stmt,
            params_from_iter(std::iter::repeat(pattern.as_str()).take(schema.len())),
        )
    }

    /// First `limit` rows in storage order.
    pub fn fetch_rows(&self, topic: &str, limit: usize) -> Vec<RowMap> {
        let result = self.connect().and_then(|conn| {
            let topic = resolve_topic(&conn, topic)?;
            let mut stmt = conn.prepare(&format!("SELECT * FROM {} LIMIT ?1", quote_ident(&topic)))?;
            collect_rows(&mut stmt, params![limit as i64])
        });
        match result {
            Ok(rows) => rows,
            Err(err) => {
                warn!("failed reading rows of {topic}: {err}");
                Vec::new()
            }
        }
    }

    pub fn count_rows(&self, topic: &str) -> usize {
        let result = self.connect().and_then(|conn| {
            let topic = resolve_topic(&conn, topic)?;
            let count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", quote_ident(&topic)),
                [],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as usize)
        });
        result.unwrap_or_else(|err| {
            warn!("failed counting rows of {topic}: {err}");
            0
        })
    }
}

pub(crate) fn query_topics(conn: &Connection) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare(
        r#"
SELECT name
FROM sqlite_master
WHERE type = 'table' AND name != ?1 AND name NOT LIKE 'sqlite\_%' ESCAPE '\'
ORDER BY name
"#,
    )?;
    let topics = stmt
        .query_map(params![UPDATE_LOG_TABLE], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(topics)
}

/// Returns the topic name only if it is one of the existing topic tables.
pub(crate) fn resolve_topic(conn: &Connection, topic: &str) -> StoreResult<String> {
    if query_topics(conn)?.iter().any(|known| known == topic) {
        Ok(topic.to_string())
    } else {
        Err(StoreError::UnknownTopic(topic.to_string()))
    }
}

fn query_schema(conn: &Connection, topic: &str) -> StoreResult<Vec<ColumnInfo>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(topic)))?;
    let columns = stmt
        .query_map([], |row| {
            Ok(ColumnInfo {
                name: row.get(1)?,
                declared_type: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(columns)
}

fn order_clause(
    topic: &str,
    schema: &[ColumnInfo],
    sort_column: &str,
    order: SortOrder,
) -> StoreResult<String> {
    if !schema.iter().any(|column| column.name == sort_column) {
        return Err(StoreError::UnknownColumn {
            topic: topic.to_string(),
            column: sort_column.to_string(),
        });
    }
    Ok(format!("ORDER BY {} {}", quote_ident(sort_column), order.as_sql()))
}

fn collect_rows<P: rusqlite::Params>(
    stmt: &mut rusqlite::Statement<'_>,
    params: P,
) -> StoreResult<Vec<RowMap>> {
    let names = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let mut rows = stmt.query(params)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut map = RowMap::new();
        for (idx, name) in names.iter().enumerate() {
            map.insert(name.clone(), to_json(row.get_ref(idx)?));
        }
        out.push(map);
    }
    Ok(out)
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
