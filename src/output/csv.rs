use anyhow::Result;

use crate::output::json::cell_text;
use crate::store::{ColumnInfo, RowMap, TopicSummary};

pub fn summaries_to_csv(summaries: &[TopicSummary]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["topic", "count", "last_update", "can_refresh"])?;
    for summary in summaries {
        writer.write_record([
            summary.name.clone(),
            summary.count.to_string(),
            summary.last_update.clone(),
            summary.can_refresh.to_string(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn rows_to_csv(columns: &[ColumnInfo], rows: &[RowMap]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(columns.iter().map(|c| c.name.as_str()))?;
    for row in rows {
        writer.write_record(columns.iter().map(|c| cell_text(row.get(&c.name))))?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}
