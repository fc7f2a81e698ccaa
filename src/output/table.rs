use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::output::json::cell_text;
use crate::store::{ColumnInfo, TablePage, TopicSummary};

pub fn render_topics_table(summaries: &[TopicSummary]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Topic", "Videos", "Last Update", "Refresh"]);

    for s in summaries {
        let refresh_cell = if s.can_refresh {
            Cell::new("READY").fg(Color::Green)
        } else {
            Cell::new("COOLING").fg(Color::Yellow)
        };
        table.add_row(Row::from(vec![
            Cell::new(&s.name),
            Cell::new(s.count),
            Cell::new(&s.last_update),
            refresh_cell,
        ]));
    }
    table.to_string()
}

pub fn render_page_table(columns: &[ColumnInfo], page: &TablePage) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    let mut header = vec!["#".to_string()];
    header.extend(columns.iter().map(|c| c.name.clone()));
    table.set_header(header);

    let first_rank = page.page.saturating_sub(1).saturating_mul(page.per_page);
    for (idx, row) in page.rows.iter().enumerate() {
        let mut cells = vec![first_rank.saturating_add(idx + 1).to_string()];
        cells.extend(columns.iter().map(|c| cell_text(row.get(&c.name))));
        table.add_row(cells);
    }
    format!(
        "{table}\npage {}/{} ({} rows)",
        page.page, page.total_pages, page.total_count
    )
}
