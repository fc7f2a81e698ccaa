//! Server-rendered HTML for the browsing pages. Kept dependency-free: every
//! dynamic value goes through [`escape`] and every URL piece through
//! `urlencoding`.

use std::fmt::Write as _;
use std::str::FromStr;

use crate::output::json::cell_text;
use crate::store::{ColumnInfo, RowMap, SortOrder, TopicSummary};

const MAX_PAGE_LINKS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Danger,
}

impl NoticeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Danger => "danger",
        }
    }
}

impl FromStr for NoticeLevel {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "success" => Self::Success,
            "warning" => Self::Warning,
            "danger" => Self::Danger,
            _ => Self::Info,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLink {
    Page(usize),
    Gap,
}

#[derive(Debug, Clone)]
pub struct TableView {
    pub topic: String,
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<RowMap>,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
    pub total_count: usize,
    pub search: String,
    pub sort_by: String,
    pub order: SortOrder,
    pub last_update: String,
    pub can_refresh: bool,
    pub notice: Option<Notice>,
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Compact pager: first and last page always shown, gaps collapsed.
pub fn page_range(current: usize, total: usize) -> Vec<PageLink> {
    let max = MAX_PAGE_LINKS;
    if total <= max {
        return (1..=total).map(PageLink::Page).collect();
    }
    let mut links = Vec::with_capacity(max);
    if current <= max - 2 {
        links.extend((1..max).map(PageLink::Page));
        links.push(PageLink::Gap);
        links.push(PageLink::Page(total));
    } else if current >= total - (max - 3) {
        links.push(PageLink::Page(1));
        links.push(PageLink::Gap);
        links.extend((total - (max - 2)..=total).map(PageLink::Page));
    } else {
        let half = (max - 4) / 2;
        links.push(PageLink::Page(1));
        links.push(PageLink::Gap);
        links.extend((current - half..=current + half).map(PageLink::Page));
        links.push(PageLink::Gap);
        links.push(PageLink::Page(total));
    }
    links
}

pub fn table_path(topic: &str) -> String {
    format!("/table/{}", urlencoding::encode(topic))
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; margin: 2rem; }}
table {{ border-collapse: collapse; }}
th, td {{ border: 1px solid #ccc; padding: 0.3rem 0.6rem; }}
.notice {{ padding: 0.5rem 1rem; margin-bottom: 1rem; }}
.success {{ background: #d4edda; }} .info {{ background: #d1ecf1; }}
.warning {{ background: #fff3cd; }} .danger {{ background: #f8d7da; }}
.pager a, .pager span {{ margin-right: 0.4rem; }}
</style>
</head>
<body>
<nav><a href="/">Topics</a> | <a href="/stats">Stats</a></nav>
{body}
</body>
</html>
"#,
        title = escape(title),
        body = body
    )
}

pub fn render_index(summaries: &[TopicSummary]) -> String {
    let mut body = String::from("<h1>Topics</h1>\n");
    if summaries.is_empty() {
        body.push_str("<p>No topics provisioned yet.</p>\n");
        return layout("Topics", &body);
    }
    body.push_str("<table>\n<tr><th>Topic</th><th>Videos</th><th>Last update</th><th></th></tr>\n");
    for s in summaries {
        let action = if s.can_refresh {
            refresh_form(&s.name)
        } else {
            "<span>cooling down</span>".to_string()
        };
        let _ = writeln!(
            body,
            r#"<tr><td><a href="{href}">{name}</a></td><td>{count}</td><td>{status}</td><td>{action}</td></tr>"#,
            href = escape(&table_path(&s.name)),
            name = escape(&s.name),
            count = s.count,
            status = escape(&s.last_update),
        );
    }
    body.push_str("</table>\n");
    layout("Topics", &body)
}

pub fn render_stats(summaries: &[TopicSummary]) -> String {
    let total: usize = summaries.iter().map(|s| s.count).sum();
    let mut body = format!(
        "<h1>Stats</h1>\n<p>{} topics, {} videos</p>\n<table>\n<tr><th>Topic</th><th>Videos</th><th>Last update</th><th>Refreshable</th></tr>\n",
        summaries.len(),
        total
    );
    for s in summaries {
        let _ = writeln!(
            body,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&s.name),
            s.count,
            escape(&s.last_update),
            if s.can_refresh { "yes" } else { "no" }
        );
    }
    body.push_str("</table>\n");
    layout("Stats", &body)
}

pub fn render_table(view: &TableView) -> String {
    let mut body = format!("<h1>{}</h1>\n", escape(&view.topic));
    if let Some(notice) = &view.notice {
        let _ = writeln!(
            body,
            r#"<div class="notice {}">{}</div>"#,
            notice.level.as_str(),
            escape(&notice.message)
        );
    }
    let _ = writeln!(
        body,
        "<p>{} videos. {}</p>",
        view.total_count,
        escape(&view.last_update)
    );
    if view.can_refresh {
        body.push_str(&refresh_form(&view.topic));
        body.push('\n');
    }
    let _ = writeln!(
        body,
        r#"<form method="get" action="{action}"><input type="text" name="search" value="{search}"><input type="hidden" name="sort_by" value="{sort_by}"><input type="hidden" name="order" value="{order}"><button type="submit">Search</button></form>"#,
        action = escape(&table_path(&view.topic)),
        search = escape(&view.search),
        sort_by = escape(&view.sort_by),
        order = view.order,
    );

    body.push_str("<table>\n<tr><th>#</th>");
    for column in &view.columns {
        let next_order = if column.name == view.sort_by {
            view.order.flipped()
        } else {
            SortOrder::Desc
        };
        let href = view_href(view, 1, &column.name, next_order);
        let marker = match (column.name == view.sort_by, view.order) {
            (true, SortOrder::Asc) => " &#9650;",
            (true, SortOrder::Desc) => " &#9660;",
            _ => "",
        };
        let _ = write!(
            body,
            r#"<th><a href="{}">{}</a>{marker}</th>"#,
            escape(&href),
            escape(&column.name)
        );
    }
    body.push_str("</tr>\n");

    let first_rank = view.page.saturating_sub(1).saturating_mul(view.per_page);
    for (idx, row) in view.rows.iter().enumerate() {
        let _ = write!(body, "<tr><td>{}</td>", first_rank.saturating_add(idx + 1));
        for column in &view.columns {
            let _ = write!(body, "<td>{}</td>", escape(&cell_text(row.get(&column.name))));
        }
        body.push_str("</tr>\n");
    }
    body.push_str("</table>\n");

    if view.total_pages > 1 {
        body.push_str(r#"<div class="pager">"#);
        for link in page_range(view.page, view.total_pages) {
            match link {
                PageLink::Gap => body.push_str("<span>&hellip;</span>"),
                PageLink::Page(n) if n == view.page => {
                    let _ = write!(body, "<span><b>{n}</b></span>");
                }
                PageLink::Page(n) => {
                    let href = view_href(view, n, &view.sort_by, view.order);
                    let _ = write!(body, r#"<a href="{}">{n}</a>"#, escape(&href));
                }
            }
        }
        body.push_str("</div>\n");
    }
    layout(&view.topic, &body)
}

pub fn render_not_found(topic: &str) -> String {
    layout(
        "Not found",
        &format!("<h1>Unknown topic</h1>\n<p>{}</p>\n", escape(topic)),
    )
}

fn refresh_form(topic: &str) -> String {
    format!(
        r#"<form method="post" action="/update/{}"><button type="submit">Refresh</button></form>"#,
        escape(&urlencoding::encode(topic))
    )
}

fn view_href(view: &TableView, page: usize, sort_by: &str, order: SortOrder) -> String {
    let mut href = format!(
        "{}?page={page}&sort_by={}&order={order}",
        table_path(&view.topic),
        urlencoding::encode(sort_by)
    );
    if !view.search.is_empty() {
        href.push_str("&search=");
        href.push_str(&urlencoding::encode(&view.search));
    }
    href
}
