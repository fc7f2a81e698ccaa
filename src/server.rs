use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::config::Config;
use crate::ingest::{BilibiliSearch, SearchSource};
use crate::output::html::{
    render_index, render_not_found, render_stats, render_table, table_path, Notice, NoticeLevel,
    TableView,
};
use crate::refresh::{refresh_topic, RefreshLeases, RefreshOutcome};
use crate::store::{RowMap, SortOrder, TablePage, TopicStore};

pub const PAGE_SIZE: usize = 20;
pub const DEFAULT_API_LIMIT: usize = 100;
const DEFAULT_SORT_COLUMN: &str = "score";

#[derive(Clone)]
pub struct AppState {
    store: TopicStore,
    source: Arc<dyn SearchSource>,
    leases: RefreshLeases,
}

impl AppState {
    pub fn new(store: TopicStore, source: Arc<dyn SearchSource>) -> Self {
        Self {
            store,
            source,
            leases: RefreshLeases::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            ok: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TableQuery {
    page: Option<String>,
    search: Option<String>,
    sort_by: Option<String>,
    order: Option<String>,
    flash: Option<String>,
    level: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ApiTableQuery {
    limit: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiTableResponse {
    table_name: String,
    data: Vec<RowMap>,
    count: usize,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/stats", get(stats))
        .route("/health", get(health))
        .route("/table/:topic", get(show_table))
        .route("/update/:topic", post(update_table))
        .route("/api/table/:topic", get(api_table))
        .layer(cors)
        .with_state(state)
}

pub async fn run_server(config: Config, bind: SocketAddr) -> Result<()> {
    let store = TopicStore::open(&config.resolved_db_path())?;
    info!("using topic database {}", store.path().display());
    for topic in &config.topics.seed {
        if let Err(err) = store.create_topic(topic) {
            warn!("failed provisioning topic {topic}: {err}");
        }
    }
    let source: Arc<dyn SearchSource> = Arc::new(BilibiliSearch::new(&config.search)?);
    let app = build_router(AppState::new(store, source));

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("topic board listening on http://{bind}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("topic board stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed listening for shutdown signal: {err}");
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render_index(&state.store.summaries()))
}

async fn stats(State(state): State<AppState>) -> Html<String> {
    Html(render_stats(&state.store.summaries()))
}

async fn show_table(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    Query(query): Query<TableQuery>,
) -> Response {
    if !state.store.has_topic(&topic) {
        return not_found(&topic);
    }
    let page = parse_or(query.page.as_deref(), 1usize).max(1);
    let search = query.search.unwrap_or_default();
    let sort_by = query
        .sort_by
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SORT_COLUMN.to_string());
    let order = parse_or(query.order.as_deref(), SortOrder::Desc);

    let result = if search.is_empty() {
        state
            .store
            .fetch_page(&topic, page, PAGE_SIZE, &sort_by, order)
    } else {
        TablePage::paginate(
            state.store.search_rows(&topic, &search, &sort_by, order),
            page,
            PAGE_SIZE,
        )
    };

    let summary = state.store.summarize(&topic);
    let notice = query.flash.filter(|m| !m.is_empty()).map(|message| Notice {
        level: parse_or(query.level.as_deref(), NoticeLevel::Info),
        message,
    });
    let view = TableView {
        columns: state.store.describe_schema(&topic),
        rows: result.rows,
        page,
        per_page: PAGE_SIZE,
        total_pages: result.total_pages,
        total_count: result.total_count,
        search,
        sort_by,
        order,
        last_update: summary.last_update,
        can_refresh: summary.can_refresh,
        notice,
        topic,
    };
    Html(render_table(&view)).into_response()
}

async fn update_table(State(state): State<AppState>, Path(topic): Path<String>) -> Response {
    if !state.store.has_topic(&topic) {
        return not_found(&topic);
    }
    let outcome = refresh_topic(&state.store, state.source.as_ref(), &state.leases, &topic).await;
    let (level, message) = match outcome {
        Ok(RefreshOutcome::Refreshed { fetched, .. }) => (
            NoticeLevel::Success,
            format!("topic \"{topic}\" refreshed, {fetched} videos fetched"),
        ),
        Ok(RefreshOutcome::Cooling(status)) => (
            NoticeLevel::Warning,
            format!("topic \"{topic}\" was refreshed less than 3 hours ago, try again later. {status}"),
        ),
        Ok(RefreshOutcome::InProgress) => (
            NoticeLevel::Warning,
            format!("a refresh of \"{topic}\" is already running"),
        ),
        Err(err) => {
            warn!("refresh of {topic} failed: {err:#}");
            (
                NoticeLevel::Danger,
                format!("failed refreshing \"{topic}\": {err:#}"),
            )
        }
    };
    let target = format!(
        "{}?flash={}&level={}",
        table_path(&topic),
        urlencoding::encode(&message),
        level.as_str()
    );
    Redirect::to(&target).into_response()
}

async fn api_table(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    Query(query): Query<ApiTableQuery>,
) -> std::result::Result<Json<ApiTableResponse>, ApiError> {
    let limit = match query.limit.as_deref() {
        None | Some("") => DEFAULT_API_LIMIT,
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map_err(|_| ApiError::bad_request(format!("invalid limit: {raw}")))?,
    };
    let data = state.store.fetch_rows(&topic, limit);
    Ok(Json(ApiTableResponse {
        table_name: topic,
        count: data.len(),
        data,
    }))
}

fn not_found(topic: &str) -> Response {
    (StatusCode::NOT_FOUND, Html(render_not_found(topic))).into_response()
}

fn parse_or<T: std::str::FromStr>(raw: Option<&str>, default: T) -> T {
    raw.and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
