use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use topicboard::config::{Config, ConfigOverrides};
use topicboard::ingest::{BilibiliSearch, SearchSource};
use topicboard::output::csv::{rows_to_csv, summaries_to_csv};
use topicboard::output::json::render_json;
use topicboard::output::table::{render_page_table, render_topics_table};
use topicboard::refresh::{refresh_topic, RefreshLeases, RefreshOutcome};
use topicboard::server::{run_server, PAGE_SIZE};
use topicboard::store::{SortOrder, TablePage, TopicStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "topicboard",
    about = "Scrape ranked video search results per topic and browse them"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    db: Option<String>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    CreateTopic {
        #[arg(required = true)]
        names: Vec<String>,
    },
    Refresh {
        topic: String,
    },
    Topics,
    Show {
        topic: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        search: Option<String>,
        #[arg(long = "sort-by", default_value = "score")]
        sort_by: String,
        #[arg(long, default_value = "DESC")]
        order: SortOrder,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(config_path.as_path()))?;
    let (host, port) = match &cli.command {
        Commands::Serve { host, port } => (host.clone(), *port),
        _ => (None, None),
    };
    config.apply_overrides(ConfigOverrides {
        db_path: cli.db.clone(),
        host,
        port,
    });

    if let Commands::Config { init, show } = &cli.command {
        return handle_config_command(*init, *show, &config, &config_path);
    }
    if matches!(cli.command, Commands::Serve { .. }) {
        let bind = format!("{}:{}", config.server.host, config.server.port);
        let addr: SocketAddr = bind
            .parse()
            .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
        return run_server(config, addr).await;
    }

    let store = TopicStore::open(&config.resolved_db_path())?;

    match &cli.command {
        Commands::CreateTopic { names } => {
            for name in names {
                store.create_topic(name)?;
                println!("created topic {name}");
            }
        }
        Commands::Refresh { topic } => {
            if !store.has_topic(topic) {
                return Err(anyhow!(
                    "unknown topic {topic}; provision it with `create-topic` first"
                ));
            }
            let source: Arc<dyn SearchSource> = Arc::new(BilibiliSearch::new(&config.search)?);
            let outcome =
                refresh_topic(&store, source.as_ref(), &RefreshLeases::default(), topic).await?;
            match outcome {
                RefreshOutcome::Refreshed {
                    fetched,
                    merged,
                    update_count,
                } => println!(
                    "refreshed {topic}: {fetched} fetched, {merged} merged (refresh #{update_count})"
                ),
                RefreshOutcome::Cooling(status) => println!("{topic} is cooling down: {status}"),
                RefreshOutcome::InProgress => println!("{topic} is already being refreshed"),
            }
        }
        Commands::Topics => {
            let summaries = store.summaries();
            match cli.output {
                OutputFormat::Table => println!("{}", render_topics_table(&summaries)),
                OutputFormat::Json => println!("{}", render_json(&summaries)?),
                OutputFormat::Csv => print!("{}", summaries_to_csv(&summaries)?),
            }
        }
        Commands::Show {
            topic,
            page,
            search,
            sort_by,
            order,
        } => {
            if !store.has_topic(topic) {
                return Err(anyhow!("unknown topic {topic}"));
            }
            let result = load_page(&store, topic, *page, search.as_deref(), sort_by, *order);
            let columns = store.describe_schema(topic);
            match cli.output {
                OutputFormat::Table => println!("{}", render_page_table(&columns, &result)),
                OutputFormat::Json => println!("{}", render_json(&result)?),
                OutputFormat::Csv => print!("{}", rows_to_csv(&columns, &result.rows)?),
            }
        }
        Commands::Config { .. } => {}
        Commands::Serve { .. } => unreachable!("serve command handled before dispatch"),
    }

    Ok(())
}

fn handle_config_command(init: bool, show: bool, config: &Config, config_path: &Path) -> Result<()> {
    if init {
        Config::write_template(config_path)?;
        info!("wrote config template to {}", config_path.display());
        println!("Wrote config template to {}", config_path.display());
    }
    if show || !init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

fn load_page(
    store: &TopicStore,
    topic: &str,
    page: usize,
    search: Option<&str>,
    sort_by: &str,
    order: SortOrder,
) -> TablePage {
    match search.filter(|term| !term.is_empty()) {
        None => store.fetch_page(topic, page, PAGE_SIZE, sort_by, order),
        Some(term) => {
            TablePage::paginate(store.search_rows(topic, term, sort_by, order), page, PAGE_SIZE)
        }
    }
}
