use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use vambe_metrics::api::sequence::LatestSlot;
use vambe_metrics::api::{BackendClient, BasicMetrics, CacheStatus};
use vambe_metrics::config::Config;
use vambe_metrics::error::Error;
use vambe_metrics::llm::{LlmClient, Provider};
use vambe_metrics::metrics::filter::select;
use vambe_metrics::metrics::normalize::parse_client_document;
use vambe_metrics::metrics::summary::{overview, vendor_summaries};
use vambe_metrics::metrics::timeseries::observed_series;
use vambe_metrics::metrics::{
    CategorizedClient, ClientFilter, Dimension, MonthKey, QueryOptions, SortBy,
    average_conversion, build_bundle, facets, normalize_values, query, vendor_breakdown,
};
use vambe_metrics::output;
use vambe_metrics::recommend::{KeywordClassifier, LlmClassifier, recommend};

#[derive(Parser)]
#[command(
    name = "vambe-metrics",
    about = "Sales metrics over categorized client meetings: breakdowns, trends and vendor recommendations"
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

/// Where client records come from.
#[derive(Args)]
struct DataArgs {
    /// Only count clients dated in this month (YYYY-MM)
    #[arg(long)]
    month: Option<MonthKey>,

    /// Ask the backend to recategorize instead of serving its cache
    #[arg(long)]
    force_refresh: bool,

    /// Read categorized clients from a local JSON file instead of the backend
    #[arg(long)]
    input: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Totals and per-vendor conversion
    Overview {
        #[arg(long)]
        month: Option<MonthKey>,

        /// Compute from a local JSON file instead of the backend
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Full metrics bundle, or one dimension's buckets
    Metrics {
        #[command(flatten)]
        data: DataArgs,

        /// Group by a single dimension
        #[arg(long, value_enum)]
        dimension: Option<Dimension>,

        #[arg(long)]
        vendor: Option<String>,

        #[arg(long)]
        industry: Option<String>,

        /// Drop buckets with fewer clients
        #[arg(long, default_value_t = 0)]
        min_count: usize,

        /// Keep buckets whose label contains this text
        #[arg(long, default_value = "")]
        search: String,

        #[arg(long, value_enum)]
        sort: Option<SortBy>,

        /// Keep at most this many buckets (bundle: industries, channels, pain points)
        #[arg(long)]
        limit: Option<usize>,

        /// Time series from the first to the last observed month instead of the target year
        #[arg(long)]
        observed: bool,
    },

    /// Filtered client list
    Clients {
        #[command(flatten)]
        data: DataArgs,

        /// Matches name, email or vendor
        #[arg(long, default_value = "")]
        search: String,

        #[arg(long, default_value = "")]
        name: String,

        #[arg(long, default_value = "")]
        email: String,

        #[arg(long)]
        vendor: Option<String>,

        #[arg(long)]
        industry: Option<String>,

        /// Print the distinct industries and vendors instead of clients
        #[arg(long)]
        facets: bool,
    },

    /// Render the HTML dashboard
    Report {
        #[command(flatten)]
        data: DataArgs,

        /// Output path for the HTML report
        #[arg(short, long, default_value = "metrics-report.html")]
        output: PathBuf,
    },

    /// Rank vendors for a prospective client
    Recommend {
        /// Free-text description of the client
        description: String,

        /// Let the backend classify and rank
        #[arg(long, conflicts_with = "offline")]
        remote: bool,

        /// Classify by keyword match instead of calling the LLM
        #[arg(long)]
        offline: bool,

        /// Read historical clients from a local JSON file
        #[arg(long)]
        input: Option<PathBuf>,

        /// LLM provider override: anthropic, openrouter, openai
        #[arg(long)]
        provider: Option<String>,

        /// LLM model override
        #[arg(long)]
        model: Option<String>,
    },

    /// Backend categorization cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// How many clients have a cached categorization
    Status {
        /// Keep polling every `dashboard.cache_poll_secs`
        #[arg(long)]
        watch: bool,
    },
    /// Drop every cached categorization
    Clear,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("vambe_metrics=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenvy::from_path("../.env").ok();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        if e.downcast_ref::<Error>().is_some_and(Error::is_retryable) {
            eprintln!("hint: the backend may be unavailable; retry the command in a moment");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut cfg = Config::load_or_default(&cli.config)?;
    cfg.validate()?;
    let backend = BackendClient::new(&cfg.api)?;

    match cli.command {
        Command::Overview { month, input } => {
            let basic = match input {
                Some(path) => {
                    let clients = load_local(&path)?;
                    let scoped = select(&clients, &QueryOptions::for_month(month));
                    BasicMetrics {
                        overview: overview(scoped.iter().copied()),
                        by_vendor: vendor_summaries(scoped.iter().copied()),
                    }
                }
                None => backend.basic_metrics(month).await?,
            };
            print_json(&basic)
        }
        Command::Metrics {
            data,
            dimension,
            vendor,
            industry,
            min_count,
            search,
            sort,
            limit,
            observed,
        } => {
            let clients = load_clients(&backend, &data).await?;
            let options = QueryOptions {
                month: data.month,
                vendor: vendor.into(),
                industry: industry.into(),
                min_count,
                search_text: search,
                sort_by: sort.or(Some(cfg.dashboard.default_sort)),
                limit,
            };
            match dimension {
                Some(dim) => {
                    let per_vendor = options.vendor.as_value().is_some() && dim != Dimension::Vendor;
                    let buckets = if per_vendor {
                        let mut buckets = vendor_breakdown(&clients, dim, &options);
                        if dim == Dimension::Industry {
                            buckets.truncate(cfg.dashboard.top_industries);
                        }
                        buckets
                    } else {
                        query(&clients, dim, &options)
                    };
                    info!(
                        dimension = %dim,
                        buckets = buckets.len(),
                        average_conversion = average_conversion(&buckets),
                        "dimension query"
                    );
                    print_json(&buckets)
                }
                None if observed => {
                    let scoped: Vec<CategorizedClient> =
                        select(&clients, &options).into_iter().cloned().collect();
                    print_json(&observed_series(&scoped))
                }
                None => print_json(&build_bundle(&clients, &options, cfg.dashboard.target_year)),
            }
        }
        Command::Clients {
            data,
            search,
            name,
            email,
            vendor,
            industry,
            facets: show_facets,
        } => {
            let clients = load_clients(&backend, &data).await?;
            if show_facets {
                return print_json(&facets(&clients));
            }
            let filter = ClientFilter {
                search,
                name,
                email,
                industry: industry.into(),
                vendor: vendor.into(),
                month: data.month,
            };
            print_json(&filter.apply(&clients))
        }
        Command::Report { data, output } => {
            let clients = load_clients(&backend, &data).await?;
            let options = QueryOptions {
                sort_by: Some(cfg.dashboard.default_sort),
                ..QueryOptions::for_month(data.month)
            };
            let bundle = build_bundle(&clients, &options, cfg.dashboard.target_year);
            let listed = ClientFilter {
                month: data.month,
                ..ClientFilter::default()
            }
            .apply(&clients);
            let html = output::render_dashboard(&bundle, &listed, &options)?;
            write_report(&output, &html)?;
            println!(
                "Report rendered: {} ({} clients, {} vendors)",
                output.display(),
                bundle.overview.total_clients,
                bundle.by_vendor.len()
            );
            Ok(())
        }
        Command::Recommend {
            description,
            remote,
            offline,
            input,
            provider,
            model,
        } => {
            let result = if remote {
                backend.recommend(&description).await?
            } else {
                let data = DataArgs {
                    month: None,
                    force_refresh: false,
                    input,
                };
                let clients = load_clients(&backend, &data).await?;
                if offline {
                    recommend(&KeywordClassifier, &description, &clients).await?
                } else {
                    if let Some(p) = provider {
                        cfg.llm.provider = p.parse::<Provider>()?;
                    }
                    if let Some(m) = model {
                        cfg.llm.model = m;
                    }
                    let classifier = LlmClassifier::new(LlmClient::from_config(&cfg.llm)?);
                    recommend(&classifier, &description, &clients).await?
                }
            };
            if result.vendors.is_empty() {
                eprintln!(
                    "No historical clients in industry {:?}; nothing to rank.",
                    result.industry
                );
            }
            print_json(&result)
        }
        Command::Cache { action } => match action {
            CacheAction::Status { watch: false } => print_json(&backend.cache_status().await?),
            CacheAction::Status { watch: true } => {
                watch_cache(backend, Duration::from_secs(cfg.dashboard.cache_poll_secs)).await
            }
            CacheAction::Clear => {
                backend.clear_cache().await?;
                println!("Cache cleared.");
                Ok(())
            }
        },
    }
}

async fn load_clients(backend: &BackendClient, data: &DataArgs) -> Result<Vec<CategorizedClient>> {
    match &data.input {
        Some(path) => load_local(path),
        None => {
            let payload = backend
                .advanced_metrics(data.force_refresh, data.month)
                .await?;
            let batch = normalize_values(&payload.categorized_clients);
            if !batch.issues.is_empty() {
                warn!(issues = batch.issues.len(), "some backend records were malformed");
            }
            Ok(batch.clients)
        }
    }
}

fn load_local(path: &Path) -> Result<Vec<CategorizedClient>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let batch = normalize_values(&parse_client_document(&text)?);
    info!(
        path = %path.display(),
        clients = batch.clients.len(),
        dated = batch.dated_count(),
        issues = batch.issues.len(),
        "loaded local clients"
    );
    Ok(batch.clients)
}

/// Poll the cache status until interrupted. Polls may overlap on a slow
/// backend; only the newest one's answer is printed.
async fn watch_cache(backend: BackendClient, every: Duration) -> Result<()> {
    let slot: Arc<LatestSlot<CacheStatus>> = Arc::new(LatestSlot::new());
    let mut ticker = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let token = slot.issue();
                let backend = backend.clone();
                let slot = Arc::clone(&slot);
                tokio::spawn(async move {
                    match backend.cache_status().await {
                        Ok(status) => {
                            if slot.complete(token, status.clone()) {
                                println!(
                                    "cached {}/{} ({:.1}%), last updated {}",
                                    status.cached,
                                    status.total,
                                    status.coverage(),
                                    status
                                        .last_updated
                                        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                                        .unwrap_or_else(|| "never".into())
                                );
                            }
                        }
                        Err(e) => warn!(seq = token.seq(), "cache status poll failed: {e}"),
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("stopped watching cache");
                return Ok(());
            }
        }
    }
}

fn write_report(path: &Path, html: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)?;
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
