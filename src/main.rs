use anyhow::{bail, Context};
use bundle_tracker::{
    config::AppConfig,
    models::{Bundle, GenerationJob, JobState},
    services::{
        bundle_service::HttpBundleService,
        catalog::{CatalogBrowser, CatalogSource, ALL_CATEGORIES},
        tracker::GenerationTracker,
    },
};
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bundle-tracker", version, about = "Request, track and browse CodeGraphContext bundles")]
struct Cli {
    /// Bundle service base URL (overrides BUNDLE_SERVICE_URL)
    #[arg(long, global = true)]
    service_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a bundle for a repository and wait until it is published
    Generate {
        /// Repository as owner/name or a GitHub URL
        repository: String,
    },
    /// Search the bundle catalog
    Search {
        /// Text matched against name, repository and description
        #[arg(default_value = "")]
        query: String,
        /// Exact category, or "all"
        #[arg(long, short, default_value = ALL_CATEGORIES)]
        category: String,
    },
    /// List catalog categories
    Categories,
    /// Download a bundle by full or base name
    Download {
        name: String,
        /// Output file (defaults to the bundle file name)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    // Load configuration from environment
    let mut config = AppConfig::from_env().context("Failed to load configuration from environment")?;
    if let Some(url) = cli.service_url {
        config.service_url = url;
    }

    if let Some(addr) = &config.metrics_addr {
        let addr: SocketAddr = addr
            .parse()
            .with_context(|| format!("Invalid BUNDLE_METRICS_ADDR '{addr}'"))?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus metrics exporter")?;
        tracing::info!(%addr, "Prometheus metrics listener started");
    }
    bundle_tracker::describe_metrics();

    let service = Arc::new(
        HttpBundleService::new(&config.service_url, config.request_timeout())
            .context("Failed to initialize bundle service client")?,
    );
    tracing::debug!(service_url = %config.service_url, "Bundle service client ready");

    match cli.command {
        Command::Generate { repository } => generate(service, &config, &repository).await,
        Command::Search { query, category } => {
            let catalog = load_catalog(service).await;
            let hits = catalog.query(&query, &category);
            if hits.is_empty() {
                println!("No bundles match.");
            }
            for bundle in &hits {
                print_bundle(bundle);
            }
            Ok(())
        }
        Command::Categories => {
            let catalog = load_catalog(service).await;
            for category in catalog.categories() {
                println!("{category}");
            }
            Ok(())
        }
        Command::Download { name, output } => {
            let catalog = load_catalog(Arc::clone(&service)).await;
            let bundle = catalog.resolve(&name)?;
            let path = output.unwrap_or_else(|| PathBuf::from(&bundle.bundle_file_name));
            let written = service.download(&bundle, &path, |_| {}).await?;
            println!("Saved {} ({} bytes) to {}", bundle.full_name(), written, path.display());
            println!("Load it with: {}", bundle.load_command());
            Ok(())
        }
    }
}

async fn generate(
    service: Arc<HttpBundleService>,
    config: &AppConfig,
    repository: &str,
) -> anyhow::Result<()> {
    let tracker = GenerationTracker::with_observer(service, config.tracker(), print_progress);
    tracker.start(repository).await?;

    let job = tokio::select! {
        job = tracker.settled() => job,
        _ = tokio::signal::ctrl_c() => {
            tracker.reset();
            bail!("Interrupted; stopped tracking the generation job");
        }
    };

    match (job.state, &job.bundle, &job.error_detail) {
        (JobState::Ready | JobState::AlreadyExists, Some(bundle), _) => {
            println!("Download: {}", bundle.download_url);
            println!("Load it with: {}", bundle.load_command());
            Ok(())
        }
        (_, _, Some(detail)) => bail!("Bundle generation failed ({}): {}", detail.kind, detail.message),
        (state, _, _) => bail!("Bundle generation ended in unexpected state {state}"),
    }
}

fn print_progress(job: &GenerationJob) {
    match job.state {
        JobState::Idle => {}
        JobState::Validating => {
            if let Some(repo) = &job.repository {
                println!("Requesting bundle for {repo}...");
            }
        }
        JobState::AlreadyExists => println!("A bundle already exists."),
        JobState::Triggered => {
            println!(
                "Generation started (job {}, estimated {}).",
                job.job_id.as_deref().unwrap_or("?"),
                job.estimated_duration.as_deref().unwrap_or("unknown")
            );
            if let Some(url) = &job.job_url {
                println!("Follow along at {url}");
            }
        }
        JobState::Processing => println!("Processing... {}%", job.progress_percent),
        JobState::Ready => println!("Bundle is ready."),
        JobState::Failed => {}
    }
}

async fn load_catalog(service: Arc<HttpBundleService>) -> CatalogBrowser {
    let catalog = CatalogBrowser::new(service);
    catalog.load().await;
    if catalog.source() == CatalogSource::Fallback {
        eprintln!("Bundle service unavailable; showing built-in bundle list.");
    }
    catalog
}

fn print_bundle(bundle: &Bundle) {
    println!(
        "{:<32} {:<28} {:>8}  {}",
        bundle.full_name(),
        bundle.repository,
        bundle.size_label,
        bundle.category.as_deref().unwrap_or("-")
    );
}
