use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use crate_digger::app::ports::{HttpClientPort, PageFetcherPort};
use crate_digger::app::{BatchPriceCollector, ListingPriceService, ReleaseResolver};
use crate_digger::common::types::ReleaseQuery;
use crate_digger::config::Config;
use crate_digger::infra::catalog_api::CatalogApiClient;
use crate_digger::infra::http_client::ReqwestHttp;
use crate_digger::infra::page_fetch::{DirectPageFetcher, ProxyPageFetcher};
use crate_digger::infra::price_store::SqlitePriceStore;
use crate_digger::matching::{catalog_variants, release_id_from_reference, MatchSelector};
use crate_digger::observability::init_logging;
use crate_digger::pricing::{ListingFilter, PricingFallbackOrchestrator, PricingReport};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "crate_digger")]
#[command(about = "Resolve scanned records to catalog releases and collect market prices")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the catalog release for artist/title/catalog number text
    Resolve {
        #[arg(long)]
        artist: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        catno: Option<String>,
    },
    /// Collect price statistics for one release (id, release URL or [r123] reference)
    Price { release: String },
    /// Collect prices for several releases, one after another
    Batch {
        /// Release ids or references, comma-separated
        #[arg(long, value_delimiter = ',')]
        releases: Vec<String>,
    },
    /// Condition-filtered statistics from marketplace listings
    Listings {
        release: String,
        /// Requested media grade, e.g. "VG+"
        #[arg(long, default_value = "")]
        condition: String,
        #[arg(long)]
        sleeve: Option<String>,
        /// Add shipping to each listing price (overrides config)
        #[arg(long)]
        include_shipping: bool,
    },
    /// Print the catalog number variants used for searching
    Variants { catno: String },
}

struct Services {
    config: Config,
    http: Arc<dyn HttpClientPort>,
    catalog: Arc<CatalogApiClient>,
}

impl Services {
    fn build(config: Config) -> anyhow::Result<Self> {
        let http: Arc<dyn HttpClientPort> = Arc::new(ReqwestHttp::new(&config.catalog)?);
        let catalog = Arc::new(CatalogApiClient::new(
            http.clone(),
            &config.catalog,
            config.pricing.listings_per_page,
        ));
        Ok(Self {
            config,
            http,
            catalog,
        })
    }

    fn orchestrator(&self) -> anyhow::Result<PricingFallbackOrchestrator> {
        let store = Arc::new(
            SqlitePriceStore::open(&self.config.storage.db_path)
                .with_context(|| format!("opening price store {}", self.config.storage.db_path))?,
        );
        let proxy = ProxyPageFetcher::from_config(self.http.clone(), &self.config.proxy)
            .map(|p| Arc::new(p) as Arc<dyn PageFetcherPort>);
        Ok(PricingFallbackOrchestrator::new(
            Arc::new(DirectPageFetcher::new(self.http.clone())),
            proxy,
            self.catalog.clone(),
            store.clone(),
            store,
            &self.config.catalog,
            &self.config.pricing,
        ))
    }
}

fn parse_release(reference: &str) -> anyhow::Result<u64> {
    match release_id_from_reference(reference) {
        Some(id) => Ok(id),
        None => bail!("not a release id or release URL: {}", reference),
    }
}

fn report_json(report: &PricingReport) -> Value {
    json!({
        "releaseId": report.release_id,
        "skipped": report.is_skipped(),
        "price": report.price_report(),
        "trail": report.trail,
        "sessionId": report.session_id,
        "error": report.error().map(|e| e.to_string()),
        "persistenceError": report.persistence_error,
    })
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;
    let _guard = init_logging(&config.logging);

    match cli.command {
        Commands::Resolve {
            artist,
            title,
            catno,
        } => {
            let query = ReleaseQuery {
                artist,
                title,
                catalog_number: catno,
            };
            if query.is_empty() {
                bail!("give at least one of --artist, --title or --catno");
            }
            let services = Services::build(config)?;
            let selector = MatchSelector::new(&services.config.matching, &services.config.catalog);
            let resolver = ReleaseResolver::new(services.catalog.clone(), selector);
            let result = resolver.resolve(&query).await?;
            info!("Resolution finished: {:?}", result.as_ref().map(|r| r.external_id));
            print_json(&json!(result))?;
        }
        Commands::Price { release } => {
            let release_id = parse_release(&release)?;
            let services = Services::build(config)?;
            let report = services.orchestrator()?.collect(release_id).await;
            if let Some(e) = report.error() {
                error!("Pricing release {} failed: {}", release_id, e);
            }
            print_json(&report_json(&report))?;
        }
        Commands::Batch { releases } => {
            let ids = releases
                .iter()
                .map(|r| parse_release(r))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let services = Services::build(config)?;
            let collector = BatchPriceCollector::new(
                Arc::new(services.orchestrator()?),
                &services.config.pricing,
            );
            let (reports, summary) = collector.collect(&ids).await;
            print_json(&json!({
                "requested": summary.requested,
                "processed": summary.processed,
                "done": summary.done,
                "skipped": summary.skipped,
                "failed": summary.failed,
                "results": reports.iter().map(report_json).collect::<Vec<_>>(),
            }))?;
        }
        Commands::Listings {
            release,
            condition,
            sleeve,
            include_shipping,
        } => {
            let release_id = parse_release(&release)?;
            let services = Services::build(config)?;
            let mut filter = ListingFilter::new(condition).including_shipping(
                include_shipping || services.config.pricing.include_shipping,
            );
            if let Some(sleeve) = sleeve {
                filter = filter.with_sleeve_condition(sleeve);
            }
            let service = ListingPriceService::new(
                services.catalog.clone(),
                services.config.pricing.max_listing_pages,
            );
            let stats = service.condition_statistics(release_id, &filter).await?;
            print_json(&json!(stats))?;
        }
        Commands::Variants { catno } => {
            print_json(&json!(catalog_variants(&catno)))?;
        }
    }
    Ok(())
}
