use super::page_inspect::offer_summary;
use super::statistics::PriceStatisticsExtractor;
use crate::app::ports::{FreshnessPort, MarketplaceStatsPort, PageFetcherPort, PriceStorePort};
use crate::common::constants::{PATH_API_FALLBACK, PATH_DIRECT_FETCH, PATH_EXTRACT, PATH_PROXY_FETCH};
use crate::common::error::DiggerError;
use crate::common::types::{
    CollectionSession, MarketplaceStats, PriceRecord, PriceReport, PriceStatistics, SessionState,
    SourcePath,
};
use crate::config::{CatalogConfig, PricingConfig};
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Where a lookup currently stands. `Done` and `Failed` are terminal.
#[derive(Debug)]
enum Stage {
    DirectFetch,
    ProxyFetch,
    Extract { html: String, fetcher: &'static str },
    ApiFallback,
    Done {
        path: SourcePath,
        statistics: PriceStatistics,
    },
    Failed(DiggerError),
}

#[derive(Debug)]
pub enum PricingOutcome {
    /// Collected within the freshness window; nothing was fetched.
    SkippedFresh,
    Done {
        path: SourcePath,
        statistics: PriceStatistics,
    },
    /// Every stage failed; holds the last concrete error.
    Failed(DiggerError),
}

#[derive(Debug)]
pub struct PricingReport {
    pub release_id: u64,
    pub outcome: PricingOutcome,
    /// Session written for this run, `None` for a freshness skip.
    pub session_id: Option<Uuid>,
    pub trail: Vec<String>,
    /// Set when the price record or session could not be stored. The outcome stands.
    pub persistence_error: Option<String>,
}

impl PricingReport {
    pub fn price_report(&self) -> PriceReport {
        match &self.outcome {
            PricingOutcome::Done { path, statistics } => {
                PriceReport::from_statistics(statistics, *path)
            }
            PricingOutcome::SkippedFresh | PricingOutcome::Failed(_) => PriceReport::none(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, PricingOutcome::SkippedFresh)
    }

    pub fn error(&self) -> Option<&DiggerError> {
        match &self.outcome {
            PricingOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Runs the price lookup for one release: direct page fetch, proxy fetch on a
/// block, HTML extraction, and the marketplace API as last resort.
pub struct PricingFallbackOrchestrator {
    direct: Arc<dyn PageFetcherPort>,
    proxy: Option<Arc<dyn PageFetcherPort>>,
    api: Arc<dyn MarketplaceStatsPort>,
    store: Arc<dyn PriceStorePort>,
    freshness: Arc<dyn FreshnessPort>,
    extractor: PriceStatisticsExtractor,
    catalog: CatalogConfig,
    pricing: PricingConfig,
}

impl PricingFallbackOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        direct: Arc<dyn PageFetcherPort>,
        proxy: Option<Arc<dyn PageFetcherPort>>,
        api: Arc<dyn MarketplaceStatsPort>,
        store: Arc<dyn PriceStorePort>,
        freshness: Arc<dyn FreshnessPort>,
        catalog: &CatalogConfig,
        pricing: &PricingConfig,
    ) -> Self {
        Self {
            direct,
            proxy,
            api,
            store,
            freshness,
            extractor: PriceStatisticsExtractor::new(pricing.statistics_window_chars),
            catalog: catalog.clone(),
            pricing: pricing.clone(),
        }
    }

    #[instrument(skip(self))]
    pub async fn collect(&self, release_id: u64) -> PricingReport {
        match self
            .freshness
            .recently_collected(release_id, self.pricing.freshness_window())
            .await
        {
            Ok(true) => {
                info!("Release {} priced within the freshness window, skipping", release_id);
                metrics::pricing_fresh_skip();
                return PricingReport {
                    release_id,
                    outcome: PricingOutcome::SkippedFresh,
                    session_id: None,
                    trail: Vec::new(),
                    persistence_error: None,
                };
            }
            Ok(false) => {}
            Err(e) => warn!("Freshness check failed for release {}: {}", release_id, e),
        }

        let started_at = Utc::now();
        let url = self.catalog.release_url(release_id);
        let mut trail = Vec::new();
        let mut stage = Stage::DirectFetch;
        let outcome = loop {
            stage = match self.step(stage, release_id, &url, &mut trail).await {
                Stage::Done { path, statistics } => {
                    break PricingOutcome::Done { path, statistics }
                }
                Stage::Failed(e) => break PricingOutcome::Failed(e),
                next => next,
            };
        };
        self.finish(release_id, started_at, trail, outcome).await
    }

    async fn step(
        &self,
        stage: Stage,
        release_id: u64,
        url: &str,
        trail: &mut Vec<String>,
    ) -> Stage {
        match stage {
            Stage::DirectFetch => {
                trail.push(PATH_DIRECT_FETCH.to_string());
                match self.direct.fetch_page(url).await {
                    Ok(html) => Stage::Extract {
                        html,
                        fetcher: self.direct.name(),
                    },
                    Err(e) if e.is_blocked() => {
                        warn!("Direct fetch blocked for release {}: {}", release_id, e);
                        metrics::fetch_blocked(self.direct.name());
                        Stage::ProxyFetch
                    }
                    Err(e) => {
                        error!("Direct fetch failed for release {}: {}", release_id, e);
                        Stage::Failed(e)
                    }
                }
            }
            Stage::ProxyFetch => {
                trail.push(PATH_PROXY_FETCH.to_string());
                let Some(proxy) = &self.proxy else {
                    debug!("No proxy configured, going to the API");
                    return Stage::ApiFallback;
                };
                match proxy.fetch_page(url).await {
                    Ok(html) => Stage::Extract {
                        html,
                        fetcher: proxy.name(),
                    },
                    Err(e) => {
                        if e.is_blocked() {
                            metrics::fetch_blocked(proxy.name());
                        }
                        warn!("Proxy fetch failed for release {}: {}", release_id, e);
                        Stage::ApiFallback
                    }
                }
            }
            Stage::Extract { html, fetcher } => {
                trail.push(PATH_EXTRACT.to_string());
                match self.extractor.extract(&html) {
                    Ok(mut statistics) if statistics.has_any_price() => {
                        if let Some(count) = offer_summary(&html).and_then(|s| s.offer_count) {
                            statistics.num_for_sale = count;
                        }
                        metrics::pricing_scraped(fetcher);
                        Stage::Done {
                            path: SourcePath::Scraped,
                            statistics,
                        }
                    }
                    Ok(_) => {
                        debug!("Statistics region for {} has no prices", release_id);
                        Stage::ApiFallback
                    }
                    Err(e) => {
                        debug!("No statistics on page for {}: {}", release_id, e);
                        Stage::ApiFallback
                    }
                }
            }
            Stage::ApiFallback => {
                trail.push(PATH_API_FALLBACK.to_string());
                match self.api.marketplace_stats(release_id).await {
                    // nothing listed: leave no record so the next lookup tries again
                    Ok(stats) if stats.lowest_price.is_none() => {
                        warn!("Marketplace has no lowest price for release {}", release_id);
                        Stage::Failed(DiggerError::Api {
                            message: format!("no marketplace price for release {}", release_id),
                        })
                    }
                    Ok(stats) => {
                        metrics::pricing_api_only();
                        Stage::Done {
                            path: SourcePath::Api,
                            statistics: self.discounted(&stats),
                        }
                    }
                    Err(e) => {
                        error!("API fallback failed for release {}: {}", release_id, e);
                        Stage::Failed(e)
                    }
                }
            }
            terminal => terminal,
        }
    }

    /// Lowest-only statistics, scaled down to approximate the seller's net.
    fn discounted(&self, stats: &MarketplaceStats) -> PriceStatistics {
        let multiplier = self.pricing.api_net_multiplier;
        PriceStatistics {
            lowest: stats
                .lowest_price
                .map(|p| (p * multiplier * 100.0).round() / 100.0),
            median: None,
            highest: None,
            currency: stats.currency,
            num_for_sale: stats.num_for_sale,
        }
    }

    async fn finish(
        &self,
        release_id: u64,
        started_at: DateTime<Utc>,
        trail: Vec<String>,
        outcome: PricingOutcome,
    ) -> PricingReport {
        let finished_at = Utc::now();
        let mut persistence_errors = Vec::new();

        let (state, source_path, error_text) = match &outcome {
            PricingOutcome::Done { path, statistics } => {
                info!(
                    "Priced release {} via {} (low {:?}, median {:?}, high {:?} {})",
                    release_id,
                    path.as_str(),
                    statistics.lowest,
                    statistics.median,
                    statistics.highest,
                    statistics.currency
                );
                let record = PriceRecord {
                    release_id,
                    statistics: statistics.clone(),
                    source_path: *path,
                    captured_at: finished_at,
                };
                if let Err(e) = self.store.save_price_record(&record).await {
                    persistence_errors.push(e.to_string());
                }
                (SessionState::Done, *path, None)
            }
            PricingOutcome::Failed(e) => {
                metrics::pricing_failed(e.kind());
                (SessionState::Failed, SourcePath::None, Some(e.to_string()))
            }
            PricingOutcome::SkippedFresh => {
                return PricingReport {
                    release_id,
                    outcome,
                    session_id: None,
                    trail,
                    persistence_error: None,
                }
            }
        };

        let session = CollectionSession {
            id: Uuid::new_v4(),
            release_id,
            started_at,
            finished_at,
            state,
            source_path,
            trail: trail.clone(),
            error: error_text,
        };
        if let Err(e) = self.store.save_session(&session).await {
            persistence_errors.push(e.to_string());
        }

        let persistence_error = if persistence_errors.is_empty() {
            None
        } else {
            metrics::persistence_failure();
            let joined = persistence_errors.join("; ");
            warn!("Persisting results for release {} failed: {}", release_id, joined);
            Some(joined)
        };

        PricingReport {
            release_id,
            outcome,
            session_id: Some(session.id),
            trail,
            persistence_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::Result;
    use crate::common::types::Currency;
    use crate::infra::price_store::InMemoryPriceStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const STATS_PAGE: &str = r#"<html><head><script type="application/ld+json">
        {"@type":"MusicRelease","offers":{"@type":"AggregateOffer","offerCount":9,"priceCurrency":"USD"}}
        </script></head><body><section id="release-stats"><h3>Statistics</h3>
        <li>Low: <!-- -->$0.96</li><li>Median: $2.97</li><li>High: $11.76</li>
        </section></body></html>"#;

    enum Reply {
        Page(&'static str),
        Blocked,
        Broken,
    }

    struct FakeFetcher {
        name: &'static str,
        reply: Reply,
        calls: AtomicUsize,
    }

    impl FakeFetcher {
        fn new(name: &'static str, reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                name,
                reply,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PageFetcherPort for FakeFetcher {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch_page(&self, _url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Reply::Page(html) => Ok(html.to_string()),
                Reply::Blocked => Err(DiggerError::UpstreamBlocked { status: 403 }),
                Reply::Broken => Err(DiggerError::Api {
                    message: "HTTP 500".into(),
                }),
            }
        }
    }

    struct FakeApi(Option<f64>);

    #[async_trait]
    impl MarketplaceStatsPort for FakeApi {
        async fn marketplace_stats(&self, _release_id: u64) -> Result<MarketplaceStats> {
            match self.0 {
                Some(lowest) => Ok(MarketplaceStats {
                    lowest_price: Some(lowest),
                    currency: Currency::Eur,
                    num_for_sale: 3,
                }),
                None => Err(DiggerError::Api {
                    message: "HTTP 404".into(),
                }),
            }
        }
    }

    struct FailingStore;

    #[async_trait]
    impl PriceStorePort for FailingStore {
        async fn latest_capture(&self, _release_id: u64) -> Result<Option<DateTime<Utc>>> {
            Ok(None)
        }
        async fn save_price_record(&self, _record: &PriceRecord) -> Result<()> {
            Err(DiggerError::PersistenceFailure("disk full".into()))
        }
        async fn save_session(&self, _session: &CollectionSession) -> Result<()> {
            Err(DiggerError::PersistenceFailure("disk full".into()))
        }
    }

    fn orchestrator(
        direct: Arc<FakeFetcher>,
        proxy: Option<Arc<FakeFetcher>>,
        api: FakeApi,
        store: Arc<InMemoryPriceStore>,
    ) -> PricingFallbackOrchestrator {
        PricingFallbackOrchestrator::new(
            direct,
            proxy.map(|p| p as Arc<dyn PageFetcherPort>),
            Arc::new(api),
            store.clone(),
            store,
            &CatalogConfig::default(),
            &PricingConfig::default(),
        )
    }

    #[tokio::test]
    async fn direct_page_with_statistics_is_scraped() {
        let store = Arc::new(InMemoryPriceStore::new());
        let report = orchestrator(
            FakeFetcher::new("direct", Reply::Page(STATS_PAGE)),
            None,
            FakeApi(None),
            store.clone(),
        )
        .collect(1)
        .await;

        let price = report.price_report();
        assert_eq!(price.source_path, SourcePath::Scraped);
        assert_eq!(price.lowest, Some(0.96));
        assert_eq!(price.highest, Some(11.76));
        assert_eq!(price.num_for_sale, 9);
        assert_eq!(report.trail, vec![PATH_DIRECT_FETCH, PATH_EXTRACT]);
        assert_eq!(store.records().len(), 1);
        assert_eq!(store.sessions()[0].state, SessionState::Done);
    }

    #[tokio::test]
    async fn blocked_direct_goes_through_proxy() {
        let store = Arc::new(InMemoryPriceStore::new());
        let proxy = FakeFetcher::new("proxy", Reply::Page(STATS_PAGE));
        let report = orchestrator(
            FakeFetcher::new("direct", Reply::Blocked),
            Some(proxy.clone()),
            FakeApi(None),
            store,
        )
        .collect(2)
        .await;

        assert_eq!(report.price_report().source_path, SourcePath::Scraped);
        assert_eq!(proxy.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            report.trail,
            vec![PATH_DIRECT_FETCH, PATH_PROXY_FETCH, PATH_EXTRACT]
        );
    }

    #[tokio::test]
    async fn proxy_failure_falls_back_to_discounted_api_price() {
        let store = Arc::new(InMemoryPriceStore::new());
        let report = orchestrator(
            FakeFetcher::new("direct", Reply::Blocked),
            Some(FakeFetcher::new("proxy", Reply::Blocked)),
            FakeApi(Some(10.0)),
            store.clone(),
        )
        .collect(3)
        .await;

        let price = report.price_report();
        assert_eq!(price.source_path, SourcePath::Api);
        assert_eq!(price.lowest, Some(8.5));
        assert_eq!(price.median, None);
        assert_eq!(price.highest, None);
        assert_eq!(price.currency, Currency::Eur);
        assert_eq!(store.sessions()[0].source_path, SourcePath::Api);
    }

    #[tokio::test]
    async fn page_without_statistics_uses_api() {
        let store = Arc::new(InMemoryPriceStore::new());
        let report = orchestrator(
            FakeFetcher::new("direct", Reply::Page("<html><body>nope</body></html>")),
            None,
            FakeApi(Some(4.0)),
            store,
        )
        .collect(4)
        .await;
        assert_eq!(report.price_report().source_path, SourcePath::Api);
        assert_eq!(
            report.trail,
            vec![PATH_DIRECT_FETCH, PATH_EXTRACT, PATH_API_FALLBACK]
        );
    }

    #[tokio::test]
    async fn other_direct_error_fails_and_records_session() {
        let store = Arc::new(InMemoryPriceStore::new());
        let report = orchestrator(
            FakeFetcher::new("direct", Reply::Broken),
            None,
            FakeApi(Some(4.0)),
            store.clone(),
        )
        .collect(5)
        .await;

        assert!(matches!(report.error(), Some(DiggerError::Api { .. })));
        assert_eq!(report.price_report(), PriceReport::none());
        assert!(store.records().is_empty());
        let sessions = store.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].state, SessionState::Failed);
        assert!(sessions[0].error.as_deref().unwrap_or("").contains("HTTP 500"));
    }

    #[tokio::test]
    async fn exhausted_chain_keeps_last_error() {
        let store = Arc::new(InMemoryPriceStore::new());
        let report = orchestrator(
            FakeFetcher::new("direct", Reply::Blocked),
            None,
            FakeApi(None),
            store,
        )
        .collect(6)
        .await;
        let err = report.error().unwrap();
        assert!(err.to_string().contains("HTTP 404"));
    }

    #[tokio::test]
    async fn fresh_release_is_skipped_without_fetching() {
        let store = Arc::new(InMemoryPriceStore::new());
        store
            .save_price_record(&PriceRecord {
                release_id: 7,
                statistics: PriceStatistics::empty(Currency::Usd),
                source_path: SourcePath::Api,
                captured_at: Utc::now(),
            })
            .await
            .unwrap();
        let direct = FakeFetcher::new("direct", Reply::Page(STATS_PAGE));
        let report = orchestrator(direct.clone(), None, FakeApi(None), store.clone())
            .collect(7)
            .await;

        assert!(report.is_skipped());
        assert_eq!(direct.calls.load(Ordering::SeqCst), 0);
        assert!(store.sessions().is_empty());
    }

    #[tokio::test]
    async fn persistence_failure_does_not_unwind_result() {
        let store = Arc::new(FailingStore);
        let orchestrator = PricingFallbackOrchestrator::new(
            FakeFetcher::new("direct", Reply::Page(STATS_PAGE)),
            None,
            Arc::new(FakeApi(None)),
            store.clone(),
            store,
            &CatalogConfig::default(),
            &PricingConfig::default(),
        );
        let report = orchestrator.collect(8).await;
        assert_eq!(report.price_report().lowest, Some(0.96));
        assert!(report.persistence_error.is_some());
    }
}
