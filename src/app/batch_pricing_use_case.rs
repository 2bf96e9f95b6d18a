use crate::config::PricingConfig;
use crate::observability::metrics;
use crate::pricing::{PricingFallbackOrchestrator, PricingOutcome, PricingReport};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Counts over one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub requested: usize,
    pub processed: usize,
    pub skipped: usize,
    pub done: usize,
    pub failed: usize,
}

/// Use case for pricing a list of releases one after another
pub struct BatchPriceCollector {
    orchestrator: Arc<PricingFallbackOrchestrator>,
    delay: Duration,
    max_batch_size: usize,
}

impl BatchPriceCollector {
    pub fn new(orchestrator: Arc<PricingFallbackOrchestrator>, pricing: &PricingConfig) -> Self {
        Self {
            orchestrator,
            delay: pricing.batch_delay(),
            max_batch_size: pricing.max_batch_size.max(1),
        }
    }

    /// Dedups `release_ids` (first occurrence wins), caps the list and prices
    /// each release sequentially. The courtesy delay sits between items that
    /// touched the network; freshness skips don't wait.
    pub async fn collect(&self, release_ids: &[u64]) -> (Vec<PricingReport>, BatchSummary) {
        let mut seen = HashSet::new();
        let mut queue: Vec<u64> = release_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();
        if queue.len() > self.max_batch_size {
            warn!(
                "Batch of {} releases capped at {}",
                queue.len(),
                self.max_batch_size
            );
            queue.truncate(self.max_batch_size);
        }

        let mut summary = BatchSummary {
            requested: release_ids.len(),
            ..BatchSummary::default()
        };
        let mut reports = Vec::with_capacity(queue.len());
        let mut needs_delay = false;

        for release_id in queue {
            if needs_delay && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let report = self.orchestrator.collect(release_id).await;
            match &report.outcome {
                PricingOutcome::SkippedFresh => summary.skipped += 1,
                PricingOutcome::Done { .. } => summary.done += 1,
                PricingOutcome::Failed(_) => summary.failed += 1,
            }
            needs_delay = !report.is_skipped();
            summary.processed += 1;
            reports.push(report);
        }

        metrics::batch_completed(summary.processed);
        info!(
            "Batch finished: {} processed, {} done, {} skipped, {} failed",
            summary.processed, summary.done, summary.skipped, summary.failed
        );
        (reports, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::{MarketplaceStatsPort, PageFetcherPort, PriceStorePort};
    use crate::common::error::{DiggerError, Result};
    use crate::common::types::{Currency, MarketplaceStats, PriceRecord, PriceStatistics, SourcePath};
    use crate::config::CatalogConfig;
    use crate::infra::price_store::InMemoryPriceStore;
    use async_trait::async_trait;
    use chrono::Utc;

    struct BlockedPage;

    #[async_trait]
    impl PageFetcherPort for BlockedPage {
        fn name(&self) -> &'static str {
            "direct"
        }

        async fn fetch_page(&self, _url: &str) -> Result<String> {
            Err(DiggerError::UpstreamBlocked { status: 429 })
        }
    }

    struct EvenIdsPriced;

    #[async_trait]
    impl MarketplaceStatsPort for EvenIdsPriced {
        async fn marketplace_stats(&self, release_id: u64) -> Result<MarketplaceStats> {
            if release_id % 2 == 0 {
                Ok(MarketplaceStats {
                    lowest_price: Some(20.0),
                    currency: Currency::Usd,
                    num_for_sale: 1,
                })
            } else {
                Err(DiggerError::Api {
                    message: "HTTP 404".into(),
                })
            }
        }
    }

    fn collector(store: Arc<InMemoryPriceStore>, max_batch_size: usize) -> BatchPriceCollector {
        let pricing = PricingConfig {
            batch_delay_ms: 0,
            max_batch_size,
            ..PricingConfig::default()
        };
        let orchestrator = PricingFallbackOrchestrator::new(
            Arc::new(BlockedPage),
            None,
            Arc::new(EvenIdsPriced),
            store.clone(),
            store,
            &CatalogConfig::default(),
            &pricing,
        );
        BatchPriceCollector::new(Arc::new(orchestrator), &pricing)
    }

    #[tokio::test]
    async fn dedups_and_reports_each_release() {
        let store = Arc::new(InMemoryPriceStore::new());
        let (reports, summary) = collector(store.clone(), 10).collect(&[2, 3, 2, 4]).await;

        let ids: Vec<u64> = reports.iter().map(|r| r.release_id).collect();
        assert_eq!(ids, vec![2, 3, 4]);
        assert_eq!(summary.requested, 4);
        assert_eq!(summary.done, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(store.sessions().len(), 3);
    }

    #[tokio::test]
    async fn caps_batch_size() {
        let store = Arc::new(InMemoryPriceStore::new());
        let (reports, summary) = collector(store, 2).collect(&[2, 4, 6, 8]).await;
        assert_eq!(reports.len(), 2);
        assert_eq!(summary.processed, 2);
    }

    #[tokio::test]
    async fn fresh_releases_are_skipped() {
        let store = Arc::new(InMemoryPriceStore::new());
        store
            .save_price_record(&PriceRecord {
                release_id: 2,
                statistics: PriceStatistics::empty(Currency::Usd),
                source_path: SourcePath::Api,
                captured_at: Utc::now(),
            })
            .await
            .unwrap();
        let (_, summary) = collector(store, 10).collect(&[2, 4]).await;
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.done, 1);
    }
}
