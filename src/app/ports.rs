use crate::common::error::Result;
use crate::common::types::{
    CollectionSession, ListingsPage, MarketplaceStats, PriceRecord, SearchOutcome, SearchStrategy,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

// Transport

#[async_trait]
pub trait HttpClientPort: Send + Sync {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpGetResult>;
}

#[derive(Clone, Debug)]
pub struct HttpGetResult {
    pub status: u16,
    pub body: Vec<u8>,
    pub content_type: String,
}

impl HttpGetResult {
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    /// 403 and 429 are how the catalog signals scraping blocks and throttling.
    pub fn is_blocked(&self) -> bool {
        matches!(self.status, 403 | 429)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

// Catalog side

#[async_trait]
pub trait CatalogSearchPort: Send + Sync {
    /// `Err(SearchUnavailable)` for transport/status failures, `NoCandidates`
    /// for a valid empty answer.
    async fn search(&self, strategy: &SearchStrategy) -> Result<SearchOutcome>;
}

// Pricing side

#[async_trait]
pub trait PageFetcherPort: Send + Sync {
    fn name(&self) -> &'static str;

    /// Raw HTML of a release page. 403/429 surface as `UpstreamBlocked`.
    async fn fetch_page(&self, url: &str) -> Result<String>;
}

#[async_trait]
pub trait MarketplaceStatsPort: Send + Sync {
    async fn marketplace_stats(&self, release_id: u64) -> Result<MarketplaceStats>;
}

#[async_trait]
pub trait ListingsPort: Send + Sync {
    async fn listings_page(&self, release_id: u64, page: u32) -> Result<ListingsPage>;
}

// Persistence

#[async_trait]
pub trait PriceStorePort: Send + Sync {
    async fn latest_capture(&self, release_id: u64) -> Result<Option<DateTime<Utc>>>;
    async fn save_price_record(&self, record: &PriceRecord) -> Result<()>;
    async fn save_session(&self, session: &CollectionSession) -> Result<()>;
}

/// Point-in-time "was this collected recently" check. Not a cache: nothing is
/// reused between calls.
#[async_trait]
pub trait FreshnessPort: Send + Sync {
    async fn recently_collected(&self, release_id: u64, window: chrono::Duration) -> Result<bool>;
}

#[async_trait]
impl<T: PriceStorePort> FreshnessPort for T {
    async fn recently_collected(&self, release_id: u64, window: chrono::Duration) -> Result<bool> {
        let latest = self.latest_capture(release_id).await?;
        Ok(latest.map_or(false, |captured_at| Utc::now() - captured_at < window))
    }
}
