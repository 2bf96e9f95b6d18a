use crate::app::ports::{
    CatalogSearchPort, HttpClientPort, HttpGetResult, ListingsPort, MarketplaceStatsPort,
};
use crate::common::constants::CATALOG_AUTH_SCHEME;
use crate::common::error::{DiggerError, Result};
use crate::common::types::{
    CandidateRelease, Currency, Listing, ListingsPage, MarketplaceStats, SearchOutcome,
    SearchStrategy,
};
use crate::config::CatalogConfig;
use crate::infra::rate_limiter::{Limits, RateLimiter};
use crate::observability::metrics;
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: u64,
    #[serde(default)]
    title: String,
    catno: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    page: u32,
    pages: u32,
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    lowest_price: Option<Money>,
    #[serde(default)]
    num_for_sale: Option<u32>,
    #[serde(default)]
    blocked_from_sale: bool,
}

#[derive(Debug, Deserialize)]
struct Money {
    value: f64,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct ListingsResponse {
    #[serde(default)]
    listings: Vec<ListingEntry>,
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct ListingEntry {
    price: Money,
    #[serde(default)]
    condition: String,
    #[serde(default)]
    sleeve_condition: String,
    shipping_price: Option<Money>,
    ships_from: Option<String>,
}

/// Client for the catalog's JSON API: database search, marketplace stats and listings.
pub struct CatalogApiClient {
    http: Arc<dyn HttpClientPort>,
    config: CatalogConfig,
    listings_per_page: u32,
    limiter: RateLimiter,
}

impl CatalogApiClient {
    pub fn new(http: Arc<dyn HttpClientPort>, config: &CatalogConfig, listings_per_page: u32) -> Self {
        Self {
            http,
            limiter: RateLimiter::new(Limits {
                requests_per_min: Some(config.requests_per_min),
                concurrency: config.max_concurrency,
            }),
            config: config.clone(),
            listings_per_page,
        }
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if let Some(token) = &self.config.token {
            headers.push((
                "Authorization".to_string(),
                format!("{}{}", CATALOG_AUTH_SCHEME, token),
            ));
        }
        headers
    }

    fn search_url(&self, strategy: &SearchStrategy, page: u32) -> Result<Url> {
        let mut params: Vec<(String, String)> = Vec::new();
        if !strategy.query_text().trim().is_empty() {
            params.push(("q".to_string(), strategy.query_text().to_string()));
        }
        params.push(("type".to_string(), "release".to_string()));
        params.push(("per_page".to_string(), self.config.per_page.to_string()));
        params.push(("page".to_string(), page.to_string()));
        for (name, value) in strategy.structured_params() {
            params.push((name.clone(), value.clone()));
        }
        Url::parse_with_params(&self.config.api_url("database/search"), &params)
            .map_err(|e| DiggerError::Config(format!("invalid catalog api_base: {}", e)))
    }

    async fn get(&self, url: &str) -> Result<HttpGetResult> {
        let _permit = self.limiter.acquire().await;
        self.http.get(url, &self.headers()).await
    }

    async fn search_page(&self, strategy: &SearchStrategy, page: u32) -> Result<SearchResponse> {
        let url = self.search_url(strategy, page)?;
        let started = Instant::now();
        let resp = self.get(url.as_str()).await.map_err(|e| {
            metrics::search_unavailable();
            DiggerError::SearchUnavailable {
                message: e.to_string(),
            }
        })?;

        if !resp.is_success() {
            metrics::search_unavailable();
            return Err(DiggerError::SearchUnavailable {
                message: format!("search returned HTTP {}", resp.status),
            });
        }

        let parsed: SearchResponse = serde_json::from_slice(&resp.body).map_err(|e| {
            metrics::search_unavailable();
            DiggerError::SearchUnavailable {
                message: format!("unreadable search response: {}", e),
            }
        })?;
        metrics::search_success(started.elapsed().as_secs_f64());
        Ok(parsed)
    }

    fn money(money: Money) -> Option<(f64, Currency)> {
        match Currency::from_code(&money.currency) {
            Some(currency) => Some((money.value, currency)),
            None => {
                warn!("Ignoring price in unsupported currency {}", money.currency);
                None
            }
        }
    }

    fn status_error(resp: &HttpGetResult, what: &str) -> DiggerError {
        if resp.is_blocked() {
            DiggerError::UpstreamBlocked {
                status: resp.status,
            }
        } else {
            DiggerError::Api {
                message: format!("{} returned HTTP {}", what, resp.status),
            }
        }
    }
}

#[async_trait]
impl CatalogSearchPort for CatalogApiClient {
    #[instrument(skip(self, strategy), fields(label = strategy.label()))]
    async fn search(&self, strategy: &SearchStrategy) -> Result<SearchOutcome> {
        let mut candidates = Vec::new();
        let max_pages = self.config.max_pages.max(1);

        for page in 1..=max_pages {
            let response = match self.search_page(strategy, page).await {
                Ok(response) => response,
                Err(e) if !candidates.is_empty() => {
                    warn!("Search page {} failed, keeping {} candidates: {}", page, candidates.len(), e);
                    break;
                }
                Err(e) => return Err(e),
            };
            let fetched = response.results.len();
            candidates.extend(
                response
                    .results
                    .into_iter()
                    .filter(|r| r.kind.as_deref().map_or(true, |k| k == "release"))
                    .map(|r| CandidateRelease {
                        external_id: r.id,
                        display_title: r.title,
                        catalog_number: r.catno.filter(|c| !c.trim().is_empty()),
                    }),
            );

            let last_page = response
                .pagination
                .map_or(true, |p| p.page >= p.pages);
            if fetched == 0 || last_page {
                break;
            }
        }

        debug!("Strategy returned {} candidates", candidates.len());
        Ok(SearchOutcome::from_candidates(candidates))
    }
}

#[async_trait]
impl MarketplaceStatsPort for CatalogApiClient {
    #[instrument(skip(self))]
    async fn marketplace_stats(&self, release_id: u64) -> Result<MarketplaceStats> {
        let url = self
            .config
            .api_url(&format!("marketplace/stats/{}", release_id));
        let resp = self.get(&url).await?;
        if !resp.is_success() {
            return Err(Self::status_error(&resp, "marketplace stats"));
        }

        let parsed: StatsResponse = serde_json::from_slice(&resp.body)?;
        if parsed.blocked_from_sale {
            debug!("Release {} is blocked from sale", release_id);
        }
        let (lowest_price, currency) = match parsed.lowest_price.and_then(Self::money) {
            Some((value, currency)) => (Some(value), currency),
            None => (None, Currency::default()),
        };
        Ok(MarketplaceStats {
            lowest_price,
            currency,
            num_for_sale: parsed.num_for_sale.unwrap_or(0),
        })
    }
}

#[async_trait]
impl ListingsPort for CatalogApiClient {
    #[instrument(skip(self))]
    async fn listings_page(&self, release_id: u64, page: u32) -> Result<ListingsPage> {
        let path = self
            .config
            .listings_path
            .replace("{release_id}", &release_id.to_string());
        let url = Url::parse_with_params(
            &self.config.api_url(&path),
            &[
                ("page", page.to_string()),
                ("per_page", self.listings_per_page.to_string()),
            ],
        )
        .map_err(|e| DiggerError::Config(format!("invalid listings url: {}", e)))?;

        let resp = self.get(url.as_str()).await?;
        if !resp.is_success() {
            return Err(Self::status_error(&resp, "marketplace listings"));
        }

        let parsed: ListingsResponse = serde_json::from_slice(&resp.body)?;
        let listings = parsed
            .listings
            .into_iter()
            .filter_map(|entry| {
                let (price, currency) = Self::money(entry.price)?;
                Some(Listing {
                    price,
                    currency,
                    condition_grade: entry.condition,
                    sleeve_condition_grade: entry.sleeve_condition,
                    shipping_price: entry.shipping_price.map(|m| m.value),
                    seller_location: entry.ships_from,
                })
            })
            .collect();
        let (page, pages) = parsed
            .pagination
            .map_or((page, page), |p| (p.page, p.pages));

        Ok(ListingsPage {
            listings,
            page,
            pages,
        })
    }
}
