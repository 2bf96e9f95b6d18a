use crate::app::ports::{HttpClientPort, HttpGetResult, PageFetcherPort};
use crate::common::error::{DiggerError, Result};
use crate::config::ProxyConfig;
use crate::pricing::page_inspect::is_challenge_page;
use async_trait::async_trait;
use reqwest::Url;
use std::sync::Arc;
use tracing::{debug, instrument};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";

fn page_headers() -> Vec<(String, String)> {
    vec![
        ("User-Agent".to_string(), BROWSER_USER_AGENT.to_string()),
        ("Accept".to_string(), "text/html,application/xhtml+xml".to_string()),
        ("Accept-Language".to_string(), "en-US,en;q=0.9".to_string()),
    ]
}

/// Turns a page response into HTML, or the error the fallback chain keys on.
fn into_html(resp: HttpGetResult, fetcher: &str) -> Result<String> {
    if resp.is_blocked() {
        return Err(DiggerError::UpstreamBlocked {
            status: resp.status,
        });
    }
    if !resp.is_success() {
        return Err(DiggerError::Api {
            message: format!("{} fetch returned HTTP {}", fetcher, resp.status),
        });
    }

    let html = resp.text();
    if is_challenge_page(&html) {
        debug!("{} fetch returned an anti-bot challenge page", fetcher);
        return Err(DiggerError::UpstreamBlocked {
            status: resp.status,
        });
    }
    Ok(html)
}

/// Fetches the release page straight from the catalog site.
pub struct DirectPageFetcher {
    http: Arc<dyn HttpClientPort>,
}

impl DirectPageFetcher {
    pub fn new(http: Arc<dyn HttpClientPort>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl PageFetcherPort for DirectPageFetcher {
    fn name(&self) -> &'static str {
        "direct"
    }

    #[instrument(skip(self))]
    async fn fetch_page(&self, url: &str) -> Result<String> {
        let resp = self.http.get(url, &page_headers()).await?;
        into_html(resp, self.name())
    }
}

/// Fetches the release page through a scraping proxy (`endpoint?api_key=..&url=..`).
pub struct ProxyPageFetcher {
    http: Arc<dyn HttpClientPort>,
    endpoint: String,
    api_key: String,
}

impl ProxyPageFetcher {
    /// `None` when the proxy is disabled or has no key.
    pub fn from_config(http: Arc<dyn HttpClientPort>, config: &ProxyConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let api_key = config.api_key.clone().filter(|k| !k.is_empty())?;
        Some(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key,
        })
    }

    fn proxied_url(&self, target: &str) -> Result<Url> {
        Url::parse_with_params(
            &self.endpoint,
            &[("api_key", self.api_key.as_str()), ("url", target)],
        )
        .map_err(|e| DiggerError::Config(format!("invalid proxy endpoint: {}", e)))
    }
}

#[async_trait]
impl PageFetcherPort for ProxyPageFetcher {
    fn name(&self) -> &'static str {
        "proxy"
    }

    #[instrument(skip(self))]
    async fn fetch_page(&self, url: &str) -> Result<String> {
        let proxied = self.proxied_url(url)?;
        let resp = self.http.get(proxied.as_str(), &[]).await?;
        into_html(resp, self.name())
    }
}
