use crate::app::ports::{HttpClientPort, HttpGetResult};
use crate::common::error::{DiggerError, Result};
use crate::config::CatalogConfig;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

/// Shared reqwest client; the configured timeout applies to every call made through it.
pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    pub fn new(catalog: &CatalogConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(catalog.timeout())
            .user_agent(catalog.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    fn map_send_error(url: &str, err: reqwest::Error) -> DiggerError {
        if err.is_timeout() {
            DiggerError::Timeout { url: url.to_string() }
        } else {
            DiggerError::Http(err)
        }
    }
}

#[async_trait]
impl HttpClientPort for ReqwestHttp {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpGetResult> {
        tracing::debug!("HTTP GET request to: {}", url);
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let resp = request
            .send()
            .await
            .map_err(|e| Self::map_send_error(url, e))?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = resp
            .bytes()
            .await
            .map_err(|e| Self::map_send_error(url, e))?
            .to_vec();
        tracing::debug!("HTTP response: status={}, size={} bytes", status, body.len());

        Ok(HttpGetResult {
            status,
            body,
            content_type,
        })
    }
}
