// Adapters behind the app ports: HTTP, catalog API, page fetchers, storage

pub mod catalog_api;
pub mod http_client;
pub mod page_fetch;
pub mod price_store;
pub mod rate_limiter;
