/// Upstream defaults and strategy labels shared across the crate.
/// Labels end up in match results and session records, so keep them stable.

// Upstream catalog defaults (overridable through config.toml)
pub const DEFAULT_CATALOG_API_BASE: &str = "https://api.discogs.com";
pub const DEFAULT_CATALOG_WEB_BASE: &str = "https://www.discogs.com";
pub const DEFAULT_USER_AGENT: &str = "crate_digger/0.1 +https://github.com/crate-digger";

// Search strategy labels, grouped by planner rule
pub const LABEL_CATNO_EXACT: &str = "catno_exact";
pub const LABEL_ARTIST_TITLE_CATNO: &str = "artist_title_catno";
pub const LABEL_ARTIST_TITLE_CATNO_NORMALIZED: &str = "artist_title_catno_normalized";
pub const LABEL_ARTIST_TITLE: &str = "artist_title";
pub const LABEL_ARTIST_TITLE_NORMALIZED: &str = "artist_title_normalized";
pub const LABEL_ARTIST_TITLE_FIELDS: &str = "artist_title_fields";
pub const LABEL_CATCH_ALL: &str = "catch_all";
pub const LABEL_CATCH_ALL_NORMALIZED: &str = "catch_all_normalized";

// Structured search parameter names understood by the catalog endpoint
pub const PARAM_CATNO: &str = "catno";
pub const PARAM_ARTIST: &str = "artist";
pub const PARAM_RELEASE_TITLE: &str = "release_title";

// Match scoring weights
pub const CATALOG_WEIGHT: f64 = 40.0;
pub const ARTIST_WEIGHT: f64 = 30.0;
pub const TITLE_WEIGHT: f64 = 30.0;
pub const DEFAULT_ACCEPTANCE_THRESHOLD: f64 = 50.0;

// Price sanity bounds (exclusive)
pub const MIN_ACCEPTED_PRICE: f64 = 0.0;
pub const MAX_ACCEPTED_PRICE: f64 = 10_000.0;

// Pricing defaults
pub const DEFAULT_FRESHNESS_WINDOW_HOURS: i64 = 24;
pub const DEFAULT_API_NET_MULTIPLIER: f64 = 0.85;
pub const DEFAULT_STATISTICS_WINDOW_CHARS: usize = 4000;
pub const DEFAULT_BATCH_DELAY_MS: u64 = 1500;
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

// Collection path names as persisted in session records
pub const PATH_DIRECT_FETCH: &str = "direct_fetch";
pub const PATH_PROXY_FETCH: &str = "proxy_fetch";
pub const PATH_EXTRACT: &str = "extract";
pub const PATH_API_FALLBACK: &str = "api_fallback";
pub const CATALOG_AUTH_SCHEME: &str = "Discogs token=";
