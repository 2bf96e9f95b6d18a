use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiggerError {
    /// Transport failure or non-success status from the catalog search endpoint.
    #[error("catalog search unavailable: {message}")]
    SearchUnavailable { message: String },

    /// The page parsed but carried no statistics region.
    #[error("statistics region not found")]
    ExtractionNotFound,

    #[error("upstream blocked the request (HTTP {status})")]
    UpstreamBlocked { status: u16 },

    #[error("persistence failed: {0}")]
    PersistenceFailure(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out: {url}")]
    Timeout { url: String },

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("API error: {message}")]
    Api { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl DiggerError {
    /// 403/429 style refusals that should push the lookup onto the proxy.
    pub fn is_blocked(&self) -> bool {
        matches!(self, DiggerError::UpstreamBlocked { .. })
    }

    /// Short machine-friendly tag, used for session records and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            DiggerError::SearchUnavailable { .. } => "search_unavailable",
            DiggerError::ExtractionNotFound => "extraction_not_found",
            DiggerError::UpstreamBlocked { .. } => "upstream_blocked",
            DiggerError::PersistenceFailure(_) => "persistence_failure",
            DiggerError::Http(_) => "http",
            DiggerError::Timeout { .. } => "timeout",
            DiggerError::Json(_) => "json",
            DiggerError::Toml(_) => "toml",
            DiggerError::Io(_) => "io",
            DiggerError::Config(_) => "config",
            DiggerError::Api { .. } => "api",
            DiggerError::Storage(_) => "storage",
        }
    }
}

pub type Result<T> = std::result::Result<T, DiggerError>;
