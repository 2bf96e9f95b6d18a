use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Raw artist/title/catalog strings as scanned from a sleeve or label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseQuery {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub catalog_number: Option<String>,
}

impl ReleaseQuery {
    pub fn new(artist: Option<&str>, title: Option<&str>, catalog_number: Option<&str>) -> Self {
        Self {
            artist: artist.map(str::to_string),
            title: title.map(str::to_string),
            catalog_number: catalog_number.map(str::to_string),
        }
    }

    pub fn artist(&self) -> Option<&str> {
        present(&self.artist)
    }

    pub fn title(&self) -> Option<&str> {
        present(&self.title)
    }

    pub fn catalog_number(&self) -> Option<&str> {
        present(&self.catalog_number)
    }

    pub fn is_empty(&self) -> bool {
        self.artist().is_none() && self.title().is_none() && self.catalog_number().is_none()
    }
}

// Blank strings count as absent.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// One concrete search attempt against the catalog. Built by the planner, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchStrategy {
    query_text: String,
    structured_params: BTreeMap<String, String>,
    label: String,
    priority: u8,
}

impl SearchStrategy {
    pub fn new(
        query_text: impl Into<String>,
        structured_params: BTreeMap<String, String>,
        label: impl Into<String>,
        priority: u8,
    ) -> Self {
        Self {
            query_text: query_text.into(),
            structured_params,
            label: label.into(),
            priority,
        }
    }

    pub fn query_text(&self) -> &str {
        &self.query_text
    }

    pub fn structured_params(&self) -> &BTreeMap<String, String> {
        &self.structured_params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.structured_params.get(name).map(String::as_str)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }
}

/// A single search hit, not yet scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRelease {
    pub external_id: u64,
    /// Combined "Artist - Title" string as the catalog renders it.
    pub display_title: String,
    pub catalog_number: Option<String>,
}

impl CandidateRelease {
    /// Splits the display title on the first `" - "`. Without a separator the
    /// artist part is empty and the whole string is the title part.
    pub fn artist_and_title(&self) -> (&str, &str) {
        match self.display_title.split_once(" - ") {
            Some((artist, title)) => (artist.trim(), title.trim()),
            None => ("", self.display_title.trim()),
        }
    }
}

/// Result of running one strategy. An empty response is not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Candidates(Vec<CandidateRelease>),
    NoCandidates,
}

impl SearchOutcome {
    pub fn from_candidates(candidates: Vec<CandidateRelease>) -> Self {
        if candidates.is_empty() {
            SearchOutcome::NoCandidates
        } else {
            SearchOutcome::Candidates(candidates)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub external_id: u64,
    pub canonical_url: String,
    pub strategy_label: String,
    pub match_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Eur,
    #[default]
    Usd,
    Gbp,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Gbp => "GBP",
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Currency::Eur => '€',
            Currency::Usd => '$',
            Currency::Gbp => '£',
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '€' => Some(Currency::Eur),
            '$' => Some(Currency::Usd),
            '£' => Some(Currency::Gbp),
            _ => None,
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "EUR" => Some(Currency::Eur),
            "USD" => Some(Currency::Usd),
            "GBP" => Some(Currency::Gbp),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Aggregate sale prices for one release. Each price is independently optional;
/// a missing value stays `None` and is never coerced to zero.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceStatistics {
    pub lowest: Option<f64>,
    pub median: Option<f64>,
    pub highest: Option<f64>,
    pub currency: Currency,
    pub num_for_sale: u32,
}

impl PriceStatistics {
    pub fn empty(currency: Currency) -> Self {
        Self {
            currency,
            ..Self::default()
        }
    }

    pub fn has_any_price(&self) -> bool {
        self.lowest.is_some() || self.median.is_some() || self.highest.is_some()
    }
}

/// Which path produced a price record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourcePath {
    Scraped,
    Api,
    None,
}

impl SourcePath {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourcePath::Scraped => "scraped",
            SourcePath::Api => "api",
            SourcePath::None => "none",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "scraped" => SourcePath::Scraped,
            "api" => SourcePath::Api,
            _ => SourcePath::None,
        }
    }
}

/// Flat pricing output handed to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceReport {
    pub lowest: Option<f64>,
    pub median: Option<f64>,
    pub highest: Option<f64>,
    pub currency: Currency,
    pub num_for_sale: u32,
    pub source_path: SourcePath,
}

impl PriceReport {
    pub fn from_statistics(stats: &PriceStatistics, source_path: SourcePath) -> Self {
        Self {
            lowest: stats.lowest,
            median: stats.median,
            highest: stats.highest,
            currency: stats.currency,
            num_for_sale: stats.num_for_sale,
            source_path,
        }
    }

    pub fn none() -> Self {
        Self::from_statistics(&PriceStatistics::default(), SourcePath::None)
    }
}

/// One marketplace offer for a release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub price: f64,
    pub currency: Currency,
    pub condition_grade: String,
    pub sleeve_condition_grade: String,
    pub shipping_price: Option<f64>,
    pub seller_location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListingsPage {
    pub listings: Vec<Listing>,
    pub page: u32,
    pub pages: u32,
}

/// Marketplace summary from the structured API.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketplaceStats {
    pub lowest_price: Option<f64>,
    pub currency: Currency,
    pub num_for_sale: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub release_id: u64,
    pub statistics: PriceStatistics,
    pub source_path: SourcePath,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Done,
    Failed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Done => "done",
            SessionState::Failed => "failed",
        }
    }
}

/// Persisted trace of one price collection run, written for every terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSession {
    pub id: Uuid,
    pub release_id: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub state: SessionState,
    pub source_path: SourcePath,
    /// Stages visited, in order.
    pub trail: Vec<String>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_query_fields_count_as_absent() {
        let query = ReleaseQuery::new(Some("  "), Some("Radar Love"), Some(""));
        assert_eq!(query.artist(), None);
        assert_eq!(query.title(), Some("Radar Love"));
        assert_eq!(query.catalog_number(), None);
        assert!(!query.is_empty());
        assert!(ReleaseQuery::default().is_empty());
    }

    #[test]
    fn display_title_splits_on_first_separator() {
        let candidate = CandidateRelease {
            external_id: 1,
            display_title: "Golden Earring - Radar Love - Live".into(),
            catalog_number: None,
        };
        assert_eq!(candidate.artist_and_title(), ("Golden Earring", "Radar Love - Live"));

        let bare = CandidateRelease {
            external_id: 2,
            display_title: "Moontan".into(),
            catalog_number: None,
        };
        assert_eq!(bare.artist_and_title(), ("", "Moontan"));
    }

    #[test]
    fn currency_round_trips_symbols_and_codes() {
        assert_eq!(Currency::from_symbol('€'), Some(Currency::Eur));
        assert_eq!(Currency::from_code("gbp"), Some(Currency::Gbp));
        assert_eq!(Currency::from_code("JPY"), None);
        assert_eq!(Currency::default(), Currency::Usd);
        assert_eq!(serde_json::to_string(&Currency::Eur).unwrap(), "\"EUR\"");
    }

    #[test]
    fn price_report_serializes_with_camel_case_and_nulls() {
        let stats = PriceStatistics {
            lowest: Some(1.5),
            median: None,
            highest: None,
            currency: Currency::Gbp,
            num_for_sale: 3,
        };
        let json = serde_json::to_value(PriceReport::from_statistics(&stats, SourcePath::Api)).unwrap();
        assert_eq!(json["lowest"], 1.5);
        assert!(json["median"].is_null());
        assert_eq!(json["numForSale"], 3);
        assert_eq!(json["sourcePath"], "api");
        assert_eq!(json["currency"], "GBP");
    }
}
