//! Metric recording for search, matching and price collection.
//!
//! Everything goes through the `metrics` facade; the host process decides
//! whether a recorder (and exporter) is installed.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Search
    SearchRequestsSuccess,
    SearchRequestsUnavailable,
    SearchRequestDuration,
    SearchStrategiesTried,

    // Matching
    MatchesAccepted,
    MatchesFallback,
    MatchesNone,

    // Pricing
    PricingFreshSkips,
    PricingScraped,
    PricingApiOnly,
    PricingFailed,
    PricingFetchBlocked,
    PersistenceFailures,
    BatchReleasesProcessed,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::SearchRequestsSuccess => "crate_digger_search_requests_success_total",
            MetricName::SearchRequestsUnavailable => "crate_digger_search_requests_unavailable_total",
            MetricName::SearchRequestDuration => "crate_digger_search_request_duration_seconds",
            MetricName::SearchStrategiesTried => "crate_digger_search_strategies_tried_total",
            MetricName::MatchesAccepted => "crate_digger_matches_accepted_total",
            MetricName::MatchesFallback => "crate_digger_matches_fallback_total",
            MetricName::MatchesNone => "crate_digger_matches_none_total",
            MetricName::PricingFreshSkips => "crate_digger_pricing_fresh_skips_total",
            MetricName::PricingScraped => "crate_digger_pricing_scraped_total",
            MetricName::PricingApiOnly => "crate_digger_pricing_api_only_total",
            MetricName::PricingFailed => "crate_digger_pricing_failed_total",
            MetricName::PricingFetchBlocked => "crate_digger_pricing_fetch_blocked_total",
            MetricName::PersistenceFailures => "crate_digger_persistence_failures_total",
            MetricName::BatchReleasesProcessed => "crate_digger_batch_releases_processed_total",
        }
    }
}

pub fn search_success(duration_secs: f64) {
    ::metrics::counter!(MetricName::SearchRequestsSuccess.as_str()).increment(1);
    ::metrics::histogram!(MetricName::SearchRequestDuration.as_str()).record(duration_secs);
}

pub fn search_unavailable() {
    ::metrics::counter!(MetricName::SearchRequestsUnavailable.as_str()).increment(1);
}

pub fn strategy_tried(label: &str) {
    ::metrics::counter!(MetricName::SearchStrategiesTried.as_str(), "strategy" => label.to_string())
        .increment(1);
}

pub fn match_accepted(label: &str) {
    ::metrics::counter!(MetricName::MatchesAccepted.as_str(), "strategy" => label.to_string())
        .increment(1);
}

pub fn match_fallback(label: &str) {
    ::metrics::counter!(MetricName::MatchesFallback.as_str(), "strategy" => label.to_string())
        .increment(1);
}

pub fn match_none() {
    ::metrics::counter!(MetricName::MatchesNone.as_str()).increment(1);
}

pub fn pricing_fresh_skip() {
    ::metrics::counter!(MetricName::PricingFreshSkips.as_str()).increment(1);
}

pub fn pricing_scraped(fetcher: &str) {
    ::metrics::counter!(MetricName::PricingScraped.as_str(), "fetcher" => fetcher.to_string())
        .increment(1);
}

pub fn pricing_api_only() {
    ::metrics::counter!(MetricName::PricingApiOnly.as_str()).increment(1);
}

pub fn pricing_failed(kind: &str) {
    ::metrics::counter!(MetricName::PricingFailed.as_str(), "error" => kind.to_string())
        .increment(1);
}

pub fn fetch_blocked(fetcher: &str) {
    ::metrics::counter!(MetricName::PricingFetchBlocked.as_str(), "fetcher" => fetcher.to_string())
        .increment(1);
}

pub fn persistence_failure() {
    ::metrics::counter!(MetricName::PersistenceFailures.as_str()).increment(1);
}

pub fn batch_completed(processed: usize) {
    ::metrics::counter!(MetricName::BatchReleasesProcessed.as_str()).increment(processed as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_are_prefixed_and_unique() {
        let all = [
            MetricName::SearchRequestsSuccess,
            MetricName::SearchRequestsUnavailable,
            MetricName::SearchRequestDuration,
            MetricName::SearchStrategiesTried,
            MetricName::MatchesAccepted,
            MetricName::MatchesFallback,
            MetricName::MatchesNone,
            MetricName::PricingFreshSkips,
            MetricName::PricingScraped,
            MetricName::PricingApiOnly,
            MetricName::PricingFailed,
            MetricName::PricingFetchBlocked,
            MetricName::PersistenceFailures,
            MetricName::BatchReleasesProcessed,
        ];
        let mut seen = std::collections::HashSet::new();
        for name in all {
            assert!(name.as_str().starts_with("crate_digger_"));
            assert!(seen.insert(name.as_str()));
        }
    }

    #[test]
    fn recording_without_recorder_is_a_noop() {
        search_success(0.1);
        strategy_tried("catno_exact");
        pricing_failed("timeout");
    }
}
