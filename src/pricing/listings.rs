use super::condition::condition_matches;
use crate::common::types::{Listing, PriceStatistics};
use serde::Serialize;
use tracing::debug;

/// Statistics over the listings that passed the filter, with the counts behind them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredStatistics {
    pub statistics: PriceStatistics,
    pub matched: usize,
    pub total: usize,
}

/// Condition-aware view over one release's marketplace listings.
#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    media_condition: String,
    sleeve_condition: Option<String>,
    include_shipping: bool,
}

impl ListingFilter {
    pub fn new(media_condition: impl Into<String>) -> Self {
        Self {
            media_condition: media_condition.into(),
            ..Self::default()
        }
    }

    pub fn with_sleeve_condition(mut self, sleeve_condition: impl Into<String>) -> Self {
        self.sleeve_condition = Some(sleeve_condition.into());
        self
    }

    /// Price each listing as item plus shipping.
    pub fn including_shipping(mut self, include_shipping: bool) -> Self {
        self.include_shipping = include_shipping;
        self
    }

    pub fn matches(&self, listing: &Listing) -> bool {
        condition_matches(&self.media_condition, &listing.condition_grade)
            && self
                .sleeve_condition
                .as_deref()
                .map_or(true, |sleeve| {
                    condition_matches(sleeve, &listing.sleeve_condition_grade)
                })
    }

    fn effective_price(&self, listing: &Listing) -> f64 {
        if self.include_shipping {
            listing.price + listing.shipping_price.unwrap_or(0.0)
        } else {
            listing.price
        }
    }

    /// Sorted-price statistics over matching listings. When listings exist but
    /// none match, every price is `None`; the unfiltered prices are never used.
    /// Listings in a currency other than the first listing's are left out.
    pub fn apply(&self, listings: &[Listing]) -> FilteredStatistics {
        let Some(first) = listings.first() else {
            return FilteredStatistics {
                statistics: PriceStatistics::default(),
                matched: 0,
                total: 0,
            };
        };
        let currency = first.currency;

        let mut prices: Vec<f64> = listings
            .iter()
            .filter(|l| l.currency == currency && self.matches(l))
            .map(|l| self.effective_price(l))
            .collect();
        prices.sort_by(f64::total_cmp);
        debug!(
            "{} of {} listings match condition '{}'",
            prices.len(),
            listings.len(),
            self.media_condition
        );

        let statistics = match (prices.first(), prices.last()) {
            (Some(&lowest), Some(&highest)) => PriceStatistics {
                lowest: Some(lowest),
                median: Some(prices[prices.len() / 2]),
                highest: Some(highest),
                currency,
                num_for_sale: prices.len() as u32,
            },
            _ => PriceStatistics::empty(currency),
        };

        FilteredStatistics {
            statistics,
            matched: prices.len(),
            total: listings.len(),
        }
    }
}
