use crate::app::ports::ListingsPort;
use crate::common::error::Result;
use crate::pricing::{FilteredStatistics, ListingFilter};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Use case for condition-specific prices built from marketplace listings
pub struct ListingPriceService {
    listings: Arc<dyn ListingsPort>,
    max_pages: u32,
}

impl ListingPriceService {
    pub fn new(listings: Arc<dyn ListingsPort>, max_pages: u32) -> Self {
        Self {
            listings,
            max_pages: max_pages.max(1),
        }
    }

    /// Reads listing pages until the last one (or `max_pages`), then applies the filter.
    #[instrument(skip(self, filter))]
    pub async fn condition_statistics(
        &self,
        release_id: u64,
        filter: &ListingFilter,
    ) -> Result<FilteredStatistics> {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.listings.listings_page(release_id, page).await?;
            let fetched = batch.listings.len();
            all.extend(batch.listings);
            debug!("Listings page {}/{} gave {} entries", batch.page, batch.pages, fetched);

            if fetched == 0 || page >= batch.pages || page >= self.max_pages {
                break;
            }
            page += 1;
        }
        Ok(filter.apply(&all))
    }
}
