pub mod ports;
pub mod resolve_use_case;
pub mod listing_price_use_case;
pub mod batch_pricing_use_case;

pub use batch_pricing_use_case::{BatchPriceCollector, BatchSummary};
pub use listing_price_use_case::ListingPriceService;
pub use resolve_use_case::ReleaseResolver;
