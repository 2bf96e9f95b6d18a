// Price statistics: page extraction, listing filters and the fallback chain

pub mod anchors;
pub mod condition;
pub mod listings;
pub mod orchestrator;
pub mod page_inspect;
pub mod statistics;

pub use condition::{condition_matches, ConditionClass};
pub use listings::{FilteredStatistics, ListingFilter};
pub use orchestrator::{PricingFallbackOrchestrator, PricingOutcome, PricingReport};
pub use statistics::PriceStatisticsExtractor;
