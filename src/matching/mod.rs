// Query planning and candidate selection for release resolution

pub mod catalog_number;
pub mod normalize;
pub mod planner;
pub mod selector;
pub mod similarity;

pub use catalog_number::{catalog_variants, release_id_from_reference};
pub use normalize::normalize_text;
pub use planner::SearchStrategyPlanner;
pub use selector::MatchSelector;
pub use similarity::similarity;
