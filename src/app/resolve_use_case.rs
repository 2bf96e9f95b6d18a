use crate::app::ports::CatalogSearchPort;
use crate::common::error::Result;
use crate::common::types::{MatchResult, ReleaseQuery, SearchOutcome};
use crate::matching::{MatchSelector, SearchStrategyPlanner};
use crate::observability::metrics;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Use case for resolving scanned release text into one catalog release
pub struct ReleaseResolver {
    planner: SearchStrategyPlanner,
    search: Arc<dyn CatalogSearchPort>,
    selector: MatchSelector,
}

impl ReleaseResolver {
    pub fn new(search: Arc<dyn CatalogSearchPort>, selector: MatchSelector) -> Self {
        Self {
            planner: SearchStrategyPlanner::new(),
            search,
            selector,
        }
    }

    /// Tries strategies in priority order and scores the first non-empty
    /// candidate list. `Ok(None)` means every strategy came back empty;
    /// `SearchUnavailable` aborts the walk.
    #[instrument(skip(self))]
    pub async fn resolve(&self, query: &ReleaseQuery) -> Result<Option<MatchResult>> {
        for strategy in &self.planner.plan(query) {
            metrics::strategy_tried(strategy.label());
            match self.search.search(strategy).await? {
                SearchOutcome::Candidates(candidates) => {
                    debug!(
                        "Strategy {} ('{}') returned {} candidates",
                        strategy.label(),
                        strategy.query_text(),
                        candidates.len()
                    );
                    return Ok(self.selector.select(query, &candidates, strategy.label()));
                }
                SearchOutcome::NoCandidates => {
                    debug!("Strategy {} returned nothing", strategy.label());
                }
            }
        }

        info!("No strategy produced candidates");
        metrics::match_none();
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::constants::{LABEL_ARTIST_TITLE, LABEL_CATNO_EXACT};
    use crate::common::error::DiggerError;
    use crate::common::types::{CandidateRelease, SearchStrategy};
    use crate::config::{CatalogConfig, MatchingConfig};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers with candidates only for strategies with the given label.
    struct ScriptedSearch {
        answer_label: &'static str,
        candidates: Vec<CandidateRelease>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CatalogSearchPort for ScriptedSearch {
        async fn search(&self, strategy: &SearchStrategy) -> Result<SearchOutcome> {
            self.seen.lock().unwrap().push(strategy.label().to_string());
            if strategy.label() == self.answer_label {
                Ok(SearchOutcome::from_candidates(self.candidates.clone()))
            } else {
                Ok(SearchOutcome::NoCandidates)
            }
        }
    }

    struct DownSearch;

    #[async_trait]
    impl CatalogSearchPort for DownSearch {
        async fn search(&self, _strategy: &SearchStrategy) -> Result<SearchOutcome> {
            Err(DiggerError::SearchUnavailable {
                message: "HTTP 503".into(),
            })
        }
    }

    fn selector() -> MatchSelector {
        MatchSelector::new(&MatchingConfig::default(), &CatalogConfig::default())
    }

    fn radar_love() -> CandidateRelease {
        CandidateRelease {
            external_id: 1_234_567,
            display_title: "Golden Earring - Radar Love".into(),
            catalog_number: Some("2050 290".into()),
        }
    }

    #[tokio::test]
    async fn artist_title_query_skips_catalog_rules() {
        let search = Arc::new(ScriptedSearch {
            answer_label: LABEL_ARTIST_TITLE,
            candidates: vec![radar_love()],
            seen: Mutex::new(Vec::new()),
        });
        let resolver = ReleaseResolver::new(search.clone(), selector());
        let query = ReleaseQuery::new(Some("Golden Earring"), Some("Radar Love"), Some(""));

        let result = resolver.resolve(&query).await.unwrap().unwrap();
        assert_eq!(result.external_id, 1_234_567);
        assert!(result.match_score >= 90.0);
        assert_eq!(result.strategy_label, LABEL_ARTIST_TITLE);

        let seen = search.seen.lock().unwrap();
        assert!(!seen.iter().any(|l| l == LABEL_CATNO_EXACT));
        assert_eq!(seen.last().map(String::as_str), Some(LABEL_ARTIST_TITLE));
    }

    #[tokio::test]
    async fn exhausted_strategies_mean_no_match() {
        let search = Arc::new(ScriptedSearch {
            answer_label: "never",
            candidates: vec![radar_love()],
            seen: Mutex::new(Vec::new()),
        });
        let resolver = ReleaseResolver::new(search.clone(), selector());
        let query = ReleaseQuery::new(Some("Nobody"), Some("Nothing"), Some("XX-1"));

        assert!(resolver.resolve(&query).await.unwrap().is_none());
        let planned = SearchStrategyPlanner::new().plan(&query).len();
        assert_eq!(search.seen.lock().unwrap().len(), planned);
    }

    #[tokio::test]
    async fn unavailable_search_is_an_error() {
        let resolver = ReleaseResolver::new(Arc::new(DownSearch), selector());
        let query = ReleaseQuery::new(Some("Golden Earring"), None, None);
        let err = resolver.resolve(&query).await.unwrap_err();
        assert!(matches!(err, DiggerError::SearchUnavailable { .. }));
    }
}
