use super::similarity::similarity;
use crate::common::constants::{ARTIST_WEIGHT, CATALOG_WEIGHT, TITLE_WEIGHT};
use crate::common::types::{CandidateRelease, MatchResult, ReleaseQuery};
use crate::config::{CatalogConfig, MatchingConfig};
use crate::observability::metrics;
use tracing::{debug, info, warn};

/// Scores search candidates against the scanned query and picks one.
#[derive(Debug, Clone)]
pub struct MatchSelector {
    acceptance_threshold: f64,
    catalog: CatalogConfig,
}

impl MatchSelector {
    pub fn new(matching: &MatchingConfig, catalog: &CatalogConfig) -> Self {
        Self {
            acceptance_threshold: matching.acceptance_threshold,
            catalog: catalog.clone(),
        }
    }

    /// Weighted similarity (catalog 40, artist 30, title 30) scaled to 0..=100
    /// over the weights that apply: the catalog term counts only when both
    /// sides carry a catalog number, artist/title only when the query has them.
    pub fn score(&self, query: &ReleaseQuery, candidate: &CandidateRelease) -> f64 {
        let (artist_part, title_part) = candidate.artist_and_title();
        let mut earned = 0.0;
        let mut possible = 0.0;

        let candidate_catno = candidate
            .catalog_number
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        if let (Some(wanted), Some(found)) = (query.catalog_number(), candidate_catno) {
            earned += CATALOG_WEIGHT * similarity(wanted, found);
            possible += CATALOG_WEIGHT;
        }
        if let Some(artist) = query.artist() {
            earned += ARTIST_WEIGHT * similarity(artist, artist_part);
            possible += ARTIST_WEIGHT;
        }
        if let Some(title) = query.title() {
            earned += TITLE_WEIGHT * similarity(title, title_part);
            possible += TITLE_WEIGHT;
        }

        if possible == 0.0 {
            0.0
        } else {
            earned / possible * 100.0
        }
    }

    pub fn accepts(&self, score: f64) -> bool {
        score > self.acceptance_threshold
    }

    /// Best-scoring candidate when it clears the threshold, otherwise the first
    /// candidate the search returned, carrying its real (low) score. `None`
    /// only for an empty candidate list.
    pub fn select(
        &self,
        query: &ReleaseQuery,
        candidates: &[CandidateRelease],
        strategy_label: &str,
    ) -> Option<MatchResult> {
        let first = candidates.first()?;

        let mut best: Option<(&CandidateRelease, f64)> = None;
        for candidate in candidates {
            let score = self.score(query, candidate);
            debug!(
                "Candidate {} '{}' scored {:.2}",
                candidate.external_id, candidate.display_title, score
            );
            // strict comparison keeps the earliest candidate on ties
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((candidate, score));
            }
        }

        let (chosen, score) = match best {
            Some((candidate, score)) if self.accepts(score) => {
                info!(
                    "Accepted release {} via {} (score {:.2})",
                    candidate.external_id, strategy_label, score
                );
                metrics::match_accepted(strategy_label);
                (candidate, score)
            }
            _ => {
                let score = self.score(query, first);
                warn!(
                    "No candidate above {:.0}; falling back to first result {} (score {:.2})",
                    self.acceptance_threshold, first.external_id, score
                );
                metrics::match_fallback(strategy_label);
                (first, score)
            }
        };

        Some(MatchResult {
            external_id: chosen.external_id,
            canonical_url: self.catalog.release_url(chosen.external_id),
            strategy_label: strategy_label.to_string(),
            match_score: score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector() -> MatchSelector {
        MatchSelector::new(&MatchingConfig::default(), &CatalogConfig::default())
    }

    fn candidate(id: u64, title: &str, catno: Option<&str>) -> CandidateRelease {
        CandidateRelease {
            external_id: id,
            display_title: title.to_string(),
            catalog_number: catno.map(str::to_string),
        }
    }

    #[test]
    fn identical_candidate_scores_full_and_wins() {
        let query = ReleaseQuery::new(Some("Golden Earring"), Some("Radar Love"), Some("6099 139"));
        let candidates = vec![
            candidate(1, "Golden Girls - Love Radar", Some("XX 1")),
            candidate(2, "Golden Earring - Radar Love", Some("6099 139")),
        ];
        let score = selector().score(&query, &candidates[1]);
        assert!(score >= 99.0, "score was {score}");

        let result = selector().select(&query, &candidates, "catno_exact").unwrap();
        assert_eq!(result.external_id, 2);
        assert_eq!(result.strategy_label, "catno_exact");
        assert_eq!(result.canonical_url, "https://www.discogs.com/release/2");
        assert!(result.match_score >= 99.0);
    }

    #[test]
    fn below_threshold_falls_back_to_first_with_true_score() {
        let query = ReleaseQuery::new(Some("Golden Earring"), Some("Radar Love"), None);
        let candidates = vec![
            candidate(10, "Zz Top - Tres Hombres", None),
            candidate(11, "Kraftwerk - Autobahn", None),
        ];
        let expected = selector().score(&query, &candidates[0]);
        assert!(expected < 50.0);

        let result = selector().select(&query, &candidates, "catch_all").unwrap();
        assert_eq!(result.external_id, 10);
        assert_eq!(result.match_score, expected);
    }

    #[test]
    fn missing_catalog_number_rescales_to_artist_and_title() {
        let query = ReleaseQuery::new(Some("Golden Earring"), Some("Radar Love"), Some(""));
        let score = selector().score(&query, &candidate(5, "Golden Earring - Radar Love", None));
        assert!(score >= 90.0);
    }

    #[test]
    fn empty_candidate_list_selects_nothing() {
        let query = ReleaseQuery::new(Some("a"), Some("b"), None);
        assert!(selector().select(&query, &[], "x").is_none());
    }

    #[test]
    fn threshold_is_exclusive() {
        let s = selector();
        assert!(!s.accepts(50.0));
        assert!(s.accepts(50.01));
    }

    #[test]
    fn catalog_term_ignored_when_candidate_has_none() {
        let query = ReleaseQuery::new(None, None, Some("ABC-123"));
        assert_eq!(selector().score(&query, &candidate(1, "A - B", None)), 0.0);
        let with = selector().score(&query, &candidate(1, "A - B", Some("ABC-123")));
        assert_eq!(with, 100.0);
    }
}
