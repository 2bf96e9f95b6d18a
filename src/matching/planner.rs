use super::catalog_number::catalog_variants;
use super::normalize::normalize_text;
use crate::common::constants::*;
use crate::common::types::{ReleaseQuery, SearchStrategy};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Builds the ordered list of search attempts for a query.
///
/// Rules, in priority order:
/// 1. one exact `catno` lookup per catalog variant
/// 2. artist + title text (raw and normalized) filtered by each catalog variant
/// 3. artist + title text (raw and normalized) without a catalog filter, plus a
///    structured `artist`/`release_title` lookup
/// 4. a catch-all text query over whatever fields are present
///
/// Identical `(query text, params)` pairs are emitted once, at their first priority.
#[derive(Debug, Default, Clone, Copy)]
pub struct SearchStrategyPlanner;

impl SearchStrategyPlanner {
    pub fn new() -> Self {
        Self
    }

    pub fn plan(&self, query: &ReleaseQuery) -> Vec<SearchStrategy> {
        let mut plan = PlanBuilder::default();

        let artist = query.artist();
        let title = query.title();
        let variants = query
            .catalog_number()
            .map(catalog_variants)
            .unwrap_or_default();

        for variant in &variants {
            plan.push("", params(&[(PARAM_CATNO, variant)]), LABEL_CATNO_EXACT, 1);
        }

        if let (Some(artist), Some(title)) = (artist, title) {
            let raw = format!("{} {}", artist.trim(), title.trim());
            let normalized = format!("{} {}", normalize_text(artist), normalize_text(title));

            for variant in &variants {
                let filter = params(&[(PARAM_CATNO, variant)]);
                plan.push(&raw, filter.clone(), LABEL_ARTIST_TITLE_CATNO, 2);
                plan.push(&normalized, filter, LABEL_ARTIST_TITLE_CATNO_NORMALIZED, 2);
            }

            plan.push(&raw, BTreeMap::new(), LABEL_ARTIST_TITLE, 3);
            plan.push(&normalized, BTreeMap::new(), LABEL_ARTIST_TITLE_NORMALIZED, 3);
            plan.push(
                "",
                params(&[(PARAM_ARTIST, artist.trim()), (PARAM_RELEASE_TITLE, title.trim())]),
                LABEL_ARTIST_TITLE_FIELDS,
                3,
            );
        }

        if artist.is_some() || title.is_some() {
            let catch_all = [artist, title, query.catalog_number()]
                .into_iter()
                .flatten()
                .map(str::trim)
                .collect::<Vec<_>>()
                .join(" ");
            plan.push(&catch_all, BTreeMap::new(), LABEL_CATCH_ALL, 4);
            plan.push(
                &normalize_text(&catch_all),
                BTreeMap::new(),
                LABEL_CATCH_ALL_NORMALIZED,
                4,
            );
        }

        let strategies = plan.finish();
        debug!("Planned {} search strategies", strategies.len());
        strategies
    }
}

fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[derive(Default)]
struct PlanBuilder {
    strategies: Vec<SearchStrategy>,
    seen: HashSet<(String, BTreeMap<String, String>)>,
}

impl PlanBuilder {
    fn push(&mut self, query_text: &str, params: BTreeMap<String, String>, label: &str, priority: u8) {
        if query_text.trim().is_empty() && params.is_empty() {
            return;
        }
        let key = (query_text.to_string(), params);
        if self.seen.contains(&key) {
            return;
        }
        self.strategies
            .push(SearchStrategy::new(key.0.clone(), key.1.clone(), label, priority));
        self.seen.insert(key);
    }

    fn finish(mut self) -> Vec<SearchStrategy> {
        // stable: keeps insertion order within a priority
        self.strategies.sort_by_key(SearchStrategy::priority);
        self.strategies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn priorities(plan: &[SearchStrategy]) -> Vec<u8> {
        plan.iter().map(SearchStrategy::priority).collect()
    }

    #[test]
    fn catalog_only_uses_rule_one() {
        let plan = SearchStrategyPlanner::new().plan(&ReleaseQuery::new(None, None, Some("ABC-123")));
        assert!(!plan.is_empty());
        assert!(plan.iter().all(|s| s.priority() == 1));
        assert!(plan.iter().all(|s| s.label() == LABEL_CATNO_EXACT));
        assert!(plan.iter().any(|s| s.param(PARAM_CATNO) == Some("ABC123")));
        assert_eq!(plan.len(), catalog_variants("ABC-123").len());
    }

    #[test]
    fn artist_and_title_only_uses_rules_three_and_four() {
        let plan = SearchStrategyPlanner::new().plan(&ReleaseQuery::new(
            Some("Golden Earring"),
            Some("Radar Love"),
            None,
        ));
        assert!(plan.iter().all(|s| s.priority() >= 3));
        assert!(plan
            .iter()
            .any(|s| s.query_text() == "Golden Earring Radar Love" && s.label() == LABEL_ARTIST_TITLE));
        assert!(plan.iter().any(|s| s.query_text() == "golden earring radar love"));
        assert!(plan.iter().any(|s| s.param(PARAM_RELEASE_TITLE) == Some("Radar Love")));
    }

    #[test]
    fn full_query_orders_rules() {
        let plan = SearchStrategyPlanner::new().plan(&ReleaseQuery::new(
            Some("Golden Earring"),
            Some("Radar Love"),
            Some("6099 139"),
        ));
        let prios = priorities(&plan);
        let mut sorted = prios.clone();
        sorted.sort();
        assert_eq!(prios, sorted);
        assert!(prios.contains(&1));
        assert!(prios.contains(&2));
        assert!(prios.contains(&3));
        assert!(prios.contains(&4));

        let rule_two: Vec<_> = plan.iter().filter(|s| s.priority() == 2).collect();
        assert!(rule_two.iter().all(|s| s.param(PARAM_CATNO).is_some()));
        assert!(rule_two.iter().any(|s| s.label() == LABEL_ARTIST_TITLE_CATNO_NORMALIZED));
    }

    #[test]
    fn no_duplicate_query_param_pairs() {
        let plan = SearchStrategyPlanner::new().plan(&ReleaseQuery::new(
            Some("abba"),
            Some("gold"),
            Some("POLD 5050"),
        ));
        let mut seen = HashSet::new();
        for s in &plan {
            assert!(
                seen.insert((s.query_text().to_string(), s.structured_params().clone())),
                "duplicate strategy {:?}",
                s
            );
        }
        // "abba gold" is already lowercase, so the normalized twin collapses away
        assert!(!plan.iter().any(|s| s.label() == LABEL_ARTIST_TITLE_NORMALIZED));
    }

    #[test]
    fn title_only_gets_catch_all() {
        let plan = SearchStrategyPlanner::new().plan(&ReleaseQuery::new(None, Some("Radar Love"), None));
        assert_eq!(priorities(&plan), vec![4, 4]);
        assert_eq!(plan[0].query_text(), "Radar Love");
        assert_eq!(plan[1].query_text(), "radar love");
    }

    #[test]
    fn empty_query_plans_nothing() {
        assert!(SearchStrategyPlanner::new().plan(&ReleaseQuery::default()).is_empty());
    }
}
