use super::anchors::{default_anchors, AnchorMatcher};
use crate::common::constants::{MAX_ACCEPTED_PRICE, MIN_ACCEPTED_PRICE};
use crate::common::error::{DiggerError, Result};
use crate::common::types::{Currency, PriceStatistics};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));

// `<label>: <optional markup> <optional symbol> <number> <optional trailing symbol>`
const FIELD_TAIL: &str = r"\s*:\s*(?:<[^>]*>\s*)*([$€£])?\s*(\d+(?:[.,]\d+)*)\s*([$€£])?";

static LOW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\blow(?:est)?{}", FIELD_TAIL)).expect("valid regex")
});
static MEDIAN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\bmedian{}", FIELD_TAIL)).expect("valid regex")
});
static HIGH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\bhigh(?:est)?{}", FIELD_TAIL)).expect("valid regex")
});

const ENTITIES: &[(&str, &str)] = &[
    ("&euro;", "€"),
    ("&#8364;", "€"),
    ("&#x20ac;", "€"),
    ("&#x20AC;", "€"),
    ("&pound;", "£"),
    ("&#163;", "£"),
    ("&#xa3;", "£"),
    ("&#36;", "$"),
    ("&dollar;", "$"),
    ("&#x24;", "$"),
    ("&nbsp;", " "),
    ("&#160;", " "),
    ("&#xa0;", " "),
];

/// One labeled field as captured from the statistics window.
#[derive(Debug, Clone, PartialEq)]
struct Field {
    value: f64,
    currency: Option<Currency>,
}

/// Pulls low/median/high sale prices out of the statistics region of a release page.
#[derive(Debug)]
pub struct PriceStatisticsExtractor {
    anchors: Vec<Box<dyn AnchorMatcher>>,
    window_chars: usize,
}

impl PriceStatisticsExtractor {
    pub fn new(window_chars: usize) -> Self {
        Self::with_anchors(default_anchors(), window_chars)
    }

    pub fn with_anchors(anchors: Vec<Box<dyn AnchorMatcher>>, window_chars: usize) -> Self {
        Self {
            anchors,
            window_chars,
        }
    }

    /// The bounded markup window after the first anchor that matches, in
    /// matcher priority order.
    pub fn locate_region<'a>(&self, html: &'a str) -> Option<&'a str> {
        let (anchor, offset) = self
            .anchors
            .iter()
            .find_map(|anchor| anchor.find(html).map(|offset| (anchor, offset)))?;
        debug!("Statistics region anchored by '{}' at {}", anchor.name(), offset);

        let rest = &html[offset..];
        let end = rest
            .char_indices()
            .nth(self.window_chars)
            .map_or(rest.len(), |(idx, _)| idx);
        Some(&rest[..end])
    }

    /// `Err(ExtractionNotFound)` when no anchor matches. A region with no
    /// parseable prices is `Ok` with every price `None`.
    pub fn extract(&self, html: &str) -> Result<PriceStatistics> {
        let region = self
            .locate_region(html)
            .ok_or(DiggerError::ExtractionNotFound)?;
        let cleaned = clean_region(region);

        let low = capture_field(&LOW_RE, &cleaned);
        let median = capture_field(&MEDIAN_RE, &cleaned);
        let high = capture_field(&HIGH_RE, &cleaned);

        let currency = low
            .as_ref()
            .and_then(|f| f.currency)
            .unwrap_or_default();

        Ok(PriceStatistics {
            lowest: low.map(|f| f.value),
            median: median.map(|f| f.value),
            highest: high.map(|f| f.value),
            currency,
            num_for_sale: 0,
        })
    }
}

/// Drops markup comments and decodes the entities the catalog uses around prices.
pub fn clean_region(region: &str) -> String {
    let mut cleaned = COMMENT_RE.replace_all(region, "").into_owned();
    for (entity, replacement) in ENTITIES {
        if cleaned.contains(entity) {
            cleaned = cleaned.replace(entity, replacement);
        }
    }
    cleaned
}

// First occurrence whose number parses into the accepted price range.
fn capture_field(pattern: &Regex, text: &str) -> Option<Field> {
    pattern.captures_iter(text).find_map(|caps| {
        let value = parse_price_number(caps.get(2)?.as_str())?;
        let currency = caps
            .get(1)
            .or_else(|| caps.get(3))
            .and_then(|m| m.as_str().chars().next())
            .and_then(Currency::from_symbol);
        Some(Field { value, currency })
    })
}

/// Parses `1,234.56`, `1.234,56`, `12,50` and `0.96` style numbers. Returns
/// `None` outside the exclusive (0, 10000) price range.
pub fn parse_price_number(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let last_dot = raw.rfind('.');
    let last_comma = raw.rfind(',');

    let normalized = match (last_dot, last_comma) {
        (Some(dot), Some(comma)) if dot > comma => raw.replace(',', ""),
        (Some(_), Some(_)) => raw.replace('.', "").replace(',', "."),
        (None, Some(comma)) => {
            let decimals = raw.len() - comma - 1;
            let is_grouping = raw.matches(',').count() > 1
                || (decimals == 3 && !raw.starts_with("0,"));
            if is_grouping {
                raw.replace(',', "")
            } else {
                raw.replace(',', ".")
            }
        }
        (Some(_), None) if raw.matches('.').count() > 1 => raw.replace('.', ""),
        _ => raw.to_string(),
    };

    let value: f64 = normalized.parse().ok()?;
    (value > MIN_ACCEPTED_PRICE && value < MAX_ACCEPTED_PRICE).then_some(value)
}
