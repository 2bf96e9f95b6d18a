//! DOM-level checks on a fetched release page: anti-bot challenge detection and
//! the JSON-LD offer block the catalog embeds for search engines.

use scraper::{Html, Selector};
use serde_json::Value;

const CHALLENGE_TITLES: &[&str] = &[
    "just a moment",
    "attention required",
    "access denied",
    "please verify you are a human",
];

const CHALLENGE_SELECTORS: &str =
    "#challenge-form, #challenge-running, .cf-browser-verification, #px-captcha";

/// Offer summary from the page's `AggregateOffer` JSON-LD.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OfferSummary {
    pub offer_count: Option<u32>,
}

/// True when the page is an interstitial (Cloudflare, PerimeterX) rather than
/// the release page. Such pages arrive with HTTP 200 but mean "blocked".
pub fn is_challenge_page(html: &str) -> bool {
    let document = Html::parse_document(html);

    if let Ok(title_selector) = Selector::parse("title") {
        let title = document
            .select(&title_selector)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_lowercase())
            .unwrap_or_default();
        if CHALLENGE_TITLES.iter().any(|marker| title.starts_with(marker)) {
            return true;
        }
    }

    Selector::parse(CHALLENGE_SELECTORS)
        .map(|selector| document.select(&selector).next().is_some())
        .unwrap_or(false)
}

/// Reads the first `AggregateOffer` found in any JSON-LD script block.
pub fn offer_summary(html: &str) -> Option<OfferSummary> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;

    document.select(&selector).find_map(|script| {
        let raw = script.text().collect::<String>();
        let value: Value = serde_json::from_str(raw.trim()).ok()?;
        find_aggregate_offer(&value).map(summarize)
    })
}

fn find_aggregate_offer(value: &Value) -> Option<&Value> {
    match value {
        Value::Object(map) => {
            if map.get("@type").and_then(Value::as_str) == Some("AggregateOffer") {
                return Some(value);
            }
            map.get("offers")
                .and_then(find_aggregate_offer)
                .or_else(|| map.get("@graph").and_then(find_aggregate_offer))
        }
        Value::Array(items) => items.iter().find_map(find_aggregate_offer),
        _ => None,
    }
}

fn summarize(offer: &Value) -> OfferSummary {
    OfferSummary {
        offer_count: number_field(offer, "offerCount").map(|n| n.max(0.0) as u32),
    }
}

// JSON-LD producers are loose about quoting numbers.
fn number_field(offer: &Value, key: &str) -> Option<f64> {
    match offer.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
