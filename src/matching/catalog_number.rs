use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

const SEPARATORS: [char; 3] = ['.', '-', '_'];

static SEPARATOR_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.\-_]+").expect("valid regex"));
static SEPARATOR_CHAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.\-_]").expect("valid regex"));
static RELEASE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/release/(\d+)").expect("valid regex"));
static RELEASE_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[r(\d+)\]$").expect("valid regex"));

/// Spelling variants of a catalog number as printed on different pressings.
/// Callers rely on membership only; iteration order carries no meaning.
pub fn catalog_variants(catalog_number: &str) -> BTreeSet<String> {
    let original = catalog_number.trim();
    let mut variants = BTreeSet::new();
    if original.is_empty() {
        return variants;
    }

    variants.insert(original.to_string());
    variants.insert(original.chars().filter(|c| !c.is_whitespace()).collect());
    variants.insert(
        original
            .chars()
            .filter(|c| !c.is_whitespace() && !SEPARATORS.contains(c))
            .collect(),
    );

    let words: Vec<&str> = original.split_whitespace().collect();
    let collapsed = collapse_whitespace(&SEPARATOR_RUN.replace_all(original, " "));
    for separator in SEPARATORS {
        let separator = separator.to_string();
        variants.insert(words.join(&separator));
        variants.insert(collapsed.replace(' ', &separator));
    }
    variants.insert(collapsed);

    let spaced = SEPARATOR_CHAR.replace_all(original, " $0 ");
    variants.insert(collapse_whitespace(&spaced));

    variants.retain(|v| !v.is_empty());
    variants
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Pulls a release id out of a release URL, a `[r12345]` reference or a bare number.
pub fn release_id_from_reference(reference: &str) -> Option<u64> {
    let reference = reference.trim();
    if let Ok(id) = reference.parse::<u64>() {
        return Some(id);
    }
    RELEASE_PATH
        .captures(reference)
        .or_else(|| RELEASE_REF.captures(reference))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
