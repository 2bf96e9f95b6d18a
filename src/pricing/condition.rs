use crate::matching::normalize::normalize_text;
use once_cell::sync::Lazy;
use regex::Regex;

static PARENTHETICAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([^)]*)\)").expect("valid regex"));

/// Equivalence classes for media and sleeve grades. Grades in one class are
/// interchangeable for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionClass {
    Mint,
    VeryGood,
    Good,
    FairPoor,
}

const GRADE_TABLE: &[(&str, ConditionClass)] = &[
    ("mint", ConditionClass::Mint),
    ("m", ConditionClass::Mint),
    ("near mint", ConditionClass::Mint),
    ("nm", ConditionClass::Mint),
    ("nm or m", ConditionClass::Mint),
    ("very good", ConditionClass::VeryGood),
    ("very good plus", ConditionClass::VeryGood),
    ("very good+", ConditionClass::VeryGood),
    ("vg", ConditionClass::VeryGood),
    ("vg+", ConditionClass::VeryGood),
    ("good", ConditionClass::Good),
    ("good plus", ConditionClass::Good),
    ("good+", ConditionClass::Good),
    ("g", ConditionClass::Good),
    ("g+", ConditionClass::Good),
    ("fair", ConditionClass::FairPoor),
    ("f", ConditionClass::FairPoor),
    ("poor", ConditionClass::FairPoor),
    ("p", ConditionClass::FairPoor),
];

/// Lowercased, accent-free, with `-` treated as a space so `M-` and `Near-Mint`
/// line up with the table.
fn normalize_grade(grade: &str) -> String {
    normalize_text(grade)
        .replace('-', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl ConditionClass {
    /// Looks up the whole grade, then any parenthetical abbreviation such as
    /// `Very Good Plus (VG+)`, then the text outside the parentheses.
    pub fn classify(grade: &str) -> Option<Self> {
        let normalized = normalize_grade(grade);
        let inner = PARENTHETICAL_RE
            .captures(&normalized)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string());
        let outer = PARENTHETICAL_RE
            .replace_all(&normalized, "")
            .trim()
            .to_string();

        std::iter::once(normalized.clone())
            .chain(inner)
            .chain(std::iter::once(outer))
            .find_map(|key| lookup(&key))
    }
}

fn lookup(key: &str) -> Option<ConditionClass> {
    GRADE_TABLE
        .iter()
        .find(|(grade, _)| *grade == key)
        .map(|(_, class)| *class)
}

/// Flexible grade comparison: exact, then substring either way, then shared
/// equivalence class. An empty request matches any grade.
pub fn condition_matches(requested: &str, actual: &str) -> bool {
    let requested = normalize_grade(requested);
    let actual = normalize_grade(actual);

    if requested == actual {
        return true;
    }
    if requested.is_empty() {
        return true;
    }
    if actual.is_empty() {
        return false;
    }
    if actual.contains(&requested) || requested.contains(&actual) {
        return true;
    }

    match (
        ConditionClass::classify(&requested),
        ConditionClass::classify(&actual),
    ) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
