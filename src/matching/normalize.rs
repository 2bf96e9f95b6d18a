use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Comparison form of a string: diacritics stripped (NFD, then combining marks
/// dropped), lowercased and trimmed. Never stored as the canonical value.
pub fn normalize_text(input: &str) -> String {
    input
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .trim()
        .to_string()
}
