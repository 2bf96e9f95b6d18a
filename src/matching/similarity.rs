use super::normalize::normalize_text;

/// Normalized edit-distance similarity in `[0.0, 1.0]` between the comparison
/// forms of `a` and `b`. Two empty strings are fully similar; one empty side
/// scores zero.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize_text(a);
    let b = normalize_text(b);

    if a == b {
        return 1.0;
    }

    let len_a = a.chars().count();
    let len_b = b.chars().count();
    if len_a == 0 || len_b == 0 {
        return 0.0;
    }

    let max_len = len_a.max(len_b);
    let distance = strsim::levenshtein(&a, &b);
    1.0 - (distance as f64 / max_len as f64)
}
