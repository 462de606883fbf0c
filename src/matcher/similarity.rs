//! Field-level similarity measures used by the episode matcher.
//!
//! Text similarity is a normalized edit ratio over case-folded,
//! punctuation-stripped text; duration similarity is the relative
//! difference between the two lengths. Both range over [0, 1].

/// Lowercase, replace punctuation with spaces, collapse whitespace
pub fn clean_text(text: &str) -> String {
    let lowered: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized edit ratio between two strings after cleaning.
///
/// Empty input on either side scores 0.0; identical cleaned text scores 1.0.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let a = clean_text(a);
    let b = clean_text(b);

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let distance = levenshtein(&a, &b);
    let max_len = a.chars().count().max(b.chars().count());
    1.0 - (distance as f64 / max_len as f64)
}

/// Relative duration similarity: max(0, 1 - |d1 - d2| / max(d1, d2)).
///
/// A zero duration on either side yields 0.0, never a perfect or fatal score.
pub fn duration_similarity(a_ms: u64, b_ms: u64) -> f64 {
    if a_ms == 0 || b_ms == 0 {
        return 0.0;
    }
    let diff = a_ms.abs_diff(b_ms);
    let max = a_ms.max(b_ms);
    (1.0 - diff as f64 / max as f64).max(0.0)
}

/// Character-level Levenshtein edit distance
fn levenshtein(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (m, n) = (a_chars.len(), b_chars.len());

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    // Two-row DP over the edit matrix
    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}
