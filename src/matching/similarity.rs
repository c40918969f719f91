//! Tokenization and Jaccard similarity for fuzzy name matching (§4.5). Chinese supplier
//! names carry no whitespace between words, so tokens are character bigrams rather than
//! whitespace-split words — this degrades gracefully to single-char tokens for short names
//! and to ASCII words for Latin-script names once lowercased and space-split.

use std::collections::HashSet;

/// Lowercases, strips punctuation, and tokenizes. ASCII runs are split on whitespace;
/// everything else (CJK, mixed scripts) is additionally windowed into character bigrams
/// so near-duplicate names sharing most characters score highly even with no word breaks.
pub fn tokenize(name: &str) -> HashSet<String> {
    let normalized: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_lowercase().next().unwrap_or(c) } else { ' ' })
        .collect();

    let mut tokens = HashSet::new();
    for word in normalized.split_whitespace() {
        tokens.insert(word.to_string());
        let chars: Vec<char> = word.chars().collect();
        if chars.len() >= 2 {
            for window in chars.windows(2) {
                tokens.insert(window.iter().collect());
            }
        }
    }
    tokens
}

/// |A ∩ B| / |A ∪ B|; 1.0 for two empty token sets by convention (nothing to disagree on).
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Penalizes matches between names of very different token-set sizes, since two
/// short names sharing a couple of bigrams can otherwise score as high as a true
/// near-duplicate pair of similarly-sized names.
pub fn length_penalty(a_len: usize, b_len: usize) -> f64 {
    if a_len == 0 || b_len == 0 {
        return 0.0;
    }
    let (small, large) = if a_len < b_len { (a_len, b_len) } else { (b_len, a_len) };
    small as f64 / large as f64
}

/// Combined similarity score used by the matching pipeline: raw Jaccard scaled by the
/// length-ratio penalty.
pub fn scored_similarity(a: &str, b: &str) -> f64 {
    let ta = tokenize(a);
    let tb = tokenize(b);
    jaccard(&ta, &tb) * length_penalty(ta.len(), tb.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_score_one() {
        assert_eq!(scored_similarity("USB Keyboard", "USB Keyboard"), 1.0);
    }

    #[test]
    fn disjoint_strings_score_zero() {
        assert_eq!(scored_similarity("Keyboard", "Monitor Stand"), 0.0);
    }

    #[test]
    fn near_duplicate_chinese_names_score_highly() {
        let score = scored_similarity("机械键盘RGB背光", "机械键盘RGB灯光");
        assert!(score > 0.6, "expected high similarity, got {score}");
    }

    #[test]
    fn short_name_does_not_falsely_match_long_unrelated_name() {
        let score = scored_similarity(
            "键盘",
            "键盘支架 机械键盘支架 办公桌键盘托架 人体工学键盘托 可调节高度",
        );
        assert!(score < 0.3, "length penalty should suppress this match, got {score}");
    }

    #[test]
    fn empty_strings_score_one_by_convention() {
        assert_eq!(jaccard(&tokenize(""), &tokenize("")), 1.0);
    }
}
