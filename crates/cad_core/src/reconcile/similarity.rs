use std::collections::BTreeSet;

/// Lower-case, turn `_ - .` into spaces, drop other punctuation, collapse whitespace.
pub fn normalize_field_name(name: &str) -> String {
    let replaced = name
        .to_lowercase()
        .chars()
        .map(|c| if matches!(c, '_' | '-' | '.') { ' ' } else { c })
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Character-level edit distance (insert, delete, substitute all cost 1).
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a = a.chars().collect::<Vec<_>>();
    let b = b.chars().collect::<Vec<_>>();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev = (0..=b.len()).collect::<Vec<_>>();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchBasis {
    Exact,
    SharedWords(Vec<String>),
    EditDistance,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Similarity {
    /// 0..=100
    pub score: u8,
    pub basis: MatchBasis,
}

impl Similarity {
    pub fn reason(&self) -> String {
        match &self.basis {
            MatchBasis::Exact => "Exact name match after normalization".to_string(),
            MatchBasis::SharedWords(words) => format!("Shared words: {}", words.join(", ")),
            MatchBasis::EditDistance => "Similar spelling (edit distance)".to_string(),
            MatchBasis::Empty => "Empty field name".to_string(),
        }
    }
}

fn percent(numerator: f64, denominator: f64) -> u8 {
    if denominator <= 0.0 {
        return 0;
    }
    (numerator / denominator * 100.0).round().clamp(0.0, 100.0) as u8
}

pub fn similarity_detail(a: &str, b: &str) -> Similarity {
    let a = normalize_field_name(a);
    let b = normalize_field_name(b);

    if a == b {
        return Similarity {
            score: 100,
            basis: MatchBasis::Exact,
        };
    }
    if a.is_empty() || b.is_empty() {
        return Similarity {
            score: 0,
            basis: MatchBasis::Empty,
        };
    }

    let words_a = a.split_whitespace().collect::<BTreeSet<_>>();
    let words_b = b.split_whitespace().collect::<BTreeSet<_>>();
    let shared = words_a
        .intersection(&words_b)
        .map(|w| w.to_string())
        .collect::<Vec<_>>();
    if !shared.is_empty() {
        let denom = words_a.len().max(words_b.len());
        return Similarity {
            score: percent(shared.len() as f64, denom as f64),
            basis: MatchBasis::SharedWords(shared),
        };
    }

    let max_len = a.chars().count().max(b.chars().count());
    let distance = levenshtein_distance(&a, &b);
    Similarity {
        score: percent(max_len.saturating_sub(distance) as f64, max_len as f64),
        basis: MatchBasis::EditDistance,
    }
}

/// 0..=100 similarity of two field names.
pub fn similarity(a: &str, b: &str) -> u8 {
    similarity_detail(a, b).score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_strips_punctuation() {
        assert_eq!(normalize_field_name("  Inc_Date-Time.v2 "), "inc date time v2");
        assert_eq!(normalize_field_name("Unit (Arrived)"), "unit arrived");
        assert_eq!(normalize_field_name("a   b"), "a b");
    }

    #[test]
    fn identical_after_normalization_is_100() {
        assert_eq!(similarity("Dispatch_Time", "dispatch time"), 100);
        assert_eq!(similarity("EN-ROUTE", "en route"), 100);
    }

    #[test]
    fn empty_is_zero() {
        assert_eq!(similarity("", "dispatch"), 0);
        assert_eq!(similarity("!!!", "dispatch"), 0);
    }

    #[test]
    fn shared_words_ratio() {
        // {dispatch, time} vs {dispatch, datetime, unit}: 1 / 3
        assert_eq!(similarity("dispatch_time", "dispatch datetime unit"), 33);
        assert_eq!(similarity("alarm time", "alarm"), 50);
    }

    #[test]
    fn edit_distance_fallback() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        // 7 chars, distance 3 -> 57
        assert_eq!(similarity("kitten", "sitting"), 57);
        assert_eq!(similarity("xyz", "abc"), 0);
    }
}
