use crate::models::{DecisionRecord, Evidence};

/// Tokens of this many characters or fewer are ignored.
const MIN_TOKEN_CHARS: usize = 2;

/// Lowercased whitespace tokens longer than two characters.
pub fn tokenize(question: &str) -> Vec<String> {
    question
        .split_whitespace()
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() > MIN_TOKEN_CHARS)
        .collect()
}

/// Conjunctive substring search.
///
/// A record matches only if its lowercased message contains every token.
/// Matches are ranked by the character position of the earliest token
/// occurrence, earlier first, and scored `1 / (1 + position)`.
pub fn lexical_search(records: &[DecisionRecord], question: &str) -> Vec<Evidence> {
    let tokens = tokenize(question);
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut matched: Vec<(usize, &DecisionRecord)> = records
        .iter()
        .filter_map(|r| {
            let haystack = r.message.to_lowercase();
            let mut earliest = usize::MAX;
            for token in &tokens {
                let byte_pos = haystack.find(token.as_str())?;
                earliest = earliest.min(haystack[..byte_pos].chars().count());
            }
            Some((earliest, r))
        })
        .collect();

    matched.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.sequence.cmp(&b.1.sequence)));

    matched
        .into_iter()
        .map(|(position, r)| Evidence {
            hash: r.hash.clone(),
            message: r.message.clone(),
            score: 1.0 / (1.0 + position as f32),
        })
        .collect()
}
