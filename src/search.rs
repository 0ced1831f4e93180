//! Fuzzy lookup of link paths by edit distance

use serde::Serialize;

/// Hits further than this from the query are dropped
pub const MAX_DISTANCE: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub key: String,
    /// Levenshtein distance to the query; lower is closer
    pub score: usize,
}

/// Rank `keys` against `query`, closest first.
///
/// Ties are broken by key so results are stable.
pub fn search<I, S>(query: &str, keys: I) -> Vec<SearchHit>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut hits: Vec<SearchHit> = keys
        .into_iter()
        .map(Into::into)
        .filter_map(|key: String| {
            let score = strsim::levenshtein(query, &key);
            (score <= MAX_DISTANCE).then_some(SearchHit { key, score })
        })
        .collect();

    hits.sort_by(|a, b| a.score.cmp(&b.score).then_with(|| a.key.cmp(&b.key)));
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_first() {
        let hits = search("docs", ["dogs", "docs", "docker"]);
        assert_eq!(hits[0], SearchHit { key: "docs".to_string(), score: 0 });
        assert_eq!(hits[1].key, "dogs");
        assert_eq!(hits[1].score, 1);
    }

    #[test]
    fn test_distant_keys_dropped() {
        let hits = search("mail", ["calendar", "mail", "email"]);
        let keys: Vec<_> = hits.iter().map(|h| h.key.as_str()).collect();
        assert_eq!(keys, vec!["mail", "email"]);
    }

    #[test]
    fn test_ties_sorted_by_key() {
        let hits = search("ab", ["bb", "aa", "cb"]);
        let keys: Vec<_> = hits.iter().map(|h| h.key.as_str()).collect();
        assert_eq!(keys, vec!["aa", "bb", "cb"]);
    }

    #[test]
    fn test_no_keys() {
        assert!(search("x", Vec::<String>::new()).is_empty());
    }
}
