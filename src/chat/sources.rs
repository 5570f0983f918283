//! Citation deduplication.

use std::collections::HashSet;

use crate::chat::types::Source;
use crate::llm::CitationFragment;

/// Collapse citation fragments into a source list unique by URI.
///
/// The first occurrence of a URI wins and keeps its position. Fragments
/// without a URI are skipped; a missing or empty title falls back to the URI.
#[must_use]
pub fn dedup_sources<'a, I>(citations: I) -> Vec<Source>
where
    I: IntoIterator<Item = &'a CitationFragment>,
{
    let mut seen = HashSet::new();
    citations
        .into_iter()
        .filter_map(|citation| {
            let uri = citation.uri.as_deref().filter(|uri| !uri.is_empty())?;
            seen.insert(uri)
                .then(|| Source::new(uri, citation.title.as_deref()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_occurrence_wins_and_order_is_kept() {
        let citations = vec![
            CitationFragment::new("a", "T1"),
            CitationFragment::new("b", "T2"),
            CitationFragment::new("a", "T3"),
            CitationFragment::new("c", "T4"),
            CitationFragment::new("b", "T5"),
        ];

        let sources = dedup_sources(&citations);
        assert_eq!(
            sources,
            vec![
                Source::new("a", Some("T1")),
                Source::new("b", Some("T2")),
                Source::new("c", Some("T4")),
            ]
        );
    }

    #[test]
    fn test_title_falls_back_to_uri() {
        let citations = vec![
            CitationFragment {
                uri: Some("https://docs.zama.ai/one".to_string()),
                title: None,
            },
            CitationFragment::new("https://docs.zama.ai/two", ""),
        ];

        let sources = dedup_sources(&citations);
        assert_eq!(sources[0].title, "https://docs.zama.ai/one");
        assert_eq!(sources[1].title, "https://docs.zama.ai/two");
    }

    #[test]
    fn test_citations_without_uri_are_skipped() {
        let citations = vec![
            CitationFragment {
                uri: None,
                title: Some("orphan".to_string()),
            },
            CitationFragment::new("", "empty"),
            CitationFragment::new("https://docs.zama.ai", "Docs"),
        ];

        let sources = dedup_sources(&citations);
        assert_eq!(sources, vec![Source::new("https://docs.zama.ai", Some("Docs"))]);
    }

    #[test]
    fn test_empty_input() {
        assert!(dedup_sources(&Vec::<CitationFragment>::new()).is_empty());
    }
}
