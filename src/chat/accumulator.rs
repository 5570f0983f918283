//! Fold over a stream of partial results.
//!
//! The accumulator is a plain value: each step consumes it and returns the
//! next one, so the merge logic can be exercised without a controller.

use futures::{Stream, TryStreamExt, future};

use crate::chat::sources::dedup_sources;
use crate::chat::types::Source;
use crate::llm::{CitationFragment, GenerationResult, PartialResult};

/// Final, immutable result of one streamed turn.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TurnOutput {
    /// Concatenation of every text fragment, in delivery order.
    pub text: String,
    /// Deduplicated sources, in first-appearance order.
    pub sources: Vec<Source>,
}

/// Running state of a streamed turn.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StreamAccumulator {
    text: String,
    citations: Vec<CitationFragment>,
}

impl StreamAccumulator {
    /// Empty accumulator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            text: String::new(),
            citations: Vec::new(),
        }
    }

    /// Merge one partial result. Text is appended; citations are collected raw.
    #[must_use]
    pub fn apply(mut self, partial: PartialResult) -> Self {
        if let Some(fragment) = partial.text_fragment {
            self.text.push_str(&fragment);
        }
        self.citations.extend(partial.citation_fragments);
        self
    }

    /// Text accumulated so far.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Close the turn, deduplicating the collected citations.
    #[must_use]
    pub fn finish(self) -> TurnOutput {
        let sources = dedup_sources(&self.citations);
        TurnOutput {
            text: self.text,
            sources,
        }
    }
}

/// Drain a partial-result stream into a [`TurnOutput`].
///
/// `on_step` sees the accumulator after every merged partial.
///
/// # Errors
/// Returns the first error the stream yields; nothing accumulated is kept.
pub async fn fold_stream<S, F>(stream: S, mut on_step: F) -> GenerationResult<TurnOutput>
where
    S: Stream<Item = GenerationResult<PartialResult>>,
    F: FnMut(&StreamAccumulator),
{
    let accumulator = stream
        .try_fold(StreamAccumulator::new(), |acc, partial| {
            let acc = acc.apply(partial);
            on_step(&acc);
            future::ready(Ok(acc))
        })
        .await?;
    Ok(accumulator.finish())
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use super::*;
    use crate::llm::GenerationError;

    #[test]
    fn test_text_is_concatenated_in_order() {
        let fragments = ["Zama ", "builds ", "", "FHE ", "tools."];
        let acc = fragments
            .iter()
            .fold(StreamAccumulator::new(), |acc, f| acc.apply(PartialResult::text(*f)));
        assert_eq!(acc.text(), "Zama builds FHE tools.");
        assert_eq!(acc.finish().text, fragments.concat());
    }

    #[test]
    fn test_partials_without_text_keep_text_unchanged() {
        let acc = StreamAccumulator::new()
            .apply(PartialResult::text("a"))
            .apply(PartialResult::citations(vec![CitationFragment::new("u", "t")]))
            .apply(PartialResult::default());
        assert_eq!(acc.text(), "a");
        assert_eq!(acc.finish().sources.len(), 1);
    }

    #[test]
    fn test_sources_are_deduplicated_on_finish() {
        let acc = StreamAccumulator::new()
            .apply(PartialResult::citations(vec![
                CitationFragment::new("a", "T1"),
                CitationFragment::new("b", "T2"),
            ]))
            .apply(PartialResult::citations(vec![
                CitationFragment::new("a", "T3"),
                CitationFragment::new("c", "T4"),
                CitationFragment::new("b", "T5"),
            ]));
        let output = acc.finish();
        let uris: Vec<&str> = output.sources.iter().map(|s| s.uri.as_str()).collect();
        let titles: Vec<&str> = output.sources.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(uris, ["a", "b", "c"]);
        assert_eq!(titles, ["T1", "T2", "T4"]);
    }

    #[tokio::test]
    async fn test_fold_stream_success() {
        let items = vec![
            Ok(PartialResult::text("one ")),
            Ok(PartialResult {
                text_fragment: Some("two".to_string()),
                citation_fragments: vec![CitationFragment::new("https://docs.zama.ai", "Docs")],
            }),
        ];
        let mut seen = Vec::new();
        let output = fold_stream(stream::iter(items), |acc| seen.push(acc.text().to_string()))
            .await
            .unwrap_or_default();
        assert_eq!(seen, ["one ", "one two"]);
        assert_eq!(output.text, "one two");
        assert_eq!(output.sources.len(), 1);
    }

    #[tokio::test]
    async fn test_fold_stream_stops_at_first_error() {
        let items = vec![
            Ok(PartialResult::text("partial")),
            Err(GenerationError::Api {
                status: 500,
                message: "boom".to_string(),
            }),
            Ok(PartialResult::text("never")),
        ];
        let mut steps = 0;
        let result = fold_stream(stream::iter(items), |_| steps += 1).await;
        assert_eq!(steps, 1);
        assert!(matches!(result, Err(GenerationError::Api { status: 500, .. })));
    }
}
