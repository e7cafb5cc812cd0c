//! Converting raw script output into suggestions

use rhai::{Dynamic, ImmutableString};

use crate::error::PredictorError;
use crate::types::Suggestion;

/// One validated item of script output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// Plain text, shown without a tooltip
    Text(String),
    /// A fully formed suggestion record
    Suggestion(Suggestion),
}

impl From<Candidate> for Suggestion {
    fn from(candidate: Candidate) -> Self {
        match candidate {
            Candidate::Text(text) => Suggestion::new(text),
            Candidate::Suggestion(suggestion) => suggestion,
        }
    }
}

/// Anything that may turn out to be a [`Candidate`]
pub trait IntoCandidate {
    /// Validate and convert, failing with
    /// [`PredictorError::MalformedOutput`] for unsupported shapes.
    fn into_candidate(self) -> Result<Candidate, PredictorError>;
}

impl IntoCandidate for Candidate {
    fn into_candidate(self) -> Result<Candidate, PredictorError> {
        Ok(self)
    }
}

impl IntoCandidate for String {
    fn into_candidate(self) -> Result<Candidate, PredictorError> {
        Ok(Candidate::Text(self))
    }
}

impl IntoCandidate for Suggestion {
    fn into_candidate(self) -> Result<Candidate, PredictorError> {
        Ok(Candidate::Suggestion(self))
    }
}

impl IntoCandidate for Dynamic {
    fn into_candidate(self) -> Result<Candidate, PredictorError> {
        // Values captured by script closures arrive shared.
        let value = self.flatten();
        let type_name = value.type_name();
        let candidate = if value.is::<Suggestion>() {
            value.try_cast::<Suggestion>().map(Candidate::Suggestion)
        } else if value.is_string() {
            value
                .try_cast::<ImmutableString>()
                .map(|text| Candidate::Text(text.to_string()))
        } else {
            None
        };
        candidate.ok_or_else(|| PredictorError::MalformedOutput {
            type_name: type_name.to_string(),
        })
    }
}

/// Normalize a raw output stream, preserving order.
///
/// Fails on the first unsupported item; no partial result is returned.
pub fn normalize<I>(items: I) -> Result<Vec<Suggestion>, PredictorError>
where
    I: IntoIterator,
    I::Item: IntoCandidate,
{
    items
        .into_iter()
        .map(|item| item.into_candidate().map(Suggestion::from))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_text_wrapped_without_tooltip() {
        let items = vec![Dynamic::from("git status"), Dynamic::from("git stash")];
        let suggestions = normalize(items).unwrap();

        assert_eq!(
            suggestions,
            vec![Suggestion::new("git status"), Suggestion::new("git stash")]
        );
        assert!(suggestions.iter().all(|s| s.tooltip.is_none()));
    }

    #[test]
    fn test_suggestion_passed_through() {
        let suggestion = Suggestion::with_tooltip("cargo test", "run the tests");
        let suggestions = normalize(vec![Dynamic::from(suggestion.clone())]).unwrap();
        assert_eq!(suggestions, vec![suggestion]);
    }

    #[test]
    fn test_mixed_items_keep_order() {
        let items = vec![
            Dynamic::from("one"),
            Dynamic::from(Suggestion::with_tooltip("two", "2")),
            Dynamic::from("three"),
        ];
        let texts: Vec<String> = normalize(items)
            .unwrap()
            .into_iter()
            .map(|s| s.text)
            .collect();
        assert_eq!(texts, ["one", "two", "three"]);
    }

    #[test]
    fn test_empty_input_is_empty_output() {
        let suggestions = normalize(Vec::<Dynamic>::new()).unwrap();
        assert!(suggestions.is_empty());
    }

    #[test]
    fn test_unsupported_type_rejected() {
        let items = vec![Dynamic::from("fine"), Dynamic::from(42_i64)];
        let err = normalize(items).unwrap_err();

        match err {
            PredictorError::MalformedOutput { type_name } => assert_eq!(type_name, "i64"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_native_candidates() {
        let suggestions = normalize(vec![
            "plain".to_string().into_candidate().unwrap(),
            Suggestion::new("record").into_candidate().unwrap(),
        ])
        .unwrap();
        assert_eq!(
            suggestions,
            vec![Suggestion::new("plain"), Suggestion::new("record")]
        );
    }
}
