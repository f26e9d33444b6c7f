//! The embedding vector type and input text cleaning.

use serde::{Deserialize, Serialize};

/// Model tag of the sentinel vector returned for input that is empty after cleaning.
pub const EMPTY_TEXT_MODEL: &str = "empty-text";

/// Model tag of the sentinel vector returned while vectorization is disabled.
pub const DISABLED_MODEL: &str = "disabled";

/// Hard cap on cleaned input length, in characters.
pub const MAX_INPUT_CHARS: usize = 8000;

/// A dense embedding tagged with the model that produced it.
///
/// The dimensionality is always `values.len()`, so a vector can never claim a
/// shape it does not have.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingVector {
    values: Vec<f32>,
    model: String,
}

impl EmbeddingVector {
    /// Create a vector from raw values.
    pub fn new(values: Vec<f32>, model: impl Into<String>) -> Self {
        Self {
            values,
            model: model.into(),
        }
    }

    /// Zero-dimension vector that carries no signal.
    pub fn empty(model: impl Into<String>) -> Self {
        Self::new(Vec::new(), model)
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dimensions(&self) -> usize {
        self.values.len()
    }

    /// True for the zero-dimension sentinels (`empty-text`, `disabled`).
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether two vectors live in the same embedding space.
    pub fn is_comparable_to(&self, other: &EmbeddingVector) -> bool {
        self.model == other.model && self.dimensions() == other.dimensions()
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }
}

/// Collapse whitespace runs to single spaces and trim, without truncating.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse whitespace runs, trim, and cap the result at [`MAX_INPUT_CHARS`].
pub fn clean_text(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len().min(MAX_INPUT_CHARS * 4));
    let mut chars = 0usize;

    for word in text.split_whitespace() {
        if chars > 0 {
            if chars == MAX_INPUT_CHARS {
                break;
            }
            cleaned.push(' ');
            chars += 1;
        }
        for c in word.chars() {
            if chars == MAX_INPUT_CHARS {
                return cleaned;
            }
            cleaned.push(c);
            chars += 1;
        }
    }

    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  hello \n\t  world  "), "hello world");
    }

    #[test]
    fn test_collapse_whitespace_keeps_length() {
        let text = "word ".repeat(5000);
        assert_eq!(collapse_whitespace(&text).len(), 5000 * 5 - 1);
    }

    #[test]
    fn test_clean_text_whitespace_only_is_empty() {
        assert_eq!(clean_text(" \n\t "), "");
    }

    #[test]
    fn test_clean_text_truncates_in_chars() {
        let text = "é".repeat(MAX_INPUT_CHARS + 50);
        let cleaned = clean_text(&text);
        assert_eq!(cleaned.chars().count(), MAX_INPUT_CHARS);
    }

    #[test]
    fn test_clean_text_truncation_never_ends_with_space() {
        let word = "a".repeat(MAX_INPUT_CHARS);
        let cleaned = clean_text(&format!("{word} tail"));
        assert_eq!(cleaned, word);
    }

    #[test]
    fn test_vector_dimensions_follow_values() {
        let v = EmbeddingVector::new(vec![0.1, 0.2, 0.3], "m");
        assert_eq!(v.dimensions(), 3);
        assert!(!v.is_empty());
        assert!(EmbeddingVector::empty(EMPTY_TEXT_MODEL).is_empty());
    }

    #[test]
    fn test_comparable_requires_same_model() {
        let a = EmbeddingVector::new(vec![1.0, 0.0], "a");
        let b = EmbeddingVector::new(vec![1.0, 0.0], "b");
        assert!(!a.is_comparable_to(&b));
        assert!(a.is_comparable_to(&a.clone()));
    }
}
