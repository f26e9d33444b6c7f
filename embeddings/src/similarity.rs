//! Similarity computation for embeddings.

use ordered_float::OrderedFloat;

use crate::error::{EmbeddingError, Result};

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical vectors
/// - 0.0 means orthogonal vectors
/// - -1.0 means opposite vectors
///
/// This is `1 - cosine_distance`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot_product / (magnitude_a * magnitude_b))
}

/// An item paired with its similarity to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored<T> {
    pub item: T,
    pub score: f32,
}

/// Score every candidate against `query`, keep those with
/// `score >= min_score`, and return them best first.
///
/// Ties keep candidate order. `k` of `None` keeps every qualifying
/// candidate, which callers use when a post-filter still has to run.
pub fn rank_by_similarity<'a, T, I>(
    query: &[f32],
    candidates: I,
    k: Option<usize>,
    min_score: f32,
) -> Result<Vec<Scored<T>>>
where
    I: IntoIterator<Item = (T, &'a [f32])>,
{
    let mut scores: Vec<(OrderedFloat<f32>, T)> = Vec::new();

    for (item, embedding) in candidates {
        let score = cosine_similarity(query, embedding)?;
        if score >= min_score {
            scores.push((OrderedFloat(score), item));
        }
    }

    // Stable sort: equal scores keep insertion order.
    scores.sort_by(|a, b| b.0.cmp(&a.0));

    Ok(scores
        .into_iter()
        .take(k.unwrap_or(usize::MAX))
        .map(|(score, item)| Scored {
            item,
            score: score.0,
        })
        .collect())
}

/// Normalize an embedding to unit length.
pub fn normalize(embedding: &mut [f32]) {
    let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for x in embedding.iter_mut() {
            *x /= magnitude;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((sim - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![-1.0, 0.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((sim - (-1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let sim = cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).unwrap();
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!(cosine_similarity(&a, &b).is_err());
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_rank_by_similarity() {
        let query = vec![1.0, 0.0, 0.0];
        let a = vec![1.0, 0.0, 0.0]; // similarity 1.0
        let b = vec![0.0, 1.0, 0.0]; // similarity 0.0
        let c = vec![0.7, 0.7, 0.0]; // similarity ~0.7
        let candidates = vec![("a", a.as_slice()), ("b", b.as_slice()), ("c", c.as_slice())];

        let results = rank_by_similarity(&query, candidates, Some(2), 0.0).unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.item).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_rank_threshold_is_inclusive() {
        let query = vec![1.0, 0.0];
        let same = vec![1.0, 0.0];
        let results =
            rank_by_similarity(&query, vec![(1, same.as_slice())], None, 1.0).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_zero_threshold_admits_orthogonal_rows() {
        let query = vec![1.0, 0.0];
        let orthogonal = vec![0.0, 1.0];
        let opposite = vec![-1.0, 0.0];
        let results = rank_by_similarity(
            &query,
            vec![(1, orthogonal.as_slice()), (2, opposite.as_slice())],
            None,
            0.0,
        )
        .unwrap();
        assert_eq!(results.iter().map(|r| r.item).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_raising_threshold_never_grows_results() {
        let query = vec![1.0, 0.2, 0.0];
        let rows: Vec<Vec<f32>> = (0..20)
            .map(|i| vec![(i as f32 / 10.0).cos(), (i as f32 / 10.0).sin(), 0.1])
            .collect();
        let mut previous = usize::MAX;
        for step in 0..=10 {
            let threshold = -1.0 + step as f32 * 0.2;
            let count = rank_by_similarity(
                &query,
                rows.iter().enumerate().map(|(i, r)| (i, r.as_slice())),
                None,
                threshold,
            )
            .unwrap()
            .len();
            assert!(count <= previous);
            previous = count;
        }
    }
}
