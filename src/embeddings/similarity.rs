//! Vector math used for ranking: cosine similarity, averaging, top-k and the
//! two-user intersection search.

use crate::error::VectorError;

/// Embedding vector
pub type Embedding = Vec<f32>;

fn check_dimensions(a: &[f32], b: &[f32]) -> Result<(), VectorError> {
    if a.len() != b.len() {
        return Err(VectorError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(())
}

/// Cosine similarity between two vectors of equal length
///
/// Returns 0.0 when either vector has zero magnitude. Accumulates in f64 and
/// clamps to [-1, 1] to absorb rounding.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, VectorError> {
    check_dimensions(a, b)?;

    let mut dot: f64 = 0.0;
    let mut norm_a: f64 = 0.0;
    let mut norm_b: f64 = 0.0;

    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return Ok(0.0);
    }

    let result = dot / denom;
    if !result.is_finite() {
        return Ok(0.0);
    }
    Ok(result.clamp(-1.0, 1.0) as f32)
}

/// Elementwise mean of `vectors`, or their weighted mean when `weights` is given
pub fn average_vectors<V: AsRef<[f32]>>(
    vectors: &[V],
    weights: Option<&[f32]>,
) -> Result<Embedding, VectorError> {
    let first = vectors.first().ok_or(VectorError::EmptyInput)?.as_ref();
    let dimension = first.len();

    if let Some(weights) = weights {
        if weights.len() != vectors.len() {
            return Err(VectorError::DimensionMismatch {
                expected: vectors.len(),
                actual: weights.len(),
            });
        }
    }

    let mut sum = vec![0.0f64; dimension];
    let mut total_weight: f64 = 0.0;

    for (i, vector) in vectors.iter().enumerate() {
        let vector = vector.as_ref();
        check_dimensions(first, vector)?;

        let weight = weights.map(|w| w[i] as f64).unwrap_or(1.0);
        total_weight += weight;
        for (acc, &value) in sum.iter_mut().zip(vector) {
            *acc += value as f64 * weight;
        }
    }

    if total_weight == 0.0 {
        return Err(VectorError::InvalidWeights);
    }

    Ok(sum.into_iter().map(|v| (v / total_weight) as f32).collect())
}

/// Ranks candidates by similarity to `query`
///
/// Returns `(position in candidates, similarity)` pairs, best first, at most
/// `k` of them. Equal scores keep input order.
pub fn top_k_by_similarity<V: AsRef<[f32]>>(
    query: &[f32],
    candidates: &[V],
    k: usize,
) -> Result<Vec<(usize, f32)>, VectorError> {
    let mut scored = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| cosine_similarity(query, c.as_ref()).map(|s| (i, s)))
        .collect::<Result<Vec<_>, _>>()?;

    sort_scored(&mut scored);
    scored.truncate(k);
    Ok(scored)
}

/// Finds candidates close to both groups
///
/// Each group is averaged into one vector. A candidate qualifies only if its
/// similarity to *both* averages reaches `threshold`; its score is the mean of
/// the two similarities. Returns `(position in candidates, score)` pairs, best
/// first, at most `k`, possibly none.
pub fn intersection_by_similarity<V: AsRef<[f32]>>(
    group1: &[V],
    group2: &[V],
    candidates: &[V],
    threshold: f32,
    k: usize,
) -> Result<Vec<(usize, f32)>, VectorError> {
    let avg1 = average_vectors(group1, None)?;
    let avg2 = average_vectors(group2, None)?;

    let mut results = Vec::new();
    for (i, candidate) in candidates.iter().enumerate() {
        let candidate = candidate.as_ref();
        let sim1 = cosine_similarity(&avg1, candidate)?;
        let sim2 = cosine_similarity(&avg2, candidate)?;

        if sim1 >= threshold && sim2 >= threshold {
            results.push((i, (sim1 + sim2) / 2.0));
        }
    }

    sort_scored(&mut results);
    results.truncate(k);
    Ok(results)
}

/// Stable descending sort on the score component
pub(crate) fn sort_scored<T>(scored: &mut [(T, f32)]) {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    #[test]
    fn test_identical_vectors() {
        let v = vec![1.0f32, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v).unwrap() - 1.0).abs() < EPS);
    }

    #[test]
    fn test_orthogonal_vectors() {
        let sim = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert!(sim.abs() < EPS);
    }

    #[test]
    fn test_opposite_vectors() {
        let sim = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]).unwrap();
        assert!((sim + 1.0).abs() < EPS);
    }

    #[test]
    fn test_symmetry() {
        let pairs = [
            (vec![0.3f32, -1.2, 4.0], vec![2.0f32, 0.5, -0.7]),
            (vec![1.0, 1.0, 1.0], vec![0.1, 0.2, 0.3]),
            (vec![-5.0, 2.5, 0.0], vec![3.0, 3.0, 3.0]),
        ];
        for (a, b) in pairs {
            let ab = cosine_similarity(&a, &b).unwrap();
            let ba = cosine_similarity(&b, &a).unwrap();
            assert!((ab - ba).abs() < EPS);
        }
    }

    #[test]
    fn test_zero_magnitude_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&[], &[]).unwrap(), 0.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        assert_eq!(
            cosine_similarity(&[1.0], &[1.0, 2.0]),
            Err(VectorError::DimensionMismatch {
                expected: 1,
                actual: 2
            })
        );
    }

    #[test]
    fn test_average_single_vector_is_identity() {
        let v = vec![0.25f32, -3.0, 7.5];
        assert_eq!(average_vectors(&[v.clone()], None).unwrap(), v);
    }

    #[test]
    fn test_average_empty_input() {
        let empty: Vec<Embedding> = vec![];
        assert_eq!(average_vectors(&empty, None), Err(VectorError::EmptyInput));
    }

    #[test]
    fn test_average_unweighted() {
        let avg = average_vectors(&[vec![1.0f32, 0.0], vec![3.0, 2.0]], None).unwrap();
        assert_eq!(avg, vec![2.0, 1.0]);
    }

    #[test]
    fn test_average_weighted() {
        let avg =
            average_vectors(&[vec![1.0f32, 0.0], vec![4.0, 3.0]], Some(&[2.0f32, 1.0][..])).unwrap();
        assert!((avg[0] - 2.0).abs() < EPS);
        assert!((avg[1] - 1.0).abs() < EPS);
    }

    #[test]
    fn test_average_rejects_mismatched_inputs() {
        assert!(matches!(
            average_vectors(&[vec![1.0f32], vec![1.0, 2.0]], None),
            Err(VectorError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            average_vectors(&[vec![1.0f32]], Some(&[1.0f32, 2.0][..])),
            Err(VectorError::DimensionMismatch { .. })
        ));
        assert_eq!(
            average_vectors(&[vec![1.0f32]], Some(&[0.0f32][..])),
            Err(VectorError::InvalidWeights)
        );
    }

    #[test]
    fn test_top_k_bounds_and_membership() {
        let candidates = vec![
            vec![1.0f32, 0.0],
            vec![0.0, 1.0],
            vec![0.7, 0.7],
            vec![-1.0, 0.0],
        ];
        let results = top_k_by_similarity(&[1.0, 0.0], &candidates, 2).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 0);
        assert_eq!(results[1].0, 2);
        assert!(results.iter().all(|(i, _)| *i < candidates.len()));

        let all = top_k_by_similarity(&[1.0, 0.0], &candidates, 10).unwrap();
        assert_eq!(all.len(), candidates.len());
    }

    #[test]
    fn test_top_k_ties_keep_input_order() {
        let candidates = vec![vec![0.0f32, 1.0], vec![1.0, 0.0], vec![1.0, 0.0]];
        let results = top_k_by_similarity(&[1.0, 0.0], &candidates, 3).unwrap();
        let order: Vec<usize> = results.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_intersection_requires_both_users() {
        let group1 = vec![vec![1.0f32, 0.0]];
        let group2 = vec![vec![1.0f32, 0.0]];
        let candidates = vec![vec![1.0f32, 0.0], vec![0.0, 1.0]];

        let results = intersection_by_similarity(&group1, &group2, &candidates, 0.5, 10).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, 0);
        assert!((results[0].1 - 1.0).abs() < EPS);
    }

    #[test]
    fn test_intersection_rejects_one_sided_matches() {
        let group1 = vec![vec![1.0f32, 0.0]];
        let group2 = vec![vec![0.0f32, 1.0]];
        let candidates = vec![vec![1.0f32, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]];

        let results = intersection_by_similarity(&group1, &group2, &candidates, 0.6, 10).unwrap();

        // Only the diagonal clears 0.6 against both averages (~0.707 each)
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, 2);
        for (i, _) in results {
            let c = &candidates[i];
            assert!(cosine_similarity(&group1[0], c).unwrap() >= 0.6);
            assert!(cosine_similarity(&group2[0], c).unwrap() >= 0.6);
        }
    }

    #[test]
    fn test_intersection_empty_when_nothing_qualifies() {
        let group1 = vec![vec![1.0f32, 0.0]];
        let group2 = vec![vec![-1.0f32, 0.0]];
        let candidates = vec![vec![1.0f32, 0.0], vec![-1.0, 0.0]];

        let results = intersection_by_similarity(&group1, &group2, &candidates, 0.1, 10).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_intersection_truncates_to_k() {
        let group = vec![vec![1.0f32, 0.0]];
        let candidates = vec![vec![1.0f32, 0.0], vec![1.0, 0.1], vec![1.0, 0.2]];

        let results = intersection_by_similarity(&group, &group, &candidates, 0.0, 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 0);
        assert_eq!(results[1].0, 1);
    }
}
