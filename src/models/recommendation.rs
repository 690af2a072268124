use serde::{Deserialize, Serialize};

use super::MovieIndex;
use crate::error::{AppError, AppResult};

/// A ranked recommendation
///
/// Scores come from cosine similarity or blends of it, so they are not
/// guaranteed to fall within [0, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub index: MovieIndex,
    pub score: f32,
}

impl Recommendation {
    pub fn new(index: MovieIndex, score: f32) -> Self {
        Self { index, score }
    }
}

/// Sorts by descending score; equal scores keep their current order
pub fn sort_by_score(recommendations: &mut [Recommendation]) {
    recommendations.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Result of a two-user session, partitioned into three disjoint buckets
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CollaborativeRecommendations {
    pub user1: Vec<Recommendation>,
    pub user2: Vec<Recommendation>,
    pub intersection: Vec<Recommendation>,
}

impl CollaborativeRecommendations {
    /// All recommended indices, bucket by bucket
    pub fn indices(&self) -> Vec<MovieIndex> {
        self.user1
            .iter()
            .chain(&self.user2)
            .chain(&self.intersection)
            .map(|r| r.index)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.user1.len() + self.user2.len() + self.intersection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Share of a collaborative selection given to each bucket
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SplitWeights {
    pub user1: f64,
    pub user2: f64,
    pub intersection: f64,
}

/// Integer bucket sizes derived from [`SplitWeights`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BucketSizes {
    pub user1: usize,
    pub user2: usize,
    pub intersection: usize,
}

impl BucketSizes {
    pub fn total(&self) -> usize {
        self.user1 + self.user2 + self.intersection
    }
}

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

impl Default for SplitWeights {
    fn default() -> Self {
        Self {
            user1: 0.30,
            user2: 0.30,
            intersection: 0.40,
        }
    }
}

impl SplitWeights {
    /// Creates split weights, rejecting negative weights or a sum other than 1
    pub fn new(user1: f64, user2: f64, intersection: f64) -> AppResult<Self> {
        let weights = [user1, user2, intersection];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(AppError::InvalidInput(
                "Split weights must be non-negative numbers".to_string(),
            ));
        }

        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(AppError::InvalidInput(format!(
                "Split weights must sum to 1.0, got {}",
                sum
            )));
        }

        Ok(Self {
            user1,
            user2,
            intersection,
        })
    }

    /// Splits `total` into bucket sizes
    ///
    /// The two user buckets are floored and the intersection bucket takes the
    /// remainder, so the sizes always add up to `total`.
    pub fn allocate(&self, total: usize) -> BucketSizes {
        let user1 = ((total as f64) * self.user1).floor() as usize;
        let user1 = user1.min(total);
        let user2 = ((total as f64) * self.user2).floor() as usize;
        let user2 = user2.min(total - user1);

        BucketSizes {
            user1,
            user2,
            intersection: total - user1 - user2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_split_for_fifteen() {
        let sizes = SplitWeights::default().allocate(15);
        assert_eq!(
            sizes,
            BucketSizes {
                user1: 4,
                user2: 4,
                intersection: 7
            }
        );
    }

    #[test]
    fn test_allocation_always_sums_to_total() {
        let weights = SplitWeights::default();
        for total in 0..200 {
            assert_eq!(weights.allocate(total).total(), total);
        }

        let skewed = SplitWeights::new(0.7, 0.3, 0.0).unwrap();
        for total in 0..200 {
            assert_eq!(skewed.allocate(total).total(), total);
        }
    }

    #[test]
    fn test_allocate_zero() {
        assert_eq!(SplitWeights::default().allocate(0).total(), 0);
    }

    #[test]
    fn test_invalid_weights_rejected() {
        assert!(SplitWeights::new(0.5, 0.5, 0.5).is_err());
        assert!(SplitWeights::new(-0.2, 0.6, 0.6).is_err());
        assert!(SplitWeights::new(f64::NAN, 0.5, 0.5).is_err());
    }

    #[test]
    fn test_sort_by_score_is_stable() {
        let mut recs = vec![
            Recommendation::new(1, 0.5),
            Recommendation::new(2, 0.9),
            Recommendation::new(3, 0.5),
            Recommendation::new(4, 0.7),
        ];
        sort_by_score(&mut recs);

        let order: Vec<MovieIndex> = recs.iter().map(|r| r.index).collect();
        assert_eq!(order, vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_collaborative_indices() {
        let recs = CollaborativeRecommendations {
            user1: vec![Recommendation::new(1, 0.9)],
            user2: vec![Recommendation::new(2, 0.8)],
            intersection: vec![Recommendation::new(3, 0.7), Recommendation::new(4, 0.6)],
        };
        assert_eq!(recs.indices(), vec![1, 2, 3, 4]);
        assert_eq!(recs.len(), 4);
    }
}
