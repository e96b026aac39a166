//! Distance computation and ranking over a partition's vectors.

/// Squared Euclidean distance between two equal-length vectors.
///
/// Vectors are compared raw, without normalization, so the embedding
/// provider's scale directly determines ranking.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Rank every vector in the partition by ascending distance to the query and
/// keep the `top_k` nearest. Returns `(index, distance)` pairs.
pub fn rank_by_distance(query: &[f32], vectors: &[Vec<f32>], top_k: usize) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| (i, squared_l2(query, v)))
        .collect();
    ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(top_k);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_squared_l2_zero_for_identical() {
        let a = vec![1.0, 2.0, 3.0];
        assert_eq!(squared_l2(&a, &a), 0.0);
    }

    #[test]
    fn test_squared_l2_known_value() {
        let a = vec![0.0, 0.0];
        let b = vec![3.0, 4.0];
        assert_eq!(squared_l2(&a, &b), 25.0);
    }

    #[test]
    fn test_rank_ascending() {
        let query = vec![0.0, 0.0];
        let vectors = vec![vec![5.0, 0.0], vec![1.0, 0.0], vec![3.0, 0.0]];
        let ranked = rank_by_distance(&query, &vectors, 3);
        assert_eq!(
            ranked.iter().map(|(i, _)| *i).collect::<Vec<_>>(),
            vec![1, 2, 0]
        );
    }

    #[test]
    fn test_rank_truncates_to_top_k() {
        let query = vec![0.0];
        let vectors = vec![vec![1.0], vec![2.0], vec![3.0]];
        let ranked = rank_by_distance(&query, &vectors, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].0, 0);
    }

    #[test]
    fn test_rank_with_top_k_beyond_len() {
        let query = vec![0.0];
        let vectors = vec![vec![2.0], vec![1.0]];
        let ranked = rank_by_distance(&query, &vectors, 10);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].0, 1);
    }
}
