/// Cosine similarity over embedding vectors.
///
/// The relevance, trend and uniqueness signals all compare vectors through these
/// two functions, so the three signals share identical numeric semantics.
/// Accumulation is done in f64 regardless of the f32 storage type.

use crate::errors::HotScoreError;

/// Cosine similarity of two equal-length vectors, in [-1, 1].
///
/// Returns exactly 0.0 when either vector has zero norm.
/// Fails with `DimensionMismatch` when the lengths differ; vectors are never truncated.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, HotScoreError> {
    if a.len() != b.len() {
        return Err(HotScoreError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Best match of `query` against a collection of reference vectors.
///
/// The running maximum starts at 0.0: an empty collection yields 0.0 and a
/// collection of only anti-correlated vectors never reports a negative maximum.
pub fn max_similarity<V>(query: &[f32], references: &[V]) -> Result<f64, HotScoreError>
where
    V: AsRef<[f32]>,
{
    let mut best = 0.0_f64;
    for reference in references {
        best = best.max(cosine_similarity(query, reference.as_ref())?);
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_vectors() {
        let v = [1.0_f32, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v).unwrap();
        assert!((sim - 1.0).abs() < 1e-9, "sim was {}", sim);
    }

    #[test]
    fn test_opposite_vectors() {
        let sim = cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]).unwrap();
        assert!((sim + 1.0).abs() < 1e-9, "sim was {}", sim);
    }

    #[test]
    fn test_orthogonal_vectors() {
        let sim = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert!(sim.abs() < 1e-12);
    }

    #[test]
    fn test_magnitude_is_ignored() {
        let sim = cosine_similarity(&[1.0, 1.0], &[10.0, 10.0]).unwrap();
        assert!((sim - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_vector_is_exactly_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0, 0.0], &[1.0, 2.0, 3.0]).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0, 3.0], &[0.0, 0.0, 0.0]).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&[0.0], &[0.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        match cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]) {
            Err(HotScoreError::DimensionMismatch { left, right }) => {
                assert_eq!((left, right), (2, 3));
            }
            other => panic!("expected DimensionMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_max_similarity_empty_is_zero() {
        let refs: Vec<Vec<f32>> = Vec::new();
        assert_eq!(max_similarity(&[1.0, 0.0], &refs).unwrap(), 0.0);
    }

    #[test]
    fn test_max_similarity_picks_best_match() {
        let refs: Vec<Vec<f32>> = vec![vec![0.0, 1.0], vec![1.0, 0.1], vec![-1.0, 0.0]];
        let best = max_similarity(&[1.0, 0.0], &refs).unwrap();
        let expected = cosine_similarity(&[1.0, 0.0], &[1.0, 0.1]).unwrap();
        assert!((best - expected).abs() < 1e-12);
    }

    #[test]
    fn test_max_similarity_floors_at_zero() {
        let refs: Vec<Vec<f32>> = vec![vec![-1.0, 0.0]];
        assert_eq!(max_similarity(&[1.0, 0.0], &refs).unwrap(), 0.0);
    }

    #[test]
    fn test_max_similarity_propagates_mismatch() {
        let refs: Vec<Vec<f32>> = vec![vec![1.0, 0.0], vec![1.0, 0.0, 0.0]];
        assert!(matches!(
            max_similarity(&[1.0, 0.0], &refs),
            Err(HotScoreError::DimensionMismatch { .. })
        ));
    }
}
