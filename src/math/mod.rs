//! Vector math used by every index
//!
//! All functions take slices of `f32` and accumulate in `f64` so that
//! self-similarity stays within `1e-6` of `1.0` for typical embedding sizes.
//! Pairwise functions reject inputs of different length and reject empty
//! inputs; `normalize_vector` is total and returns empty or zero vectors
//! unchanged.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VectorError {
    #[error("Vector dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("Vector must not be empty")]
    Empty,
}

fn check_pair(a: &[f32], b: &[f32]) -> Result<(), VectorError> {
    if a.len() != b.len() {
        return Err(VectorError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    if a.is_empty() {
        return Err(VectorError::Empty);
    }
    Ok(())
}

fn dot_unchecked(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum()
}

fn norm(v: &[f32]) -> f64 {
    v.iter()
        .map(|x| f64::from(*x) * f64::from(*x))
        .sum::<f64>()
        .sqrt()
}

/// Cosine similarity `(a·b) / (|a|·|b|)`.
///
/// Returns `0.0` when either vector has zero norm. The result is not clamped,
/// so rounding may push it marginally outside `[-1, 1]`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, VectorError> {
    check_pair(a, b)?;

    let norm_a = norm(a);
    let norm_b = norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok((dot_unchecked(a, b) / (norm_a * norm_b)) as f32)
}

/// Euclidean (L2) distance, always `>= 0`.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Result<f32, VectorError> {
    check_pair(a, b)?;

    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum();

    Ok(sum.sqrt() as f32)
}

/// Scale `v` to unit length. Zero and empty vectors come back unchanged.
pub fn normalize_vector(v: &[f32]) -> Vec<f32> {
    let n = norm(v);
    if n == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| (f64::from(*x) / n) as f32).collect()
}

/// Inner product.
pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f32, VectorError> {
    check_pair(a, b)?;
    Ok(dot_unchecked(a, b) as f32)
}

/// L2 norm of a vector. Empty vectors have magnitude `0.0`.
pub fn vector_magnitude(v: &[f32]) -> f32 {
    norm(v) as f32
}

/// Check that an embedding is non-empty and has `expected` components.
///
/// A mismatch reports `expected` as `left` and the embedding length as `right`.
pub fn validate_embedding(embedding: &[f32], expected: usize) -> Result<(), VectorError> {
    if embedding.is_empty() {
        return Err(VectorError::Empty);
    }
    if embedding.len() != expected {
        return Err(VectorError::DimensionMismatch {
            left: expected,
            right: embedding.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_cosine_identical() {
        let v = [1.0, 2.0, 3.0];
        assert!(approx(cosine_similarity(&v, &v).unwrap(), 1.0));
    }

    #[test]
    fn test_cosine_orthogonal_and_opposite() {
        assert!(approx(
            cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap(),
            0.0
        ));
        assert!(approx(
            cosine_similarity(&[1.0, 2.0, 3.0], &[-1.0, -2.0, -3.0]).unwrap(),
            -1.0
        ));
    }

    #[test]
    fn test_cosine_zero_norm_is_zero() {
        let score = cosine_similarity(&[0.0, 0.0, 0.0], &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_cosine_known_value() {
        let score = cosine_similarity(&[1.0, 0.0, 0.0, 0.0], &[0.9, 0.1, 0.0, 0.0]).unwrap();
        assert!((score - 0.993_883_7).abs() < 1e-5);
    }

    #[test]
    fn test_euclidean() {
        assert!(approx(euclidean_distance(&[1.0, 2.0], &[1.0, 2.0]).unwrap(), 0.0));
        assert!(approx(
            euclidean_distance(&[1.0, 0.0], &[0.0, 1.0]).unwrap(),
            std::f32::consts::SQRT_2
        ));
        assert!(approx(
            euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]).unwrap(),
            5.0
        ));
        assert!(euclidean_distance(&[-5.0, 2.0], &[7.0, -9.0]).unwrap() >= 0.0);
    }

    #[test]
    fn test_normalize() {
        let n = normalize_vector(&[3.0, 4.0, 0.0]);
        assert!(approx(n[0], 0.6));
        assert!(approx(n[1], 0.8));

        for v in [vec![1.0, 1.0, 1.0], vec![1.0, 2.0, 3.0, 4.0, 5.0]] {
            assert!(approx(vector_magnitude(&normalize_vector(&v)), 1.0));
        }
    }

    #[test]
    fn test_normalize_zero_and_empty_unchanged() {
        assert_eq!(normalize_vector(&[0.0, 0.0]), vec![0.0, 0.0]);
        assert!(normalize_vector(&[]).is_empty());
    }

    #[test]
    fn test_dot_product() {
        assert!(approx(dot_product(&[1.0, 0.0], &[0.0, 1.0]).unwrap(), 0.0));
        assert!(approx(
            dot_product(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]).unwrap(),
            32.0
        ));
    }

    #[test]
    fn test_mismatched_dimensions() {
        let a = [1.0, 2.0, 3.0];
        let b = [1.0, 2.0];
        let expected = VectorError::DimensionMismatch { left: 3, right: 2 };
        assert_eq!(cosine_similarity(&a, &b).unwrap_err(), expected);
        assert_eq!(euclidean_distance(&a, &b).unwrap_err(), expected);
        assert_eq!(dot_product(&a, &b).unwrap_err(), expected);
    }

    #[test]
    fn test_empty_vectors_rejected() {
        assert_eq!(cosine_similarity(&[], &[]).unwrap_err(), VectorError::Empty);
        assert_eq!(euclidean_distance(&[], &[]).unwrap_err(), VectorError::Empty);
        assert_eq!(dot_product(&[], &[]).unwrap_err(), VectorError::Empty);
        assert_eq!(vector_magnitude(&[]), 0.0);
    }

    #[test]
    fn test_validate_embedding() {
        assert!(validate_embedding(&[0.1, 0.2, 0.3], 3).is_ok());
        assert_eq!(
            validate_embedding(&[0.1, 0.2], 3).unwrap_err(),
            VectorError::DimensionMismatch { left: 3, right: 2 }
        );
        assert_eq!(validate_embedding(&[], 3).unwrap_err(), VectorError::Empty);
        assert_eq!(validate_embedding(&[], 0).unwrap_err(), VectorError::Empty);
    }
}
