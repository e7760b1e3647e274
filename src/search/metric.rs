//! Distance metrics and the score normalizer.
//!
//! Every similarity source orders ascending by distance ("smaller is closer").
//! Inner product follows the pgvector convention and is reported negated so
//! that the ascending order holds for it too.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    L2,
    InnerProduct,
}

impl DistanceMetric {
    /// Distance between two vectors under this metric. `None` when the
    /// dimensions differ or a vector is empty.
    pub fn distance(self, a: &[f32], b: &[f32]) -> Option<f32> {
        if a.len() != b.len() || a.is_empty() {
            return None;
        }
        let d = match self {
            DistanceMetric::Cosine => 1.0 - cosine_similarity(a, b),
            DistanceMetric::L2 => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
            DistanceMetric::InnerProduct => -dot(a, b),
        };
        Some(d)
    }

    /// Convert a raw distance into a "higher is better" score.
    ///
    /// Cosine and L2 map `0 → 1` and decay towards 0 as the distance grows.
    /// Inner-product distances are already negated by the source, so negating
    /// again restores the raw similarity.
    pub fn normalize(self, distance: f32) -> f32 {
        match self {
            DistanceMetric::Cosine | DistanceMetric::L2 => 1.0 / (1.0 + distance),
            DistanceMetric::InnerProduct => -distance,
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::L2 => "l2",
            DistanceMetric::InnerProduct => "inner_product",
        })
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "l2" | "euclidean" => Ok(DistanceMetric::L2),
            "inner_product" | "inner-product" | "ip" => Ok(DistanceMetric::InnerProduct),
            other => Err(format!("unknown distance metric: {other}")),
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_vectors_score_one() {
        let v = [0.3, 0.4, 0.5];
        for metric in [DistanceMetric::Cosine, DistanceMetric::L2] {
            let d = metric.distance(&v, &v).unwrap();
            assert!(d.abs() < 1e-6, "{metric}: {d}");
            assert!((metric.normalize(d) - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_normalized_score_bounds_and_monotonicity() {
        for metric in [DistanceMetric::Cosine, DistanceMetric::L2] {
            let mut prev = f32::INFINITY;
            for step in 0..200 {
                let distance = step as f32 * 0.25;
                let score = metric.normalize(distance);
                assert!(score > 0.0 && score <= 1.0);
                assert!(score < prev, "{metric} not strictly decreasing at {distance}");
                prev = score;
            }
        }
    }

    #[test]
    fn test_inner_product_negates() {
        assert_eq!(DistanceMetric::InnerProduct.normalize(-0.8), 0.8);
        // negative distances are accepted as-is
        assert_eq!(DistanceMetric::InnerProduct.normalize(0.25), -0.25);
        let d = DistanceMetric::InnerProduct
            .distance(&[1.0, 2.0], &[3.0, 4.0])
            .unwrap();
        assert_eq!(d, -11.0);
    }

    #[test]
    fn test_cosine_distance_orthogonal_and_opposite() {
        let d = DistanceMetric::Cosine
            .distance(&[1.0, 0.0], &[0.0, 1.0])
            .unwrap();
        assert!((d - 1.0).abs() < 1e-6);
        let d = DistanceMetric::Cosine
            .distance(&[1.0, 0.0], &[-1.0, 0.0])
            .unwrap();
        assert!((d - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_distance() {
        let d = DistanceMetric::L2.distance(&[0.0, 0.0], &[3.0, 4.0]).unwrap();
        assert!((d - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_dimension_mismatch() {
        assert!(DistanceMetric::Cosine.distance(&[1.0], &[1.0, 2.0]).is_none());
        assert!(DistanceMetric::L2.distance(&[], &[]).is_none());
    }

    #[test]
    fn test_parse_metric() {
        assert_eq!("COSINE".parse::<DistanceMetric>().unwrap(), DistanceMetric::Cosine);
        assert_eq!("inner-product".parse::<DistanceMetric>().unwrap(), DistanceMetric::InnerProduct);
        assert!("manhattan".parse::<DistanceMetric>().is_err());
    }
}
