//! Pure genetic operators over portfolio weight vectors.
//!
//! Every operator returns a freshly owned vector and re-normalizes its
//! output, so raw offspring are always simplex points even when the
//! arithmetic in between wanders outside.

use rand::Rng;
use statrs::distribution::Normal;

use crate::consts::WEIGHT_SUM_TOLERANCE;

/// Maps an arbitrary real vector onto the probability simplex: negative
/// components are clipped to zero, then the rest is rescaled to sum to 1.
/// A vector with no positive mass falls back to the uniform allocation.
pub fn normalize(weights: &[f64]) -> Vec<f64> {
    let clipped: Vec<f64> = weights.iter().map(|w| w.max(0.0)).collect();
    let total: f64 = clipped.iter().sum();
    if total > 0.0 {
        clipped.into_iter().map(|w| w / total).collect()
    } else {
        vec![1.0 / weights.len() as f64; weights.len()]
    }
}

/// Blend crossover: one mixing coefficient is drawn per child and applied
/// elementwise, `child = alpha * p1 + (1 - alpha) * p2`.
pub fn blend_crossover<R: Rng>(rng: &mut R, parent_1: &[f64], parent_2: &[f64]) -> Vec<f64> {
    let alpha: f64 = rng.gen_range(0.0..1.0);
    let child: Vec<f64> = parent_1
        .iter()
        .zip(parent_2.iter())
        .map(|(&weight_1, &weight_2)| alpha * weight_1 + (1.0 - alpha) * weight_2)
        .collect();
    normalize(&child)
}

/// Perturbs each component independently with probability `rate` by adding
/// Gaussian noise drawn from `noise`, then re-normalizes.
pub fn mutate<R: Rng>(rng: &mut R, weights: &[f64], rate: f64, noise: &Normal) -> Vec<f64> {
    let mutated: Vec<f64> = weights
        .iter()
        .map(|&w| {
            if rng.gen::<f64>() < rate {
                w + rng.sample(noise)
            } else {
                w
            }
        })
        .collect();
    normalize(&mutated)
}

/// Feasibility predicate: every component within `[min_weight, max_weight]`
/// and the component sum within tolerance of 1.
pub fn is_valid(weights: &[f64], min_weight: f64, max_weight: f64) -> bool {
    let total: f64 = weights.iter().sum();
    weights
        .iter()
        .all(|&w| w >= min_weight && w <= max_weight)
        && (total - 1.0).abs() < WEIGHT_SUM_TOLERANCE
}

/// Hard projection onto the bounded simplex: clamp every component into
/// `[min_weight, max_weight]`, then shift the residual mass across the
/// components that still have slack.
///
/// Terminates with a feasible vector whenever the bounds admit one, i.e.
/// `min_weight * n <= 1 <= max_weight * n`.
pub fn project_to_bounds(weights: &[f64], min_weight: f64, max_weight: f64) -> Vec<f64> {
    let mut projected = normalize(weights);
    for _ in 0..projected.len() {
        for w in projected.iter_mut() {
            *w = w.clamp(min_weight, max_weight);
        }
        let excess: f64 = projected.iter().sum::<f64>() - 1.0;
        if excess.abs() < WEIGHT_SUM_TOLERANCE {
            break;
        }
        if excess > 0.0 {
            let slack: f64 = projected.iter().map(|w| w - min_weight).sum();
            if slack <= 0.0 {
                break;
            }
            for w in projected.iter_mut() {
                *w -= excess * (*w - min_weight) / slack;
            }
        } else {
            let slack: f64 = projected.iter().map(|w| max_weight - w).sum();
            if slack <= 0.0 {
                break;
            }
            for w in projected.iter_mut() {
                *w += (-excess) * (max_weight - *w) / slack;
            }
        }
    }
    projected
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn assert_simplex(weights: &[f64]) {
        assert!(weights.iter().all(|&w| w >= 0.0));
        assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_clips_negatives_then_rescales() {
        let normalized = normalize(&[-1.0, 2.0, 3.0]);
        assert_eq!(normalized, vec![0.0, 0.4, 0.6]);
    }

    #[test]
    fn normalize_falls_back_to_uniform_on_zero_mass() {
        assert_eq!(normalize(&[0.0, 0.0, 0.0, 0.0]), vec![0.25; 4]);
        assert_eq!(normalize(&[-0.3, -0.7]), vec![0.5, 0.5]);
    }

    #[test]
    fn normalize_single_asset_is_always_one() {
        assert_eq!(normalize(&[0.37]), vec![1.0]);
        assert_eq!(normalize(&[0.0]), vec![1.0]);
    }

    #[test]
    fn crossover_of_identical_parents_is_identity() {
        let mut rng = StdRng::seed_from_u64(7);
        let parent = vec![0.25, 0.25, 0.5];
        let child = blend_crossover(&mut rng, &parent, &parent);
        for (c, p) in child.iter().zip(parent.iter()) {
            assert!((c - p).abs() < 1e-12);
        }
    }

    #[test]
    fn crossover_stays_between_parents_and_on_simplex() {
        let mut rng = StdRng::seed_from_u64(11);
        let parent_1 = vec![0.6, 0.3, 0.1];
        let parent_2 = vec![0.1, 0.4, 0.5];
        for _ in 0..50 {
            let child = blend_crossover(&mut rng, &parent_1, &parent_2);
            assert_simplex(&child);
            for ((c, a), b) in child.iter().zip(&parent_1).zip(&parent_2) {
                assert!(*c >= a.min(*b) - 1e-12 && *c <= a.max(*b) + 1e-12);
            }
        }
    }

    #[test]
    fn mutation_output_is_a_simplex_point() {
        let mut rng = StdRng::seed_from_u64(13);
        let noise = Normal::new(0.0, 0.05).unwrap();
        let weights = vec![0.2; 5];
        for _ in 0..50 {
            let mutated = mutate(&mut rng, &weights, 1.0, &noise);
            assert_simplex(&mutated);
        }
    }

    #[test]
    fn zero_rate_mutation_is_identity() {
        let mut rng = StdRng::seed_from_u64(17);
        let noise = Normal::new(0.0, 0.05).unwrap();
        let weights = vec![0.3, 0.3, 0.4];
        assert_eq!(mutate(&mut rng, &weights, 0.0, &noise), weights);
    }

    #[test]
    fn validity_checks_bounds_and_sum() {
        assert!(is_valid(&[0.3, 0.3, 0.4], 0.05, 0.5));
        // Component above the upper bound.
        assert!(!is_valid(&[0.6, 0.2, 0.2], 0.05, 0.5));
        // Component below the lower bound.
        assert!(!is_valid(&[0.02, 0.49, 0.49], 0.05, 0.5));
        // Sum drifts outside the tolerance.
        assert!(!is_valid(&[0.4, 0.4, 0.4], 0.05, 0.5));
        // Drift just inside the tolerance is accepted.
        assert!(is_valid(&[0.3, 0.3, 0.405], 0.05, 0.5));
    }

    #[test]
    fn projection_lands_inside_the_bounds() {
        let projected = project_to_bounds(&[0.9, 0.05, 0.05], 0.05, 0.5);
        assert!(is_valid(&projected, 0.05 - 1e-9, 0.5 + 1e-9));
        assert!((projected.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn projection_raises_starved_components() {
        let projected = project_to_bounds(&[1.0, 0.0, 0.0, 0.0], 0.05, 0.5);
        assert!(is_valid(&projected, 0.05 - 1e-9, 0.5 + 1e-9));
        assert!(projected.iter().skip(1).all(|&w| w >= 0.05 - 1e-9));
    }
}
