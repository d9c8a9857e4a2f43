//! Projected gradient descent on the fitted quadratic surface.

use serde::{Deserialize, Serialize};
use tracing::debug;

use rsm_types::{
    evaluate_quadratic, quadratic_gradient, Bounds, DesignPoint, OptimizationResult,
    NUM_COEFFICIENTS,
};

/// Step and stopping parameters for [`minimize_quadratic`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescentSettings {
    pub learning_rate: f64,
    pub max_iterations: usize,
    /// Stop once the projected step is shorter than this.
    pub tolerance: f64,
    /// Starting point. Not adjusted to the bounds.
    pub start: DesignPoint,
}

impl Default for DescentSettings {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            max_iterations: 100,
            tolerance: 1e-6,
            start: DesignPoint::center(),
        }
    }
}

/// Minimise the quadratic with the default settings, inside `bounds`
/// (the unit square when `None`).
pub fn optimize_from_model(
    coefficients: &[f64; NUM_COEFFICIENTS],
    bounds: Option<&Bounds>,
) -> OptimizationResult {
    let bounds = bounds.copied().unwrap_or_default();
    minimize_quadratic(coefficients, &bounds, &DescentSettings::default())
}

/// Fixed-step gradient descent with every iterate clipped into `bounds`.
///
/// A step shorter than the tolerance ends the run as converged. The reported
/// point is always a projected iterate, so it lies inside `bounds` even when
/// the start point does not. Running out of iterations reports the last
/// iterate with `converged = false`.
pub fn minimize_quadratic(
    coefficients: &[f64; NUM_COEFFICIENTS],
    bounds: &Bounds,
    settings: &DescentSettings,
) -> OptimizationResult {
    let mut x = settings.start;
    let mut iterations = 0;
    let mut converged = false;

    for i in 0..settings.max_iterations {
        iterations = i + 1;

        let [g1, g2] = quadratic_gradient(coefficients, &x);
        let stepped = DesignPoint::new(
            x.x1() - settings.learning_rate * g1,
            x.x2() - settings.learning_rate * g2,
        );
        let projected = stepped.clamp_to(bounds);

        let step = projected.distance(&x);
        x = projected;
        if step < settings.tolerance {
            converged = true;
            break;
        }
    }

    let optimal_value = evaluate_quadratic(coefficients, &x);
    debug!(
        iterations,
        converged,
        optimal_value,
        "gradient descent finished at {x}"
    );

    OptimizationResult {
        optimal_point: x,
        optimal_value,
        iterations,
        converged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bowl_at_origin_is_clipped_to_corner() {
        let result = optimize_from_model(&[2.0, 2.0, 0.0, 0.0, 0.0, 0.0], None);
        assert!(result.converged);
        assert!(result.iterations < 100);
        assert!(result.optimal_point.x1().abs() < 1e-5);
        assert!(result.optimal_point.x2().abs() < 1e-5);
        assert!(result.optimal_point.x1() >= 0.0 && result.optimal_point.x2() >= 0.0);
    }

    #[test]
    fn interior_convex_bowl_reaches_analytic_minimum() {
        // (x1 - 0.3)² + (x2 - 0.6)² + 0.5·(x1 - 0.3)(x2 - 0.6), expanded.
        let (a, b, c) = (1.0, 1.0, 0.5);
        let d = -2.0 * a * 0.3 - c * 0.6;
        let e = -2.0 * b * 0.6 - c * 0.3;
        let coefficients = [a, b, c, d, e, 0.0];

        let result = optimize_from_model(&coefficients, None);
        assert!(result.converged);
        assert!(result.iterations < 100);
        assert!((result.optimal_point.x1() - 0.3).abs() < 1e-4);
        assert!((result.optimal_point.x2() - 0.6).abs() < 1e-4);
    }

    #[test]
    fn tighter_tolerance_gets_closer() {
        let coefficients = [1.0, 1.0, 0.0, -0.8, -0.8, 0.0]; // minimum at (0.4, 0.4)
        let loose = DescentSettings {
            tolerance: 1e-3,
            ..DescentSettings::default()
        };
        let tight = DescentSettings {
            tolerance: 1e-9,
            max_iterations: 1000,
            ..DescentSettings::default()
        };
        let coarse = minimize_quadratic(&coefficients, &Bounds::unit(), &loose);
        let fine = minimize_quadratic(&coefficients, &Bounds::unit(), &tight);

        let target = DesignPoint::new(0.4, 0.4);
        assert!(fine.optimal_point.distance(&target) < coarse.optimal_point.distance(&target));
        assert!(fine.optimal_point.distance(&target) < 1e-8);
    }

    #[test]
    fn deterministic_for_identical_input() {
        let coefficients = [0.6, 0.9, 1.1, -0.4, -1.3, 0.2];
        let bounds = Bounds::from_pairs((0.1, 0.9), (0.0, 0.7)).unwrap();
        let first = optimize_from_model(&coefficients, Some(&bounds));
        let second = optimize_from_model(&coefficients, Some(&bounds));
        assert_eq!(first, second);
    }

    #[test]
    fn result_respects_bounds() {
        let bounds = Bounds::from_pairs((0.6, 0.8), (0.1, 0.2)).unwrap();
        let cases = [
            [1.0, 1.0, 0.0, 0.0, 0.0, 0.0],
            [-1.0, -2.0, 0.3, 0.5, -0.5, 1.0],
            [0.0, 0.0, 0.0, 5.0, -5.0, 0.0],
            [3.0, 0.5, -2.0, -1.0, 2.0, 0.0],
        ];
        for coefficients in cases {
            for b in [None, Some(&bounds)] {
                let result = optimize_from_model(&coefficients, b);
                let active = b.copied().unwrap_or_default();
                assert!(
                    result.optimal_point.within(&active),
                    "{} outside bounds for {coefficients:?}",
                    result.optimal_point
                );
            }
        }
    }

    #[test]
    fn start_point_ignores_bounds_until_first_projection() {
        // Bounds exclude the center; the first projected step lands inside them.
        let bounds = Bounds::from_pairs((0.8, 1.0), (0.8, 1.0)).unwrap();
        let result = optimize_from_model(&[0.0; 6], Some(&bounds));
        assert_eq!(result.optimal_point, DesignPoint::new(0.8, 0.8));
        assert!(result.converged);
        assert_eq!(result.iterations, 2);
    }

    #[test]
    fn flat_surface_converges_immediately() {
        let result = optimize_from_model(&[0.0, 0.0, 0.0, 0.0, 0.0, 4.2], None);
        assert!(result.converged);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.optimal_point, DesignPoint::center());
        assert_eq!(result.optimal_value, 4.2);
    }

    #[test]
    fn exhausting_the_budget_is_not_convergence() {
        // Saddle-free but very flat: steps never fall below the tolerance.
        let coefficients = [0.001, 0.001, 0.0, -0.0015, -0.0015, 0.0];
        let settings = DescentSettings {
            max_iterations: 5,
            tolerance: 1e-9,
            ..DescentSettings::default()
        };
        let result = minimize_quadratic(&coefficients, &Bounds::unit(), &settings);
        assert!(!result.converged);
        assert_eq!(result.iterations, 5);
    }
}
