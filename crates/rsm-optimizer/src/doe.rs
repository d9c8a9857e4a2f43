//! Full-factorial Design of Experiments.

use rsm_types::{validation_error, RsmResult};

/// Upper limit on the number of grid points a single request may produce.
pub const MAX_GRID_POINTS: usize = 1_000_000;

/// `num_levels` evenly spaced values covering [0, 1] inclusive.
///
/// A single level collapses to `0.0`.
pub fn levels(num_levels: usize) -> Vec<f64> {
    match num_levels {
        0 => Vec::new(),
        1 => vec![0.0],
        n => (0..n).map(|i| i as f64 / (n - 1) as f64).collect(),
    }
}

/// Total number of points in an `num_levels ^ num_variables` grid, or `None`
/// on overflow.
pub fn grid_size(num_variables: usize, num_levels: usize) -> Option<usize> {
    let mut total: usize = 1;
    for _ in 0..num_variables {
        total = total.checked_mul(num_levels)?;
    }
    Some(total)
}

/// Generate the full Cartesian product of `num_levels` levels for each of
/// `num_variables` variables. The last variable varies fastest.
pub fn suggest_doe_points(num_variables: usize, num_levels: usize) -> RsmResult<Vec<Vec<f64>>> {
    if num_variables == 0 {
        return Err(validation_error!("num_variables must be at least 1"));
    }
    if num_levels == 0 {
        return Err(validation_error!("num_levels must be at least 1"));
    }
    let total = grid_size(num_variables, num_levels)
        .filter(|n| *n <= MAX_GRID_POINTS)
        .ok_or_else(|| {
            validation_error!(
                "grid of {num_levels}^{num_variables} points exceeds the limit of {MAX_GRID_POINTS}"
            )
        })?;

    let axis = levels(num_levels);

    // Cartesian product
    let mut result: Vec<Vec<f64>> = vec![Vec::with_capacity(num_variables)];
    for _ in 0..num_variables {
        let mut next = Vec::with_capacity(result.len() * axis.len());
        for existing in &result {
            for value in &axis {
                let mut combo = existing.clone();
                combo.push(*value);
                next.push(combo);
            }
        }
        result = next;
    }

    debug_assert_eq!(result.len(), total);
    tracing::debug!(num_variables, num_levels, points = total, "generated DoE grid");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_by_four_grid_covers_thirds() {
        let points = suggest_doe_points(2, 4).unwrap();
        assert_eq!(points.len(), 16);

        let expected = [0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0];
        for x1 in expected {
            for x2 in expected {
                assert!(
                    points
                        .iter()
                        .any(|p| (p[0] - x1).abs() < 1e-12 && (p[1] - x2).abs() < 1e-12),
                    "missing grid point ({x1}, {x2})"
                );
            }
        }
    }

    #[test]
    fn point_count_is_levels_to_the_variables() {
        for n in 1..=4 {
            for l in 2..=5 {
                let points = suggest_doe_points(n, l).unwrap();
                assert_eq!(points.len(), l.pow(n as u32));
                let allowed = levels(l);
                for p in &points {
                    assert_eq!(p.len(), n);
                    for v in p {
                        assert!(allowed.iter().any(|a| (a - v).abs() < 1e-12));
                    }
                }
            }
        }
    }

    #[test]
    fn last_variable_varies_fastest() {
        let points = suggest_doe_points(2, 2).unwrap();
        assert_eq!(
            points,
            vec![vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]]
        );
    }

    #[test]
    fn single_level_collapses_to_zero() {
        assert_eq!(suggest_doe_points(2, 1).unwrap(), vec![vec![0.0, 0.0]]);
    }

    #[test]
    fn rejects_empty_and_oversized_grids() {
        assert!(suggest_doe_points(0, 4).is_err());
        assert!(suggest_doe_points(2, 0).is_err());
        assert!(suggest_doe_points(64, 10).is_err());
        assert_eq!(grid_size(64, 10), None);
    }
}
