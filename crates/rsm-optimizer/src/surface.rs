//! Least-squares fitting of the quadratic response surface.
//!
//! The design matrix has one row per observation with the columns
//! `[x1², x2², x1·x2, x1, x2, 1]`. The system is solved through an SVD, with
//! small singular values zeroed, so rank-deficient designs yield the
//! minimum-norm solution instead of an error.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use rsm_types::{
    fitting_error, Observation, QuadraticModel, RsmResult, NUM_COEFFICIENTS,
};

/// Design-matrix row for a single observation.
fn design_row(obs: &Observation) -> [f64; NUM_COEFFICIENTS] {
    let (x1, x2) = (obs.vars.x1(), obs.vars.x2());
    [x1 * x1, x2 * x2, x1 * x2, x1, x2, 1.0]
}

/// Coefficient of determination. Defined as 0 when every measurement is
/// identical (zero total sum of squares).
pub fn r_squared(measured: &[f64], predicted: &[f64]) -> f64 {
    debug_assert_eq!(measured.len(), predicted.len());
    let Some(first) = measured.first() else {
        return 0.0;
    };
    if measured.iter().all(|y| y == first) {
        return 0.0;
    }

    let mean = measured.iter().sum::<f64>() / measured.len() as f64;
    let ss_tot: f64 = measured.iter().map(|y| (y - mean).powi(2)).sum();
    if ss_tot <= 0.0 {
        return 0.0;
    }
    let ss_res: f64 = measured
        .iter()
        .zip(predicted)
        .map(|(y, y_hat)| (y - y_hat).powi(2))
        .sum();

    (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
}

/// Fit `y = a·x1² + b·x2² + c·x1·x2 + d·x1 + e·x2 + f` to the observations.
///
/// Fails when there is nothing to fit, when an input is not finite, or when
/// every observation sits at the same design point (only the intercept would
/// be identifiable). Other under-determined designs succeed with the
/// minimum-norm coefficients.
pub fn fit_response_surface(observations: &[Observation]) -> RsmResult<QuadraticModel> {
    if observations.is_empty() {
        return Err(fitting_error!("no observations to fit"));
    }
    if let Some(bad) = observations
        .iter()
        .position(|o| !o.vars.is_finite() || !o.measurement.is_finite())
    {
        return Err(fitting_error!("observation {bad} contains a non-finite value"));
    }

    let rows = observations.len();
    let design = DMatrix::from_row_iterator(
        rows,
        NUM_COEFFICIENTS,
        observations.iter().flat_map(design_row),
    );
    let measured = DVector::from_iterator(rows, observations.iter().map(|o| o.measurement));

    let svd = design.clone().svd(true, true);
    let sigma_max = svd.singular_values.max();
    let eps = rows.max(NUM_COEFFICIENTS) as f64 * f64::EPSILON * sigma_max;
    let rank = svd.rank(eps);

    if rank <= 1 {
        return Err(fitting_error!(
            "design matrix is singular (rank {rank}); all observations share one design point"
        ));
    }
    if rank < NUM_COEFFICIENTS {
        warn!(
            rank,
            observations = rows,
            "under-determined response surface, using minimum-norm coefficients"
        );
    }

    let solution = svd
        .solve(&measured, eps)
        .map_err(|e| fitting_error!("least-squares solve failed: {e}"))?;

    let mut coefficients = [0.0; NUM_COEFFICIENTS];
    for (slot, value) in coefficients.iter_mut().zip(solution.iter()) {
        *slot = *value;
    }
    if coefficients.iter().any(|c| !c.is_finite()) {
        return Err(fitting_error!("least-squares solve produced non-finite coefficients"));
    }

    let predicted = &design * &solution;
    let r_squared = r_squared(measured.as_slice(), predicted.as_slice());

    debug!(rows, rank, r_squared, "fitted response surface");

    Ok(QuadraticModel {
        coefficients,
        r_squared,
        num_data_points: rows,
    })
}
