//! Local sampling around a predicted optimum.

use std::f64::consts::PI;

use rsm_types::{Bounds, DesignPoint};

pub const DEFAULT_REFINEMENT_POINTS: usize = 5;
pub const DEFAULT_REFINEMENT_RADIUS: f64 = 0.1;

/// The center followed by `num_points - 1` points evenly spaced on a circle of
/// `radius` around it.
///
/// Circle points are clipped into the unit square; the center is returned as
/// given. `num_points == 0` yields no points.
pub fn suggest_refinement_points(
    center: DesignPoint,
    num_points: usize,
    radius: f64,
) -> Vec<DesignPoint> {
    if num_points == 0 {
        return Vec::new();
    }

    let unit = Bounds::unit();
    let ring = num_points - 1;
    let mut points = Vec::with_capacity(num_points);
    points.push(center);

    for i in 0..ring {
        let angle = 2.0 * PI * i as f64 / ring as f64;
        let offset = DesignPoint::new(
            center.x1() + radius * angle.cos(),
            center.x2() + radius * angle.sin(),
        );
        points.push(offset.clamp_to(&unit));
    }

    points
}
