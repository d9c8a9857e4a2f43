//! Design points, bounds and observations.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{RsmError, RsmResult};
use crate::validation_error;

/// Number of design variables handled by the quadratic model.
pub const NUM_VARIABLES: usize = 2;

/// A point in the 2-variable design space, conventionally inside [0,1]².
///
/// Serialises as a plain `[x1, x2]` array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DesignPoint([f64; NUM_VARIABLES]);

impl DesignPoint {
    pub fn new(x1: f64, x2: f64) -> Self {
        Self([x1, x2])
    }

    /// Center of the unit design domain.
    pub fn center() -> Self {
        Self([0.5, 0.5])
    }

    pub fn x1(&self) -> f64 {
        self.0[0]
    }

    pub fn x2(&self) -> f64 {
        self.0[1]
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &DesignPoint) -> f64 {
        let dx = self.x1() - other.x1();
        let dy = self.x2() - other.x2();
        (dx * dx + dy * dy).sqrt()
    }

    /// Clip each coordinate independently into its bound interval.
    pub fn clamp_to(&self, bounds: &Bounds) -> Self {
        Self([bounds.x1().clamp(self.x1()), bounds.x2().clamp(self.x2())])
    }

    /// True when every coordinate lies inside its interval (inclusive).
    pub fn within(&self, bounds: &Bounds) -> bool {
        bounds.x1().contains(self.x1()) && bounds.x2().contains(self.x2())
    }
}

impl From<[f64; NUM_VARIABLES]> for DesignPoint {
    fn from(coords: [f64; NUM_VARIABLES]) -> Self {
        Self(coords)
    }
}

impl TryFrom<Vec<f64>> for DesignPoint {
    type Error = RsmError;

    fn try_from(values: Vec<f64>) -> RsmResult<Self> {
        Self::try_from(values.as_slice())
    }
}

impl TryFrom<&[f64]> for DesignPoint {
    type Error = RsmError;

    fn try_from(values: &[f64]) -> RsmResult<Self> {
        match values {
            [x1, x2] => Ok(Self([*x1, *x2])),
            _ => Err(validation_error!(
                "design point needs exactly {} coordinates, got {}",
                NUM_VARIABLES,
                values.len()
            )),
        }
    }
}

impl fmt::Display for DesignPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.4}, {:.4}]", self.x1(), self.x2())
    }
}

/// Closed interval `[min, max]` for one design variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 2]", into = "[f64; 2]")]
pub struct Interval {
    min: f64,
    max: f64,
}

impl Interval {
    pub fn new(min: f64, max: f64) -> RsmResult<Self> {
        if min.is_nan() || max.is_nan() {
            return Err(validation_error!("interval endpoints must not be NaN"));
        }
        if min > max {
            return Err(validation_error!(
                "interval min {min} is greater than max {max}"
            ));
        }
        Ok(Self { min, max })
    }

    pub fn unit() -> Self {
        Self { min: 0.0, max: 1.0 }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl TryFrom<[f64; 2]> for Interval {
    type Error = RsmError;

    fn try_from(pair: [f64; 2]) -> RsmResult<Self> {
        Self::new(pair[0], pair[1])
    }
}

impl From<Interval> for [f64; 2] {
    fn from(interval: Interval) -> Self {
        [interval.min, interval.max]
    }
}

/// Box constraints, one interval per design variable.
///
/// Serialises as `[[min1, max1], [min2, max2]]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bounds([Interval; NUM_VARIABLES]);

impl Bounds {
    pub fn new(x1: Interval, x2: Interval) -> Self {
        Self([x1, x2])
    }

    /// Build from raw `(min, max)` pairs, validating each.
    pub fn from_pairs(x1: (f64, f64), x2: (f64, f64)) -> RsmResult<Self> {
        Ok(Self([Interval::new(x1.0, x1.1)?, Interval::new(x2.0, x2.1)?]))
    }

    /// The unit square `[0,1] × [0,1]`.
    pub fn unit() -> Self {
        Self([Interval::unit(), Interval::unit()])
    }

    pub fn x1(&self) -> Interval {
        self.0[0]
    }

    pub fn x2(&self) -> Interval {
        self.0[1]
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::unit()
    }
}

/// A measured response at a design point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub vars: DesignPoint,
    pub measurement: f64,
}

impl Observation {
    pub fn new(vars: DesignPoint, measurement: f64) -> Self {
        Self { vars, measurement }
    }
}

/// Observation with the lowest measurement, if any. NaN measurements never win.
pub fn best_observation(observations: &[Observation]) -> Option<&Observation> {
    observations
        .iter()
        .filter(|o| !o.measurement.is_nan())
        .min_by(|a, b| a.measurement.total_cmp(&b.measurement))
}
