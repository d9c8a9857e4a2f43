//! Measurement role for the RSM workbench.
//!
//! A [`MeasurementSource`] turns a design point into a scalar performance
//! value. [`SimulatedResponse`] stands in for a physical test rig: a fixed
//! response surface plus independent Gaussian sensor noise on every call.

use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use rsm_types::{DesignPoint, RsmError, RsmResult};

/// Anything that can measure the performance of a design.
pub trait MeasurementSource: Send + Sync {
    fn measure(&self, point: &DesignPoint) -> f64;
}

/// The noise-free response the simulator is built around. Unknown to the
/// optimizer.
pub fn true_response(point: &DesignPoint) -> f64 {
    let (x1, x2) = (point.x1(), point.x2());
    0.5 * (x1 - 0.5).powi(2) + 0.8 * (x2 - 0.7).powi(2) + x1 * x2
}

/// Configuration for the simulated measurement source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementConfig {
    /// Standard deviation of the additive Gaussian noise.
    pub noise_std: f64,
    /// Fixed RNG seed for reproducible runs. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            noise_std: 0.1,
            seed: None,
        }
    }
}

/// Simulated test rig: [`true_response`] plus zero-mean Gaussian noise.
pub struct SimulatedResponse {
    noise: Normal<f64>,
    rng: Mutex<ChaCha8Rng>,
}

impl SimulatedResponse {
    pub fn new(config: &MeasurementConfig) -> RsmResult<Self> {
        if !config.noise_std.is_finite() || config.noise_std < 0.0 {
            return Err(RsmError::Config(format!(
                "noise_std must be a finite non-negative number, got {}",
                config.noise_std
            )));
        }
        let noise = Normal::new(0.0, config.noise_std)
            .map_err(|e| RsmError::Config(format!("invalid noise distribution: {e}")))?;

        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        };

        info!(noise_std = config.noise_std, seed = ?config.seed, "simulated measurement source ready");

        Ok(Self {
            noise,
            rng: Mutex::new(rng),
        })
    }

    pub fn noise_std(&self) -> f64 {
        self.noise.std_dev()
    }
}

impl MeasurementSource for SimulatedResponse {
    fn measure(&self, point: &DesignPoint) -> f64 {
        let noise = self.noise.sample(&mut *self.rng.lock());
        let value = true_response(point) + noise;
        debug!(point = %point, value, "collected measurement");
        value
    }
}

impl std::fmt::Debug for SimulatedResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedResponse")
            .field("noise_std", &self.noise_std())
            .finish()
    }
}
