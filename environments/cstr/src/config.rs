//! Configuration types for the CSTR environment.
//!
//! A [`CstrConfig`] is a plain value: every source of randomness (the
//! disturbance realization and the observation-noise seed) is stored in
//! it explicitly, so building an environment is a pure function of the
//! config.

use reactor_tune::environment::{ConfigError, EnvTemplate};
use reactor_tune::DisturbanceTrajectory;

use crate::env::CstrEnv;

// ============================================================================
// Spaces
// ============================================================================

/// A box with per-component bounds.
#[derive(Clone, Debug)]
pub struct BoxSpace {
    pub low: Vec<f64>,
    pub high: Vec<f64>,
}

impl BoxSpace {
    pub fn new(low: Vec<f64>, high: Vec<f64>) -> Self {
        Self { low, high }
    }

    pub fn dim(&self) -> usize {
        self.low.len()
    }

    /// Map a raw value into `[-1, 1]` per component.
    pub fn normalize(&self, index: usize, value: f64) -> f64 {
        let (low, high) = (self.low[index], self.high[index]);
        2.0 * (value - low) / (high - low) - 1.0
    }

    /// Map a `[-1, 1]` value back to raw units, clamping the input into
    /// the normalized box first.
    pub fn denormalize(&self, index: usize, value: f64) -> f64 {
        let (low, high) = (self.low[index], self.high[index]);
        low + (value.clamp(-1.0, 1.0) + 1.0) / 2.0 * (high - low)
    }

    /// Bound width of one component.
    pub fn span(&self, index: usize) -> f64 {
        self.high[index] - self.low[index]
    }

    fn validate(&self, space: &'static str) -> Result<(), ConfigError> {
        for index in 0..self.dim() {
            if !(self.low[index] < self.high[index]) {
                return Err(ConfigError::DegenerateBounds { space, index });
            }
        }
        Ok(())
    }
}

// ============================================================================
// Environment Configuration
// ============================================================================

/// Reference temperature setpoint sequence: a short hold at the initial
/// steady state, then a step up.
pub fn default_setpoint(horizon: usize) -> Vec<f64> {
    (0..horizon)
        .map(|i| if i < 5 { INITIAL_TEMPERATURE } else { 340.0 })
        .collect()
}

/// Initial reactor concentration Ca (kmol/m³), a steady state of the
/// nominal plant.
pub const INITIAL_CONCENTRATION: f64 = 0.87725294608097;
/// Initial reactor temperature T (K), matching the initial setpoint.
pub const INITIAL_TEMPERATURE: f64 = 324.475443431599;
/// Inlet stream temperature when no disturbance is applied (K).
pub const NOMINAL_INLET_TEMPERATURE: f64 = 350.0;

/// Full environment configuration.
///
/// # Example
/// ```ignore
/// let config = CstrConfig::new()
///     .with_noise_seed(1990)
///     .with_disturbance(trajectory);
/// let env = config.build()?;
/// ```
#[derive(Clone, Debug)]
pub struct CstrConfig {
    /// Episode length in control steps
    pub horizon: usize,
    /// Simulated time span (min)
    pub tsim: f64,
    /// Temperature setpoint per step, length `horizon`
    pub setpoint: Vec<f64>,
    /// Coolant temperature bounds (K)
    pub action_space: BoxSpace,
    /// Bounds for [Ca, T, T_setpoint]
    pub observation_space: BoxSpace,
    /// Initial state [Ca, T]
    pub x0: [f64; 2],
    /// Reward scale on squared temperature error
    pub r_scale: f64,
    /// Enable observation noise
    pub noise: bool,
    /// Noise magnitude as a fraction of each observation bound width
    pub noise_percentage: f64,
    /// RK4 substeps per control step
    pub integration_substeps: usize,
    /// Seed for the observation-noise stream
    pub noise_seed: u64,
    /// Inlet temperature realization; `None` runs the nominal plant
    pub disturbance: Option<DisturbanceTrajectory>,
}

impl Default for CstrConfig {
    fn default() -> Self {
        let horizon = 100;
        Self {
            horizon,
            tsim: 26.0,
            setpoint: default_setpoint(horizon),
            action_space: BoxSpace::new(vec![250.0], vec![350.0]),
            observation_space: BoxSpace::new(
                vec![0.0, 200.0, 300.0],
                vec![1.0, 600.0, 400.0],
            ),
            x0: [INITIAL_CONCENTRATION, INITIAL_TEMPERATURE],
            r_scale: 1e-6,
            noise: true,
            noise_percentage: 0.001,
            integration_substeps: 10,
            noise_seed: 0,
            disturbance: None,
        }
    }
}

impl CstrConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the episode length, regenerating the default setpoint sequence.
    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self.setpoint = default_setpoint(horizon);
        self
    }

    pub fn with_setpoint(mut self, setpoint: Vec<f64>) -> Self {
        self.setpoint = setpoint;
        self
    }

    pub fn with_noise(mut self, noise: bool) -> Self {
        self.noise = noise;
        self
    }

    pub fn with_noise_seed(mut self, noise_seed: u64) -> Self {
        self.noise_seed = noise_seed;
        self
    }

    /// Control step duration (min).
    pub fn dt(&self) -> f64 {
        self.tsim / self.horizon as f64
    }

    /// Check every construction-time invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.horizon == 0 {
            return Err(ConfigError::ZeroHorizon);
        }
        self.action_space.validate("action")?;
        self.observation_space.validate("observation")?;
        if self.setpoint.len() != self.horizon {
            return Err(ConfigError::SetpointLength {
                expected: self.horizon,
                actual: self.setpoint.len(),
            });
        }
        if !(self.tsim > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "tsim",
                reason: format!("must be positive, got {}", self.tsim),
            });
        }
        if self.integration_substeps == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "integration_substeps",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.noise_percentage >= 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "noise_percentage",
                reason: format!("must be non-negative, got {}", self.noise_percentage),
            });
        }
        if !(self.r_scale > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "r_scale",
                reason: format!("must be positive, got {}", self.r_scale),
            });
        }
        Ok(())
    }
}

impl EnvTemplate for CstrConfig {
    type Env = CstrEnv;

    fn horizon(&self) -> usize {
        self.horizon
    }

    fn with_disturbance(&self, trajectory: DisturbanceTrajectory) -> Self {
        let mut copy = self.clone();
        copy.disturbance = Some(trajectory);
        copy
    }

    fn build(&self) -> Result<CstrEnv, ConfigError> {
        self.validate()?;
        Ok(CstrEnv::new(self.clone()))
    }
}
