//! Hyperparameter search module.
//!
//! - [`sampler`]: per-trial parameter draws on isolated random streams
//! - [`study`]: the sequential trial loop with persistence
//! - [`HyperparameterSample`]: the tuned PPO parameter space

pub mod sampler;
pub mod study;

pub use sampler::{ParamValue, Trial};
pub use study::{Study, TrialRecord};

use crate::learner::PpoConfig;
use crate::scheduling::CosineAnnealing;

/// The tuned slice of the PPO configuration.
///
/// One sample per trial; everything not listed here is fixed across the
/// study.
#[derive(Debug, Clone)]
pub struct HyperparameterSample {
    pub ent_coef: f64,
    pub batch_size: usize,
    pub n_steps: usize,
    pub min_lr: f64,
    pub max_lr: f64,
    pub pi_units: Vec<usize>,
    pub vf_units: Vec<usize>,
}

impl HyperparameterSample {
    /// Draw a full sample from a trial.
    ///
    /// Hidden-layer widths are sampled as powers of two via their
    /// exponents, giving widths in `{8, 16, 32}` per layer.
    pub fn suggest(trial: &mut Trial) -> Self {
        let ent_coef = trial.suggest_float("ent_coef", 0.001, 0.01);
        let batch_size = trial.suggest_int("batch_size", 16, 128) as usize;
        let n_steps = trial.suggest_int("n_steps", 32, 256) as usize;
        let min_lr = trial.suggest_float("min_lr", 0.002, 0.01);
        let max_lr = trial.suggest_float("max_lr", 0.01, 0.02);

        let pi_units = (0..2)
            .map(|i| 1usize << trial.suggest_int(&format!("pi_units_{}", i), 3, 5))
            .collect();
        let vf_units = (0..2)
            .map(|i| 1usize << trial.suggest_int(&format!("vf_units_{}", i), 3, 5))
            .collect();

        Self {
            ent_coef,
            batch_size,
            n_steps,
            min_lr,
            max_lr,
            pi_units,
            vf_units,
        }
    }

    /// PPO configuration carrying this sample.
    pub fn ppo_config(&self) -> PpoConfig {
        PpoConfig::new()
            .with_n_steps(self.n_steps)
            .with_batch_size(self.batch_size)
            .with_ent_coef(self.ent_coef as f32)
            .with_net_arch(self.pi_units.clone(), self.vf_units.clone())
    }

    /// Learning rate schedule carrying this sample's rate range.
    pub fn schedule(&self, num_cycles: f64) -> CosineAnnealing {
        CosineAnnealing::new(self.min_lr, self.max_lr, num_cycles)
    }
}
