//! # Reactor Tune: Disturbance-Randomized RL Tuning
//!
//! Training and hyperparameter-search framework for control policies on
//! simulated process environments under randomized exogenous
//! disturbances.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Study (search)                         │
//! │   trial 0 ─► trial 1 ─► … ─► trial N-1   (failures skipped)  │
//! ├──────────────────────────────────────────────────────────────┤
//! │                 Training run (orchestrator)                   │
//! │  Thread 1          Thread 2          Thread N                │
//! │  ┌─────────┐       ┌─────────┐       ┌─────────┐             │
//! │  │replica-0│       │replica-1│       │replica-N│             │
//! │  │ seed+0  │       │ seed+1  │       │ seed+N  │             │
//! │  └────┬────┘       └────┬────┘       └────┬────┘             │
//! │       └─────────────────┼─────────────────┘                  │
//! │                         ▼                                    │
//! │               ┌──────────────────┐    ┌────────────────┐     │
//! │               │   PPO learner    │───►│  held-out eval │     │
//! │               │ (cosine LR sched)│    │ (best snapshot)│     │
//! │               └──────────────────┘    └────────────────┘     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every source of randomness hangs off explicit seeds: replica `i`'s
//! disturbance comes from `seed + i`, the held-out realization from the
//! same seed on a separate stream, and the learner's weights and action
//! noise from the trial-wide seed. Identical inputs give identical
//! objective values.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use reactor_tune::orchestrator::{run_training, RunConfig};
//! use reactor_tune::search::{HyperparameterSample, Study};
//! use reactor_tune::DisturbanceSpec;
//!
//! let spec = DisturbanceSpec::new("Ti", 350.0, 450.0);
//! let mut study = Study::new("cstr", 1990);
//! study.optimize(n_trials, |trial| {
//!     let sample = HyperparameterSample::suggest(trial);
//!     run_training(
//!         &template,
//!         &spec,
//!         sample.ppo_config(),
//!         sample.schedule(4.0),
//!         &RunConfig::new().with_seed(1990),
//!     )
//! });
//! ```

pub mod disturbance;
pub mod environment;
pub mod learner;
pub mod metrics;
pub mod orchestrator;
pub mod pool;
pub mod scheduling;
pub mod search;

// Re-export commonly used types
pub use disturbance::{generate, generate_held_out, DisturbanceSpec, DisturbanceTrajectory};
pub use environment::{
    BatchEnv, BatchStep, ConfigError, EnvTemplate, Environment, SingleEnv, StepInfo, StepOutcome,
};
pub use learner::{ActorCritic, LearnerStats, PpoConfig, PpoLearner, TrainingCallback};
pub use metrics::{CsvLogger, MetricsLogger, TrainingSnapshot};
pub use orchestrator::{evaluate_policy, run_training, RunConfig, TrialError};
pub use pool::{make_held_out_env, make_pool, PoolError, ReplicaPool};
pub use scheduling::{cosine_annealing, ConstantLr, CosineAnnealing, LrSchedule};
pub use search::{HyperparameterSample, ParamValue, Study, Trial, TrialRecord};
