//! Policy optimization module.
//!
//! A self-contained PPO implementation over flat `Vec<f32>` networks:
//!
//! - [`mlp`]: dense networks with manual backpropagation and Adam
//! - [`policy`]: Gaussian actor-critic
//! - [`gae`]: generalized advantage estimation
//! - [`ppo`]: the rollout/update training loop

pub mod gae;
pub mod mlp;
pub mod policy;
pub mod ppo;

pub use gae::{compute_gae, compute_gae_interleaved, normalize_advantages};
pub use mlp::{Adam, Linear, Mlp, MlpGrads};
pub use policy::{ActionSample, ActorCritic};
pub use ppo::{LearnerStats, NoopCallback, PpoConfig, PpoLearner, TrainingCallback};
