//! Environment contracts shared by the training stack.
//!
//! Two capability levels exist: [`Environment`] is a single stateful
//! simulation handle (`reset`/`step`/`close`), and [`BatchEnv`] is the
//! vectorized form of exactly the same three operations, implemented both
//! by the replica pool and by the single-environment wrapper used for
//! evaluation.

use crate::disturbance::DisturbanceTrajectory;
use crate::pool::PoolError;

/// Per-step metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepInfo {
    /// The integrator produced a non-finite or implausible state this
    /// step; the episode was terminated with a penalty reward.
    pub diverged: bool,
}

/// Result of stepping a single environment.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Observation after the step (post-reset observation if the episode
    /// ended and the caller auto-resets).
    pub observation: Vec<f32>,
    /// Reward received for the step.
    pub reward: f32,
    /// Episode ended in a terminal state (divergence included).
    pub terminated: bool,
    /// Episode ended because the horizon was reached.
    pub truncated: bool,
    pub info: StepInfo,
}

impl StepOutcome {
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// A single stateful simulation handle.
///
/// Construction-time invariants are validated by the factory, so `reset`
/// and `step` are infallible; numerical trouble mid-episode is reported
/// through [`StepInfo::diverged`] rather than an error.
pub trait Environment: Send + 'static {
    fn obs_size(&self) -> usize;
    fn action_size(&self) -> usize;

    /// Start a new episode and return the initial observation.
    fn reset(&mut self) -> Vec<f32>;

    /// Advance one step with a normalized action.
    fn step(&mut self, action: &[f32]) -> StepOutcome;

    /// Release any resources held by the environment. Idempotent.
    fn close(&mut self);
}

/// A configuration template an orchestrator can stamp per replica.
///
/// Replica configs are built up front as plain values and handed to
/// workers by value; nothing is captured by closure.
pub trait EnvTemplate: Clone + Send + 'static {
    type Env: Environment;

    /// Simulation horizon in steps.
    fn horizon(&self) -> usize;

    /// Copy of this template with a disturbance realization attached.
    fn with_disturbance(&self, trajectory: DisturbanceTrajectory) -> Self;

    /// Build an environment. Pure: all randomness (disturbance, initial
    /// state, noise stream seed) is pre-baked in the template.
    fn build(&self) -> Result<Self::Env, ConfigError>;
}

/// Invariant violation in an environment configuration.
///
/// Fatal to that environment's construction; the enclosing trial is
/// aborted rather than silently patched with defaults.
#[derive(Debug)]
pub enum ConfigError {
    /// `low >= high` somewhere in an action/observation box.
    DegenerateBounds {
        space: &'static str,
        index: usize,
    },
    /// Setpoint sequence length does not match the horizon.
    SetpointLength { expected: usize, actual: usize },
    /// Horizon of zero steps.
    ZeroHorizon,
    /// A parameter outside its physically meaningful range.
    InvalidParameter {
        name: &'static str,
        reason: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::DegenerateBounds { space, index } => {
                write!(f, "degenerate bounds in {} space at component {}", space, index)
            }
            ConfigError::SetpointLength { expected, actual } => {
                write!(f, "setpoint length {} does not match horizon {}", actual, expected)
            }
            ConfigError::ZeroHorizon => write!(f, "simulation horizon is zero"),
            ConfigError::InvalidParameter { name, reason } => {
                write!(f, "invalid parameter {}: {}", name, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Batched result of stepping all environments in a [`BatchEnv`].
///
/// Vectors are ordered by replica index; observations are flattened as
/// `[env0_obs, env1_obs, …]`.
#[derive(Debug, Clone)]
pub struct BatchStep {
    pub observations: Vec<f32>,
    pub rewards: Vec<f32>,
    pub terminateds: Vec<bool>,
    pub truncateds: Vec<bool>,
}

impl BatchStep {
    pub fn dones(&self) -> Vec<bool> {
        self.terminateds
            .iter()
            .zip(&self.truncateds)
            .map(|(&t, &tr)| t || tr)
            .collect()
    }
}

/// Vectorized environment capability: the same `reset`/`step`/`close`
/// surface as [`Environment`], over `n_envs` replicas at once.
///
/// Finished episodes auto-reset; the returned observation for a done
/// replica is the first observation of its next episode.
pub trait BatchEnv: Send {
    fn n_envs(&self) -> usize;
    fn obs_size(&self) -> usize;
    fn action_size(&self) -> usize;

    /// Reset all replicas, returning the flattened initial observations.
    fn reset(&mut self) -> Result<Vec<f32>, PoolError>;

    /// Step all replicas with a flattened action batch
    /// (`n_envs * action_size` values) and block until every replica has
    /// advanced.
    fn step(&mut self, actions: &[f32]) -> Result<BatchStep, PoolError>;

    /// Release all replicas. Idempotent.
    fn close(&mut self);
}

/// Single-environment variant of [`BatchEnv`] (`n_envs == 1`), used for
/// held-out evaluation.
pub struct SingleEnv<E: Environment> {
    env: E,
    closed: bool,
}

impl<E: Environment> SingleEnv<E> {
    pub fn new(env: E) -> Self {
        Self { env, closed: false }
    }
}

impl<E: Environment> BatchEnv for SingleEnv<E> {
    fn n_envs(&self) -> usize {
        1
    }

    fn obs_size(&self) -> usize {
        self.env.obs_size()
    }

    fn action_size(&self) -> usize {
        self.env.action_size()
    }

    fn reset(&mut self) -> Result<Vec<f32>, PoolError> {
        if self.closed {
            return Err(PoolError::Closed);
        }
        Ok(self.env.reset())
    }

    fn step(&mut self, actions: &[f32]) -> Result<BatchStep, PoolError> {
        if self.closed {
            return Err(PoolError::Closed);
        }
        let mut outcome = self.env.step(actions);
        if outcome.done() {
            outcome.observation = self.env.reset();
        }
        Ok(BatchStep {
            observations: outcome.observation,
            rewards: vec![outcome.reward],
            terminateds: vec![outcome.terminated],
            truncateds: vec![outcome.truncated],
        })
    }

    fn close(&mut self) {
        if !self.closed {
            self.env.close();
            self.closed = true;
        }
    }
}

impl<E: Environment> Drop for SingleEnv<E> {
    fn drop(&mut self) {
        self.close();
    }
}
