//! Training run orchestration.
//!
//! A run wires together the replica pool, a held-out evaluation
//! environment, the PPO learner, and periodic evaluation with
//! best-snapshot persistence. The run's objective value is the mean
//! held-out episode reward of the final policy.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::disturbance::DisturbanceSpec;
use crate::environment::{BatchEnv, ConfigError, EnvTemplate, SingleEnv};
use crate::learner::{ActorCritic, LearnerStats, PpoConfig, PpoLearner, TrainingCallback};
use crate::metrics::{CsvLogger, MetricsLogger, TrainingSnapshot};
use crate::pool::{make_held_out_env, make_pool, PoolError};
use crate::scheduling::LrSchedule;

/// Error from a single training run.
#[derive(Debug)]
pub enum TrialError {
    Config(ConfigError),
    Pool(PoolError),
    Io(std::io::Error),
}

impl std::fmt::Display for TrialError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrialError::Config(e) => write!(f, "environment configuration: {}", e),
            TrialError::Pool(e) => write!(f, "environment pool: {}", e),
            TrialError::Io(e) => write!(f, "i/o: {}", e),
        }
    }
}

impl std::error::Error for TrialError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrialError::Config(e) => Some(e),
            TrialError::Pool(e) => Some(e),
            TrialError::Io(e) => Some(e),
        }
    }
}

impl From<ConfigError> for TrialError {
    fn from(e: ConfigError) -> Self {
        TrialError::Config(e)
    }
}

impl From<PoolError> for TrialError {
    fn from(e: PoolError) -> Self {
        TrialError::Pool(e)
    }
}

impl From<std::io::Error> for TrialError {
    fn from(e: std::io::Error) -> Self {
        TrialError::Io(e)
    }
}

/// Orchestration parameters shared by every trial of a study.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Number of replica environments
    pub n_envs: usize,
    /// Total environment steps to train for
    pub total_timesteps: usize,
    /// Environment steps between held-out evaluations
    pub eval_freq: usize,
    /// Episodes per held-out evaluation
    pub n_eval_episodes: usize,
    /// Global seed: replica disturbances, the held-out realization, and
    /// the learner all derive from it
    pub seed: u64,
    /// Directory for telemetry and the best-policy snapshot
    pub log_dir: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            n_envs: 10,
            total_timesteps: 100_000,
            eval_freq: 100,
            n_eval_episodes: 10,
            seed: 0,
            log_dir: None,
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder methods
    pub fn with_n_envs(mut self, n_envs: usize) -> Self {
        self.n_envs = n_envs;
        self
    }

    pub fn with_total_timesteps(mut self, total_timesteps: usize) -> Self {
        self.total_timesteps = total_timesteps;
        self
    }

    pub fn with_eval_freq(mut self, eval_freq: usize) -> Self {
        self.eval_freq = eval_freq;
        self
    }

    pub fn with_n_eval_episodes(mut self, n_eval_episodes: usize) -> Self {
        self.n_eval_episodes = n_eval_episodes;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(log_dir.into());
        self
    }
}

/// Deterministic held-out evaluation: mean episode reward over
/// `n_episodes` episodes using the Gaussian mean as the action.
pub fn evaluate_policy(
    policy: &ActorCritic,
    env: &mut dyn BatchEnv,
    n_episodes: usize,
) -> Result<f32, PoolError> {
    debug_assert_eq!(env.n_envs(), 1);
    debug_assert!(n_episodes > 0, "evaluation needs at least one episode");
    // In release, evaluate one episode rather than dividing by zero.
    let n_episodes = n_episodes.max(1);
    let mut obs = env.reset()?;
    let mut episode_reward = 0.0f32;
    let mut completed = Vec::with_capacity(n_episodes);

    while completed.len() < n_episodes {
        let action: Vec<f32> = policy
            .predict(&obs)
            .iter()
            .map(|a| a.clamp(-1.0, 1.0))
            .collect();
        let step = env.step(&action)?;
        episode_reward += step.rewards[0];
        if step.dones()[0] {
            completed.push(episode_reward);
            episode_reward = 0.0;
        }
        // Done replicas auto-reset, so the observation is already the
        // next episode's start.
        obs = step.observations;
    }

    Ok(completed.iter().sum::<f32>() / completed.len() as f32)
}

/// Rollout-boundary callback that evaluates on the held-out environment
/// every `eval_freq` environment steps and persists the best policy seen.
struct EvalCallback<B: BatchEnv> {
    eval_env: B,
    eval_freq: usize,
    n_eval_episodes: usize,
    next_eval_at: usize,
    best_mean: f32,
    best_path: Option<PathBuf>,
    logger: Option<Box<dyn MetricsLogger>>,
    io_error: Option<std::io::Error>,
}

impl<B: BatchEnv> EvalCallback<B> {
    fn new(eval_env: B, eval_freq: usize, n_eval_episodes: usize) -> Self {
        Self {
            eval_env,
            eval_freq,
            n_eval_episodes,
            next_eval_at: eval_freq,
            best_mean: f32::NEG_INFINITY,
            best_path: None,
            logger: None,
            io_error: None,
        }
    }

    fn save_best(&mut self, policy: &ActorCritic) {
        let Some(path) = &self.best_path else {
            return;
        };
        let result = File::create(path)
            .map(BufWriter::new)
            .and_then(|w| serde_json::to_writer(w, policy).map_err(std::io::Error::from));
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "failed to persist best policy");
            self.io_error = Some(e);
        }
    }
}

impl<B: BatchEnv> TrainingCallback for EvalCallback<B> {
    fn on_rollout_end(
        &mut self,
        policy: &ActorCritic,
        stats: &LearnerStats,
    ) -> Result<bool, PoolError> {
        if stats.total_steps < self.next_eval_at {
            return Ok(true);
        }
        while self.next_eval_at <= stats.total_steps {
            self.next_eval_at += self.eval_freq;
        }

        let mean = evaluate_policy(policy, &mut self.eval_env, self.n_eval_episodes)?;
        if mean > self.best_mean {
            self.best_mean = mean;
            self.save_best(policy);
        }
        info!(
            total_steps = stats.total_steps,
            eval_reward = mean,
            best = self.best_mean,
            "held-out evaluation"
        );
        if let Some(logger) = &mut self.logger {
            logger.log(&TrainingSnapshot::from_stats(stats).with_eval_reward(mean));
        }
        Ok(true)
    }
}

/// Run one full training trial and return its objective value: the mean
/// held-out episode reward of the final policy.
///
/// The replica pool, the held-out environment, and the learner are all
/// seeded from `run.seed`; two calls with identical inputs produce
/// identical objective values.
pub fn run_training<T, S>(
    template: &T,
    spec: &DisturbanceSpec,
    ppo: PpoConfig,
    schedule: S,
    run: &RunConfig,
) -> Result<f64, TrialError>
where
    T: EnvTemplate,
    S: LrSchedule,
{
    info!(
        disturbance = %spec,
        n_envs = run.n_envs,
        seed = run.seed,
        total_timesteps = run.total_timesteps,
        "starting training run"
    );
    let mut pool = make_pool(run.n_envs, template, run.seed, spec)?;
    let eval_env = SingleEnv::new(make_held_out_env(template, run.seed, spec)?);

    let obs_size = pool.obs_size();
    let action_size = pool.action_size();
    let mut learner = PpoLearner::new(obs_size, action_size, ppo.with_seed(run.seed), schedule);

    let mut callback = EvalCallback::new(eval_env, run.eval_freq, run.n_eval_episodes);
    if let Some(dir) = &run.log_dir {
        std::fs::create_dir_all(dir)?;
        callback.best_path = Some(dir.join("best_policy.json"));
        callback.logger = Some(Box::new(CsvLogger::new(dir.join("training.csv"))?));
    }

    let result = learner.learn(&mut pool, run.total_timesteps, &mut callback);
    pool.close();
    result?;
    if let Some(e) = callback.io_error.take() {
        return Err(TrialError::Io(e));
    }

    let final_mean = evaluate_policy(
        learner.policy(),
        &mut callback.eval_env,
        run.n_eval_episodes,
    )?;
    callback.eval_env.close();
    if let Some(logger) = &mut callback.logger {
        logger.flush();
    }

    info!(objective = final_mean, "training run complete");
    Ok(final_mean as f64)
}
