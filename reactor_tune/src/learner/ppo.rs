//! Proximal Policy Optimization over a [`BatchEnv`].
//!
//! Collects fixed-length rollouts from all replicas in lockstep, computes
//! GAE advantages, then runs several epochs of clipped-surrogate updates
//! on shuffled minibatches. The learning rate for each update round is
//! taken from an [`LrSchedule`] evaluated at the fraction of training
//! remaining.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use super::gae::{compute_gae_interleaved, normalize_advantages};
use super::mlp::{Adam, MlpGrads};
use super::policy::ActorCritic;
use crate::environment::BatchEnv;
use crate::pool::PoolError;
use crate::scheduling::LrSchedule;

/// PPO hyperparameters.
#[derive(Debug, Clone)]
pub struct PpoConfig {
    /// Steps per rollout per environment
    pub n_steps: usize,
    /// Minibatch size
    pub batch_size: usize,
    /// Training epochs per rollout
    pub n_epochs: usize,
    /// Discount factor
    pub gamma: f32,
    /// GAE lambda
    pub gae_lambda: f32,
    /// Clipped-surrogate range
    pub clip_range: f32,
    /// Entropy bonus coefficient
    pub ent_coef: f32,
    /// Value loss coefficient
    pub vf_coef: f32,
    /// Max gradient norm (for clipping)
    pub max_grad_norm: f32,
    /// Actor hidden-layer widths
    pub pi_units: Vec<usize>,
    /// Critic hidden-layer widths
    pub vf_units: Vec<usize>,
    /// Seed for weight init and action sampling
    pub seed: u64,
}

impl Default for PpoConfig {
    fn default() -> Self {
        Self {
            n_steps: 128,
            batch_size: 64,
            n_epochs: 10,
            gamma: 0.99,
            gae_lambda: 0.99,
            clip_range: 0.2,
            ent_coef: 0.0,
            vf_coef: 0.5,
            max_grad_norm: 0.5,
            pi_units: vec![32, 32],
            vf_units: vec![32, 32],
            seed: 0,
        }
    }
}

impl PpoConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder methods
    pub fn with_n_steps(mut self, n_steps: usize) -> Self {
        self.n_steps = n_steps;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_ent_coef(mut self, ent_coef: f32) -> Self {
        self.ent_coef = ent_coef;
        self
    }

    pub fn with_net_arch(mut self, pi_units: Vec<usize>, vf_units: Vec<usize>) -> Self {
        self.pi_units = pi_units;
        self.vf_units = vf_units;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Running statistics exposed to callbacks and loggers.
#[derive(Debug, Clone, Default)]
pub struct LearnerStats {
    /// Number of rollouts completed
    pub rollouts: usize,
    /// Total environment steps
    pub total_steps: usize,
    /// Total episodes completed
    pub episodes: usize,
    /// Average episode reward (recent)
    pub avg_reward: f32,
    /// Policy loss (last epoch)
    pub policy_loss: f32,
    /// Value loss (last epoch)
    pub value_loss: f32,
    /// Entropy (last epoch)
    pub entropy: f32,
    /// Learning rate used for the last update round
    pub learning_rate: f64,
}

/// Hook invoked after every rollout/update round.
///
/// Return `Ok(false)` to stop training early.
pub trait TrainingCallback {
    fn on_rollout_end(
        &mut self,
        policy: &ActorCritic,
        stats: &LearnerStats,
    ) -> Result<bool, PoolError>;
}

/// Callback that never interrupts training.
pub struct NoopCallback;

impl TrainingCallback for NoopCallback {
    fn on_rollout_end(&mut self, _: &ActorCritic, _: &LearnerStats) -> Result<bool, PoolError> {
        Ok(true)
    }
}

// Adam state for the flat log_std vector.
struct AdamVec {
    m: Vec<f32>,
    v: Vec<f32>,
    t: u64,
}

impl AdamVec {
    fn new(n: usize) -> Self {
        Self {
            m: vec![0.0; n],
            v: vec![0.0; n],
            t: 0,
        }
    }

    fn step(&mut self, params: &mut [f32], grads: &[f32], lr: f32) {
        self.t += 1;
        let bias1 = 1.0 - 0.9f32.powi(self.t as i32);
        let bias2 = 1.0 - 0.999f32.powi(self.t as i32);
        for i in 0..params.len() {
            self.m[i] = 0.9 * self.m[i] + 0.1 * grads[i];
            self.v[i] = 0.999 * self.v[i] + 0.001 * grads[i] * grads[i];
            params[i] -= lr * (self.m[i] / bias1) / ((self.v[i] / bias2).sqrt() + 1e-8);
        }
    }
}

/// One rollout's worth of transitions, interleaved
/// `[env0_t0, env1_t0, …]` like the environment batches themselves.
struct RolloutBuffer {
    observations: Vec<f32>,
    actions: Vec<f32>,
    log_probs: Vec<f32>,
    values: Vec<f32>,
    rewards: Vec<f32>,
    dones: Vec<bool>,
}

impl RolloutBuffer {
    fn with_capacity(n: usize, obs_size: usize, action_size: usize) -> Self {
        Self {
            observations: Vec::with_capacity(n * obs_size),
            actions: Vec::with_capacity(n * action_size),
            log_probs: Vec::with_capacity(n),
            values: Vec::with_capacity(n),
            rewards: Vec::with_capacity(n),
            dones: Vec::with_capacity(n),
        }
    }

    fn clear(&mut self) {
        self.observations.clear();
        self.actions.clear();
        self.log_probs.clear();
        self.values.clear();
        self.rewards.clear();
        self.dones.clear();
    }
}

/// PPO learner bound to a learning rate schedule.
pub struct PpoLearner<S: LrSchedule> {
    config: PpoConfig,
    schedule: S,
    policy: ActorCritic,
    actor_opt: Adam,
    critic_opt: Adam,
    log_std_opt: AdamVec,
    rng: ChaCha8Rng,
    stats: LearnerStats,
    episode_returns: Vec<f32>,
    recent_returns: Vec<f32>,
}

impl<S: LrSchedule> PpoLearner<S> {
    /// Initialize policy weights and sampling stream from `config.seed`.
    pub fn new(obs_size: usize, action_size: usize, config: PpoConfig, schedule: S) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let policy = ActorCritic::new(obs_size, action_size, &config.pi_units, &config.vf_units, &mut rng);
        let actor_opt = Adam::new(&policy.actor);
        let critic_opt = Adam::new(&policy.critic);
        let log_std_opt = AdamVec::new(action_size);
        Self {
            config,
            schedule,
            policy,
            actor_opt,
            critic_opt,
            log_std_opt,
            rng,
            stats: LearnerStats::default(),
            episode_returns: Vec::new(),
            recent_returns: Vec::new(),
        }
    }

    pub fn policy(&self) -> &ActorCritic {
        &self.policy
    }

    pub fn stats(&self) -> &LearnerStats {
        &self.stats
    }

    /// Run rollout/update rounds until at least `total_timesteps`
    /// environment steps have been consumed or the callback stops early.
    pub fn learn(
        &mut self,
        env: &mut dyn BatchEnv,
        total_timesteps: usize,
        callback: &mut dyn TrainingCallback,
    ) -> Result<(), PoolError> {
        let n_envs = env.n_envs();
        let obs_size = env.obs_size();
        let action_size = env.action_size();
        assert_eq!(obs_size, self.policy.obs_size);
        assert_eq!(action_size, self.policy.action_size);

        self.episode_returns = vec![0.0; n_envs];
        let mut obs = env.reset()?;
        let mut buffer =
            RolloutBuffer::with_capacity(n_envs * self.config.n_steps, obs_size, action_size);

        while self.stats.total_steps < total_timesteps {
            let progress_remaining =
                1.0 - self.stats.total_steps as f64 / total_timesteps as f64;
            let lr = self.schedule.rate(progress_remaining) as f32;
            self.stats.learning_rate = lr as f64;

            obs = self.collect_rollout(env, obs, &mut buffer)?;
            self.update(&buffer, &obs, n_envs, lr);

            self.stats.rollouts += 1;
            self.stats.total_steps += n_envs * self.config.n_steps;
            self.stats.entropy = self.policy.entropy();

            debug!(
                rollout = self.stats.rollouts,
                total_steps = self.stats.total_steps,
                avg_reward = self.stats.avg_reward,
                lr,
                "rollout complete"
            );

            if !callback.on_rollout_end(&self.policy, &self.stats)? {
                break;
            }
        }
        Ok(())
    }

    fn collect_rollout(
        &mut self,
        env: &mut dyn BatchEnv,
        mut obs: Vec<f32>,
        buffer: &mut RolloutBuffer,
    ) -> Result<Vec<f32>, PoolError> {
        let n_envs = env.n_envs();
        let obs_size = env.obs_size();
        let action_size = env.action_size();
        buffer.clear();

        for _ in 0..self.config.n_steps {
            let mut clamped = Vec::with_capacity(n_envs * action_size);
            for i in 0..n_envs {
                let o = &obs[i * obs_size..(i + 1) * obs_size];
                let sample = self.policy.act(o, &mut self.rng);
                buffer.observations.extend_from_slice(o);
                buffer.actions.extend_from_slice(&sample.action);
                buffer.log_probs.push(sample.log_prob);
                buffer.values.push(sample.value);
                // Raw samples go in the buffer; the environment sees the
                // normalized action box.
                clamped.extend(sample.action.iter().map(|a| a.clamp(-1.0, 1.0)));
            }

            let step = env.step(&clamped)?;
            let dones = step.dones();
            for i in 0..n_envs {
                self.episode_returns[i] += step.rewards[i];
                if dones[i] {
                    self.stats.episodes += 1;
                    self.recent_returns.push(self.episode_returns[i]);
                    if self.recent_returns.len() > 100 {
                        self.recent_returns.remove(0);
                    }
                    self.episode_returns[i] = 0.0;
                }
            }
            buffer.rewards.extend_from_slice(&step.rewards);
            buffer.dones.extend_from_slice(&dones);
            obs = step.observations;
        }

        if !self.recent_returns.is_empty() {
            self.stats.avg_reward =
                self.recent_returns.iter().sum::<f32>() / self.recent_returns.len() as f32;
        }
        Ok(obs)
    }

    fn update(&mut self, buffer: &RolloutBuffer, last_obs: &[f32], n_envs: usize, lr: f32) {
        let obs_size = self.policy.obs_size;
        let action_size = self.policy.action_size;
        let total = buffer.rewards.len();

        let last_values: Vec<f32> = (0..n_envs)
            .map(|i| self.policy.value(&last_obs[i * obs_size..(i + 1) * obs_size]))
            .collect();
        let (advantages, returns) = compute_gae_interleaved(
            &buffer.rewards,
            &buffer.values,
            &buffer.dones,
            &last_values,
            n_envs,
            self.config.gamma,
            self.config.gae_lambda,
        );

        let mut indices: Vec<usize> = (0..total).collect();
        let clip = self.config.clip_range;

        for _ in 0..self.config.n_epochs {
            indices.shuffle(&mut self.rng);

            for minibatch in indices.chunks(self.config.batch_size) {
                let mut mb_adv: Vec<f32> = minibatch.iter().map(|&i| advantages[i]).collect();
                normalize_advantages(&mut mb_adv);

                let mut actor_grads = MlpGrads::zeros_like(&self.policy.actor);
                let mut critic_grads = MlpGrads::zeros_like(&self.policy.critic);
                let mut log_std_grads = vec![0.0f32; action_size];
                let mut policy_loss = 0.0f32;
                let mut value_loss = 0.0f32;

                for (k, &idx) in minibatch.iter().enumerate() {
                    let o = &buffer.observations[idx * obs_size..(idx + 1) * obs_size];
                    let a = &buffer.actions[idx * action_size..(idx + 1) * action_size];
                    let adv = mb_adv[k];
                    let old_log_prob = buffer.log_probs[idx];
                    let ret = returns[idx];

                    let actor_cache = self.policy.actor.forward_cached(o);
                    let mean = actor_cache.output();
                    let log_prob = self.policy.log_prob(mean, a);
                    let ratio = (log_prob - old_log_prob).exp();

                    let unclipped = ratio * adv;
                    let clipped = ratio.clamp(1.0 - clip, 1.0 + clip) * adv;
                    policy_loss += -unclipped.min(clipped);

                    // The surrogate only passes gradient when the
                    // unclipped term is the active minimum.
                    let d_log_prob = if unclipped <= clipped { -adv * ratio } else { 0.0 };

                    if d_log_prob != 0.0 {
                        // ∂logp/∂μ_j = (a_j - μ_j) / σ_j²
                        let mean_grad: Vec<f32> = mean
                            .iter()
                            .zip(a)
                            .zip(&self.policy.log_std)
                            .map(|((&mu, &aj), &ls)| {
                                let var = (2.0 * ls).exp();
                                d_log_prob * (aj - mu) / var
                            })
                            .collect();
                        self.policy.actor.backward(&actor_cache, &mean_grad, &mut actor_grads);

                        // ∂logp/∂logσ_j = ((a_j - μ_j)/σ_j)² - 1
                        for (j, ((&mu, &aj), &ls)) in
                            mean.iter().zip(a).zip(&self.policy.log_std).enumerate()
                        {
                            let z = (aj - mu) / ls.exp();
                            log_std_grads[j] += d_log_prob * (z * z - 1.0);
                        }
                    }

                    let critic_cache = self.policy.critic.forward_cached(o);
                    let v = critic_cache.output()[0];
                    value_loss += (v - ret) * (v - ret);
                    let v_grad = self.config.vf_coef * 2.0 * (v - ret);
                    self.policy.critic.backward(&critic_cache, &[v_grad], &mut critic_grads);
                }

                let scale = 1.0 / minibatch.len() as f32;
                actor_grads.scale(scale);
                critic_grads.scale(scale);
                for g in &mut log_std_grads {
                    *g *= scale;
                    // Entropy bonus: ∂H/∂logσ_j = 1.
                    *g -= self.config.ent_coef;
                }

                self.clip_gradients(&mut actor_grads, &mut critic_grads, &mut log_std_grads);

                self.actor_opt.step(&mut self.policy.actor, &actor_grads, lr);
                self.critic_opt.step(&mut self.policy.critic, &critic_grads, lr);
                self.log_std_opt.step(&mut self.policy.log_std, &log_std_grads, lr);

                self.stats.policy_loss = policy_loss * scale;
                self.stats.value_loss = value_loss * scale;
            }
        }
    }

    /// Global-norm gradient clipping across all parameter groups.
    fn clip_gradients(
        &self,
        actor_grads: &mut MlpGrads,
        critic_grads: &mut MlpGrads,
        log_std_grads: &mut [f32],
    ) {
        let sq = actor_grads.squared_norm()
            + critic_grads.squared_norm()
            + log_std_grads.iter().map(|g| g * g).sum::<f32>();
        let norm = sq.sqrt();
        if norm > self.config.max_grad_norm {
            let factor = self.config.max_grad_norm / norm;
            actor_grads.scale(factor);
            critic_grads.scale(factor);
            for g in log_std_grads {
                *g *= factor;
            }
        }
    }
}
