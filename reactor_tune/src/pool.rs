//! Parallel environment pool.
//!
//! Runs N environment replicas on dedicated worker threads, each with its
//! own independently seeded disturbance realization. A pool-level `step`
//! is a synchronous fan-out/fan-in barrier: actions are scattered to every
//! worker, then results are gathered in replica order before the call
//! returns. A failed replica is fatal to the whole call.
//!
//! The pool owns its workers for its whole lifetime: `close` (also run on
//! `Drop`) delivers a shutdown command and joins every thread, so no exit
//! path leaks replicas.

use crossbeam_channel::{Receiver, Sender};
use std::thread::JoinHandle;

use crate::disturbance::{generate, generate_held_out, DisturbanceSpec};
use crate::environment::{BatchEnv, BatchStep, ConfigError, EnvTemplate, Environment, StepOutcome};

/// Error from a pool-level operation.
#[derive(Debug)]
pub enum PoolError {
    /// A replica worker died or stopped answering.
    ReplicaFailed { replica: usize },
    /// The pool (or single-env wrapper) was used after `close`.
    Closed,
}

impl std::fmt::Display for PoolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolError::ReplicaFailed { replica } => write!(f, "replica {} failed", replica),
            PoolError::Closed => write!(f, "environment pool is closed"),
        }
    }
}

impl std::error::Error for PoolError {}

enum WorkerCmd {
    Reset,
    Step(Vec<f32>),
    Close,
}

enum WorkerReply {
    Obs(Vec<f32>),
    Step(StepOutcome),
}

struct Replica {
    cmd_tx: Sender<WorkerCmd>,
    reply_rx: Receiver<WorkerReply>,
    thread: Option<JoinHandle<()>>,
}

/// N environment replicas behind one synchronous-step [`BatchEnv`].
pub struct ReplicaPool {
    replicas: Vec<Replica>,
    obs_size: usize,
    action_size: usize,
    closed: bool,
}

impl ReplicaPool {
    /// Spawn one worker thread per environment.
    ///
    /// Environments are constructed by the caller and moved into their
    /// workers by value.
    ///
    /// # Panics
    ///
    /// Panics if `envs` is empty or the replicas disagree on space sizes.
    pub fn spawn<E: Environment>(envs: Vec<E>) -> Self {
        assert!(!envs.is_empty(), "replica pool needs at least one environment");
        let obs_size = envs[0].obs_size();
        let action_size = envs[0].action_size();
        assert!(
            envs.iter().all(|e| e.obs_size() == obs_size && e.action_size() == action_size),
            "replicas disagree on observation/action sizes"
        );

        let replicas = envs
            .into_iter()
            .enumerate()
            .map(|(i, env)| Self::spawn_worker(i, env))
            .collect();

        Self {
            replicas,
            obs_size,
            action_size,
            closed: false,
        }
    }

    fn spawn_worker<E: Environment>(replica: usize, mut env: E) -> Replica {
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded::<WorkerCmd>();
        let (reply_tx, reply_rx) = crossbeam_channel::unbounded::<WorkerReply>();

        let thread = std::thread::Builder::new()
            .name(format!("replica-{}", replica))
            .spawn(move || {
                while let Ok(cmd) = cmd_rx.recv() {
                    match cmd {
                        WorkerCmd::Reset => {
                            let obs = env.reset();
                            if reply_tx.send(WorkerReply::Obs(obs)).is_err() {
                                break;
                            }
                        }
                        WorkerCmd::Step(action) => {
                            let mut outcome = env.step(&action);
                            if outcome.done() {
                                outcome.observation = env.reset();
                            }
                            if reply_tx.send(WorkerReply::Step(outcome)).is_err() {
                                break;
                            }
                        }
                        WorkerCmd::Close => break,
                    }
                }
                env.close();
            })
            .expect("failed to spawn replica worker");

        Replica {
            cmd_tx,
            reply_rx,
            thread: Some(thread),
        }
    }

    fn scatter(&self, make_cmd: impl Fn(usize) -> WorkerCmd) -> Result<(), PoolError> {
        for (i, replica) in self.replicas.iter().enumerate() {
            replica
                .cmd_tx
                .send(make_cmd(i))
                .map_err(|_| PoolError::ReplicaFailed { replica: i })?;
        }
        Ok(())
    }
}

impl BatchEnv for ReplicaPool {
    fn n_envs(&self) -> usize {
        self.replicas.len()
    }

    fn obs_size(&self) -> usize {
        self.obs_size
    }

    fn action_size(&self) -> usize {
        self.action_size
    }

    fn reset(&mut self) -> Result<Vec<f32>, PoolError> {
        if self.closed {
            return Err(PoolError::Closed);
        }
        self.scatter(|_| WorkerCmd::Reset)?;

        let mut observations = Vec::with_capacity(self.replicas.len() * self.obs_size);
        for (i, replica) in self.replicas.iter().enumerate() {
            match replica.reply_rx.recv() {
                Ok(WorkerReply::Obs(obs)) => observations.extend_from_slice(&obs),
                _ => return Err(PoolError::ReplicaFailed { replica: i }),
            }
        }
        Ok(observations)
    }

    fn step(&mut self, actions: &[f32]) -> Result<BatchStep, PoolError> {
        if self.closed {
            return Err(PoolError::Closed);
        }
        let n = self.replicas.len();
        assert_eq!(
            actions.len(),
            n * self.action_size,
            "action batch has wrong length"
        );

        self.scatter(|i| {
            let start = i * self.action_size;
            WorkerCmd::Step(actions[start..start + self.action_size].to_vec())
        })?;

        let mut batch = BatchStep {
            observations: Vec::with_capacity(n * self.obs_size),
            rewards: Vec::with_capacity(n),
            terminateds: Vec::with_capacity(n),
            truncateds: Vec::with_capacity(n),
        };
        for (i, replica) in self.replicas.iter().enumerate() {
            match replica.reply_rx.recv() {
                Ok(WorkerReply::Step(outcome)) => {
                    batch.observations.extend_from_slice(&outcome.observation);
                    batch.rewards.push(outcome.reward);
                    batch.terminateds.push(outcome.terminated);
                    batch.truncateds.push(outcome.truncated);
                }
                _ => return Err(PoolError::ReplicaFailed { replica: i }),
            }
        }
        Ok(batch)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for replica in &self.replicas {
            let _ = replica.cmd_tx.send(WorkerCmd::Close);
        }
        for replica in &mut self.replicas {
            if let Some(thread) = replica.thread.take() {
                let _ = thread.join();
            }
        }
    }
}

impl Drop for ReplicaPool {
    fn drop(&mut self) {
        self.close();
    }
}

/// Build a pool of `n` replicas from a template.
///
/// Replica `i` receives a disturbance generated from `base_seed + i`; for
/// a fixed `(base_seed, n)` the per-replica disturbance set is identical
/// across runs.
pub fn make_pool<T: EnvTemplate>(
    n: usize,
    base: &T,
    base_seed: u64,
    spec: &DisturbanceSpec,
) -> Result<ReplicaPool, ConfigError> {
    let mut envs = Vec::with_capacity(n);
    for i in 0..n {
        let trajectory = generate(base_seed + i as u64, base.horizon(), spec.low, spec.high);
        let config = base.with_disturbance(trajectory);
        envs.push(config.build()?);
    }
    Ok(ReplicaPool::spawn(envs))
}

/// Build the held-out evaluation environment for a template.
///
/// Seeded from the same `base_seed` on the generator's evaluation stream,
/// so its disturbance realization is reproducible but independent in value
/// from every replica's.
pub fn make_held_out_env<T: EnvTemplate>(
    base: &T,
    base_seed: u64,
    spec: &DisturbanceSpec,
) -> Result<T::Env, ConfigError> {
    let trajectory = generate_held_out(base_seed, base.horizon(), spec.low, spec.high);
    base.with_disturbance(trajectory).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disturbance::DisturbanceTrajectory;
    use crate::environment::StepInfo;

    /// Minimal deterministic environment: reward equals the replica tag
    /// plus the current step index, episodes truncate after `horizon`.
    #[derive(Clone)]
    struct CountingEnv {
        tag: f32,
        horizon: usize,
        step_idx: usize,
        closed: bool,
    }

    impl CountingEnv {
        fn new(tag: f32, horizon: usize) -> Self {
            Self {
                tag,
                horizon,
                step_idx: 0,
                closed: false,
            }
        }
    }

    impl Environment for CountingEnv {
        fn obs_size(&self) -> usize {
            2
        }

        fn action_size(&self) -> usize {
            1
        }

        fn reset(&mut self) -> Vec<f32> {
            self.step_idx = 0;
            vec![self.tag, 0.0]
        }

        fn step(&mut self, action: &[f32]) -> StepOutcome {
            self.step_idx += 1;
            StepOutcome {
                observation: vec![self.tag, self.step_idx as f32 + action[0] * 0.0],
                reward: self.tag + self.step_idx as f32,
                terminated: false,
                truncated: self.step_idx >= self.horizon,
                info: StepInfo::default(),
            }
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    #[derive(Clone)]
    struct CountingTemplate {
        horizon: usize,
        disturbance: Option<DisturbanceTrajectory>,
    }

    impl EnvTemplate for CountingTemplate {
        type Env = CountingEnv;

        fn horizon(&self) -> usize {
            self.horizon
        }

        fn with_disturbance(&self, trajectory: DisturbanceTrajectory) -> Self {
            let mut copy = self.clone();
            copy.disturbance = Some(trajectory);
            copy
        }

        fn build(&self) -> Result<CountingEnv, ConfigError> {
            let tag = self
                .disturbance
                .as_ref()
                .map(|d| d.value_at(0) as f32)
                .unwrap_or(0.0);
            Ok(CountingEnv::new(tag, self.horizon))
        }
    }

    #[test]
    fn step_returns_ordered_batch() {
        let envs = vec![
            CountingEnv::new(10.0, 5),
            CountingEnv::new(20.0, 5),
            CountingEnv::new(30.0, 5),
        ];
        let mut pool = ReplicaPool::spawn(envs);
        let obs = pool.reset().unwrap();
        assert_eq!(obs, vec![10.0, 0.0, 20.0, 0.0, 30.0, 0.0]);

        let batch = pool.step(&[0.0, 0.0, 0.0]).unwrap();
        assert_eq!(batch.rewards, vec![11.0, 21.0, 31.0]);
        assert_eq!(batch.terminateds, vec![false, false, false]);
        pool.close();
    }

    #[test]
    fn done_replicas_auto_reset() {
        let mut pool = ReplicaPool::spawn(vec![CountingEnv::new(1.0, 2)]);
        pool.reset().unwrap();
        pool.step(&[0.0]).unwrap();
        let batch = pool.step(&[0.0]).unwrap();
        assert_eq!(batch.truncateds, vec![true]);
        // Observation is the post-reset one.
        assert_eq!(batch.observations, vec![1.0, 0.0]);
        // Next episode starts from scratch.
        let batch = pool.step(&[0.0]).unwrap();
        assert_eq!(batch.rewards, vec![2.0]);
    }

    #[test]
    fn pool_disturbances_match_independent_regeneration() {
        let template = CountingTemplate {
            horizon: 100,
            disturbance: None,
        };
        let spec = DisturbanceSpec::new("Ti", 350.0, 450.0);
        let base_seed = 1990;
        let n = 4;

        let mut pool = make_pool(n, &template, base_seed, &spec).unwrap();
        let obs = pool.reset().unwrap();

        for i in 0..n {
            let expected = generate(base_seed + i as u64, 100, 350.0, 450.0);
            assert_eq!(obs[i * 2], expected.value_at(0) as f32);
        }
        pool.close();
    }

    #[test]
    fn close_joins_all_workers_and_is_idempotent() {
        let mut pool = ReplicaPool::spawn(vec![
            CountingEnv::new(1.0, 5),
            CountingEnv::new(2.0, 5),
        ]);
        pool.reset().unwrap();
        pool.close();
        // All worker threads have been joined.
        assert!(pool.replicas.iter().all(|r| r.thread.is_none()));
        pool.close();
        assert!(matches!(pool.step(&[0.0, 0.0]), Err(PoolError::Closed)));
    }

    #[test]
    fn drop_mid_run_releases_workers() {
        let mut pool = ReplicaPool::spawn(vec![CountingEnv::new(1.0, 5)]);
        pool.reset().unwrap();
        pool.step(&[0.0]).unwrap();
        drop(pool); // must not hang or leave detached workers stepping
    }

    #[test]
    fn held_out_env_is_reproducible() {
        let template = CountingTemplate {
            horizon: 100,
            disturbance: None,
        };
        let spec = DisturbanceSpec::new("Ti", 350.0, 450.0);
        let mut a = make_held_out_env(&template, 7, &spec).unwrap();
        let mut b = make_held_out_env(&template, 7, &spec).unwrap();
        assert_eq!(a.reset(), b.reset());
    }
}
