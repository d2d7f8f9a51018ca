//! Gaussian actor-critic policy.
//!
//! The actor network outputs the mean of a diagonal Gaussian over the
//! normalized action space; a state-independent `log_std` vector provides
//! the spread. The critic is a separate network with a scalar output.

use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

use super::mlp::Mlp;

const LOG_2PI: f32 = 1.837_877_1;

/// Actor-critic with a diagonal Gaussian action head.
///
/// Snapshots of the whole policy serialize to JSON, which is how the best
/// policy seen during training is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorCritic {
    pub actor: Mlp,
    pub critic: Mlp,
    pub log_std: Vec<f32>,
    pub obs_size: usize,
    pub action_size: usize,
}

/// Result of sampling an action during rollout collection.
#[derive(Debug, Clone)]
pub struct ActionSample {
    /// Raw (unclamped) sample from the Gaussian.
    pub action: Vec<f32>,
    pub log_prob: f32,
    pub value: f32,
}

impl ActorCritic {
    /// Build a policy with the given hidden-layer widths for the actor
    /// (`pi_units`) and critic (`vf_units`).
    pub fn new(
        obs_size: usize,
        action_size: usize,
        pi_units: &[usize],
        vf_units: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let mut actor_sizes = vec![obs_size];
        actor_sizes.extend_from_slice(pi_units);
        actor_sizes.push(action_size);

        let mut critic_sizes = vec![obs_size];
        critic_sizes.extend_from_slice(vf_units);
        critic_sizes.push(1);

        Self {
            actor: Mlp::new(&actor_sizes, rng),
            critic: Mlp::new(&critic_sizes, rng),
            log_std: vec![0.0; action_size],
            obs_size,
            action_size,
        }
    }

    /// Sample an action from the current Gaussian for one observation.
    pub fn act(&self, obs: &[f32], rng: &mut ChaCha8Rng) -> ActionSample {
        let mean = self.actor.forward(obs);
        let action: Vec<f32> = mean
            .iter()
            .zip(&self.log_std)
            .map(|(&mu, &ls)| {
                let z: f32 = StandardNormal.sample(rng);
                mu + ls.exp() * z
            })
            .collect();
        let log_prob = self.log_prob(&mean, &action);
        let value = self.value(obs);
        ActionSample {
            action,
            log_prob,
            value,
        }
    }

    /// Deterministic action (the Gaussian mean).
    pub fn predict(&self, obs: &[f32]) -> Vec<f32> {
        self.actor.forward(obs)
    }

    /// State value estimate.
    pub fn value(&self, obs: &[f32]) -> f32 {
        self.critic.forward(obs)[0]
    }

    /// Log density of `action` under the Gaussian with the given mean and
    /// the policy's current `log_std`.
    pub fn log_prob(&self, mean: &[f32], action: &[f32]) -> f32 {
        debug_assert_eq!(mean.len(), self.action_size);
        debug_assert_eq!(action.len(), self.action_size);
        mean.iter()
            .zip(action)
            .zip(&self.log_std)
            .map(|((&mu, &a), &ls)| {
                let std = ls.exp();
                let z = (a - mu) / std;
                -0.5 * (z * z + LOG_2PI) - ls
            })
            .sum()
    }

    /// Differential entropy of the diagonal Gaussian.
    pub fn entropy(&self) -> f32 {
        self.log_std
            .iter()
            .map(|&ls| ls + 0.5 * (LOG_2PI + 1.0))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn policy() -> ActorCritic {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        ActorCritic::new(3, 1, &[16, 16], &[16, 16], &mut rng)
    }

    #[test]
    fn predict_is_deterministic() {
        let p = policy();
        let obs = [0.1, -0.3, 0.8];
        assert_eq!(p.predict(&obs), p.predict(&obs));
    }

    #[test]
    fn act_is_reproducible_per_rng_seed() {
        let p = policy();
        let obs = [0.1, -0.3, 0.8];
        let a = p.act(&obs, &mut ChaCha8Rng::seed_from_u64(1));
        let b = p.act(&obs, &mut ChaCha8Rng::seed_from_u64(1));
        assert_eq!(a.action, b.action);
        assert_eq!(a.log_prob, b.log_prob);
    }

    #[test]
    fn log_prob_peaks_at_the_mean() {
        let p = policy();
        let obs = [0.0, 0.0, 0.0];
        let mean = p.predict(&obs);
        let at_mean = p.log_prob(&mean, &mean);
        let off_mean: Vec<f32> = mean.iter().map(|m| m + 0.5).collect();
        assert!(at_mean > p.log_prob(&mean, &off_mean));
    }

    #[test]
    fn standard_normal_log_prob_matches_closed_form() {
        let mut p = policy();
        p.log_std = vec![0.0];
        // N(0, 1) density at 0 is 1/sqrt(2π).
        let lp = p.log_prob(&[0.0], &[0.0]);
        assert!((lp - (-0.5 * LOG_2PI)).abs() < 1e-5);
    }

    #[test]
    fn entropy_grows_with_log_std() {
        let mut p = policy();
        p.log_std = vec![0.0];
        let e0 = p.entropy();
        p.log_std = vec![1.0];
        assert!(p.entropy() > e0);
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let p = policy();
        let json = serde_json::to_string(&p).unwrap();
        let q: ActorCritic = serde_json::from_str(&json).unwrap();
        let obs = [0.2, 0.4, -0.1];
        assert_eq!(p.predict(&obs), q.predict(&obs));
        assert_eq!(p.value(&obs), q.value(&obs));
    }
}
