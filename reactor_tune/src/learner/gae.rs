//! Advantage estimation for the PPO learner.
//!
//! Advantages follow the GAE(γ, λ) estimator (Schulman et al. 2016): an
//! exponentially weighted sum of TD residuals, where λ trades bias for
//! variance between one-step TD (λ = 0) and Monte Carlo (λ = 1).
//!
//! Buffers use the rollout's interleaved layout, `[env0_t0, env1_t0, …,
//! env0_t1, …]`, and are scanned once, backwards in time with a per-env
//! carry. Episode boundaries cut the recursion so credit never flows
//! across a `done` flag.

/// Advantages and discounted returns for interleaved rollout buffers.
///
/// `rewards`, `values`, and `dones` hold `n_envs` transitions per time
/// step; `last_values` bootstraps each environment's tail (pass 0 for a
/// terminal tail). Both outputs keep the input layout.
pub fn compute_gae_interleaved(
    rewards: &[f32],
    values: &[f32],
    dones: &[bool],
    last_values: &[f32],
    n_envs: usize,
    gamma: f32,
    gae_lambda: f32,
) -> (Vec<f32>, Vec<f32>) {
    let total = rewards.len();
    assert_eq!(values.len(), total);
    assert_eq!(dones.len(), total);
    assert_eq!(last_values.len(), n_envs);
    assert!(n_envs > 0 && total % n_envs == 0);

    let steps = total / n_envs;
    let mut advantages = vec![0.0f32; total];
    let mut returns = vec![0.0f32; total];

    // Per-env recursion state, updated stride-wise in one reverse pass.
    let mut carry = vec![0.0f32; n_envs];
    let mut next_values = last_values.to_vec();

    for t in (0..steps).rev() {
        let base = t * n_envs;
        for e in 0..n_envs {
            let i = base + e;
            let mask = if dones[i] { 0.0 } else { 1.0 };
            // δ_t = r_t + γ V(s_{t+1}) - V(s_t), then
            // A_t = δ_t + γλ A_{t+1}, both cut at episode ends.
            let delta = rewards[i] + gamma * next_values[e] * mask - values[i];
            carry[e] = delta + gamma * gae_lambda * mask * carry[e];
            advantages[i] = carry[e];
            returns[i] = carry[e] + values[i];
            next_values[e] = values[i];
        }
    }

    (advantages, returns)
}

/// Single-trajectory advantages and returns: the one-environment case of
/// [`compute_gae_interleaved`].
pub fn compute_gae(
    rewards: &[f32],
    values: &[f32],
    dones: &[bool],
    last_value: f32,
    gamma: f32,
    gae_lambda: f32,
) -> (Vec<f32>, Vec<f32>) {
    compute_gae_interleaved(rewards, values, dones, &[last_value], 1, gamma, gae_lambda)
}

/// Normalize advantages to zero mean and unit variance in place.
///
/// A standard PPO variance-reduction step applied per minibatch.
pub fn normalize_advantages(advantages: &mut [f32]) {
    let n = advantages.len();
    if n < 2 {
        return;
    }
    let mean: f32 = advantages.iter().sum::<f32>() / n as f32;
    let var: f32 = advantages.iter().map(|a| (a - mean).powi(2)).sum::<f32>() / n as f32;
    let std = var.sqrt().max(1e-8);
    for a in advantages.iter_mut() {
        *a = (*a - mean) / std;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reference scan over one environment's trajectory, written the
    /// textbook way for comparison against the strided pass.
    fn naive_single_env(
        rewards: &[f32],
        values: &[f32],
        dones: &[bool],
        last_value: f32,
        gamma: f32,
        gae_lambda: f32,
    ) -> (Vec<f32>, Vec<f32>) {
        let n = rewards.len();
        let mut advantages = vec![0.0f32; n];
        let mut returns = vec![0.0f32; n];
        let mut acc = 0.0f32;
        let mut next_value = last_value;
        for t in (0..n).rev() {
            let mask = if dones[t] { 0.0 } else { 1.0 };
            let delta = rewards[t] + gamma * next_value * mask - values[t];
            acc = delta + gamma * gae_lambda * mask * acc;
            advantages[t] = acc;
            returns[t] = acc + values[t];
            next_value = values[t];
        }
        (advantages, returns)
    }

    #[test]
    fn single_step_no_bootstrap() {
        // One terminal step: advantage = r - V(s), return = r.
        let (adv, ret) = compute_gae(&[1.0], &[0.5], &[true], 0.0, 0.99, 0.95);
        assert!((adv[0] - 0.5).abs() < 1e-6);
        assert!((ret[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn bootstrap_uses_last_value_when_not_done() {
        let (adv, _) = compute_gae(&[0.0], &[0.0], &[false], 2.0, 0.5, 1.0);
        // δ = 0 + 0.5 * 2.0 - 0 = 1.0
        assert!((adv[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn done_flag_blocks_credit_across_episodes() {
        // Step 0 ends an episode; the large reward at step 1 must not leak
        // into step 0's advantage.
        let (adv, _) = compute_gae(&[0.0, 100.0], &[0.0, 0.0], &[true, true], 0.0, 0.99, 0.95);
        assert!(adv[0].abs() < 1e-6);
        assert!((adv[1] - 100.0).abs() < 1e-6);
    }

    #[test]
    fn lambda_zero_is_one_step_td() {
        let rewards = [1.0, 1.0, 1.0];
        let values = [0.5, 0.5, 0.5];
        let dones = [false, false, false];
        let (adv, _) = compute_gae(&rewards, &values, &dones, 0.5, 0.9, 0.0);
        for t in 0..3 {
            let next_v = if t == 2 { 0.5 } else { values[t + 1] };
            let expected = rewards[t] + 0.9 * next_v - values[t];
            assert!((adv[t] - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn strided_pass_matches_per_env_reference() {
        let n_envs = 2;
        let steps = 3;
        // Interleaved [env0_t0, env1_t0, env0_t1, ...]
        let rewards = [1.0, -1.0, 0.5, -0.5, 2.0, -2.0];
        let values = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        let dones = [false, false, false, true, false, false];
        let last_values = [0.7, 0.8];

        let (adv, ret) = compute_gae_interleaved(
            &rewards,
            &values,
            &dones,
            &last_values,
            n_envs,
            0.99,
            0.95,
        );

        for e in 0..n_envs {
            let er: Vec<f32> = (0..steps).map(|t| rewards[t * n_envs + e]).collect();
            let ev: Vec<f32> = (0..steps).map(|t| values[t * n_envs + e]).collect();
            let ed: Vec<bool> = (0..steps).map(|t| dones[t * n_envs + e]).collect();
            let (ea, ert) = naive_single_env(&er, &ev, &ed, last_values[e], 0.99, 0.95);
            for t in 0..steps {
                assert!((adv[t * n_envs + e] - ea[t]).abs() < 1e-6);
                assert!((ret[t * n_envs + e] - ert[t]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn scalar_wrapper_equals_interleaved_with_one_env() {
        let rewards = [0.3, -0.2, 1.1, 0.0];
        let values = [0.5, 0.4, 0.2, 0.1];
        let dones = [false, true, false, false];
        let a = compute_gae(&rewards, &values, &dones, 0.9, 0.99, 0.95);
        let b = compute_gae_interleaved(&rewards, &values, &dones, &[0.9], 1, 0.99, 0.95);
        assert_eq!(a, b);
    }

    #[test]
    fn normalization_produces_zero_mean_unit_std() {
        let mut adv = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        normalize_advantages(&mut adv);
        let mean: f32 = adv.iter().sum::<f32>() / adv.len() as f32;
        let var: f32 = adv.iter().map(|a| (a - mean).powi(2)).sum::<f32>() / adv.len() as f32;
        assert!(mean.abs() < 1e-6);
        assert!((var.sqrt() - 1.0).abs() < 1e-4);
    }
}
