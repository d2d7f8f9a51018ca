//! Hyperparameter tuning for PPO on the disturbed CSTR task.
//!
//! Runs a fixed-seed sequential study: every trial samples PPO
//! hyperparameters, trains against ten disturbance-randomized reactor
//! replicas, and reports the mean held-out evaluation reward as its
//! objective. The best-trial summary is appended to
//! `cstr_tuning_results.txt` and the full leaderboard is written as JSON.

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use cstr_env::CstrConfig;
use reactor_tune::orchestrator::{run_training, RunConfig};
use reactor_tune::search::{HyperparameterSample, Study};
use reactor_tune::DisturbanceSpec;

/// Global seed: disturbances, policy init, action sampling, and parameter
/// draws all derive from it.
const SEED: u64 = 1990;
const N_ENVS: usize = 10;
const N_TRIALS: usize = 100;
const TOTAL_TIMESTEPS: usize = 100_000;
const EVAL_FREQ: usize = 100;
const N_EVAL_EPISODES: usize = 10;
const NUM_CYCLES: f64 = 1.0;

fn enable_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

fn main() {
    enable_tracing();

    let save_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("cstr_tuning"));
    if let Err(e) = std::fs::create_dir_all(&save_dir) {
        tracing::error!(dir = %save_dir.display(), error = %e, "cannot create save directory");
        std::process::exit(1);
    }

    let template = CstrConfig::new().with_noise_seed(SEED);
    let spec = DisturbanceSpec::new("Ti", 350.0, 450.0);

    tracing::info!(
        seed = SEED,
        n_envs = N_ENVS,
        n_trials = N_TRIALS,
        total_timesteps = TOTAL_TIMESTEPS,
        "starting CSTR tuning study"
    );

    let mut study = Study::new("cstr_mult_disturb", SEED);
    study.optimize(N_TRIALS, |trial| {
        let sample = HyperparameterSample::suggest(trial);
        tracing::info!(trial = trial.number(), params = ?trial.params(), "trial start");

        let run = RunConfig::new()
            .with_n_envs(N_ENVS)
            .with_total_timesteps(TOTAL_TIMESTEPS)
            .with_eval_freq(EVAL_FREQ)
            .with_n_eval_episodes(N_EVAL_EPISODES)
            .with_seed(SEED)
            .with_log_dir(save_dir.join(format!("trial_{:03}", trial.number())));

        run_training(
            &template,
            &spec,
            sample.ppo_config(),
            sample.schedule(NUM_CYCLES),
            &run,
        )
    });

    if let Some(best) = study.best_trial() {
        tracing::info!(
            trial = best.number,
            value = best.value,
            "study finished"
        );
    } else {
        tracing::warn!(failed = study.n_failed(), "study finished with no completed trials");
    }

    if let Err(e) = study.write_results(save_dir.join("cstr_tuning_results.txt")) {
        tracing::error!(error = %e, "failed to append results file");
    }
    if let Err(e) = study.write_report(save_dir.join("cstr_tuning_report.json")) {
        tracing::error!(error = %e, "failed to write report");
    }
}
