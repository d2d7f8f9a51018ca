//! End-to-end tuning tests on a shortened CSTR task.

use cstr_env::CstrConfig;
use reactor_tune::orchestrator::{run_training, RunConfig};
use reactor_tune::search::{HyperparameterSample, Study};
use reactor_tune::{DisturbanceSpec, PpoConfig};

fn short_template() -> CstrConfig {
    CstrConfig::new().with_horizon(20).with_noise_seed(1990)
}

fn short_run(seed: u64) -> RunConfig {
    RunConfig::new()
        .with_n_envs(2)
        .with_total_timesteps(400)
        .with_eval_freq(100)
        .with_n_eval_episodes(2)
        .with_seed(seed)
}

fn spec() -> DisturbanceSpec {
    DisturbanceSpec::new("Ti", 350.0, 450.0)
}

fn small_ppo() -> PpoConfig {
    PpoConfig::new()
        .with_n_steps(20)
        .with_batch_size(20)
        .with_net_arch(vec![8], vec![8])
}

#[test]
fn training_run_is_reproducible() {
    let schedule = reactor_tune::CosineAnnealing::new(2e-3, 1e-2, 1.0);
    let a = run_training(
        &short_template(),
        &spec(),
        small_ppo(),
        schedule.clone(),
        &short_run(1990),
    )
    .unwrap();
    let b = run_training(
        &short_template(),
        &spec(),
        small_ppo(),
        schedule,
        &short_run(1990),
    )
    .unwrap();
    assert_eq!(a, b);
    assert!(a.is_finite());
    // Rewards are negated squared errors, so the objective cannot be
    // positive.
    assert!(a <= 0.0);
}

#[test]
fn training_run_writes_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let run = short_run(7).with_log_dir(dir.path());
    run_training(
        &short_template(),
        &spec(),
        small_ppo(),
        reactor_tune::CosineAnnealing::new(2e-3, 1e-2, 1.0),
        &run,
    )
    .unwrap();

    assert!(dir.path().join("best_policy.json").exists());
    let csv = std::fs::read_to_string(dir.path().join("training.csv")).unwrap();
    assert!(csv.lines().count() > 1);
}

#[test]
fn mini_study_completes_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let template = short_template();
    let disturbance_spec = spec();

    let mut study = Study::new("cstr_mini", 1990);
    study.optimize(2, |trial| {
        let sample = HyperparameterSample::suggest(trial);
        // Shrink the sampled rollout sizes to keep the test cheap while
        // still exercising the sampled entropy and learning rates.
        let ppo = sample
            .ppo_config()
            .with_n_steps(20)
            .with_batch_size(20)
            .with_net_arch(vec![8], vec![8]);
        run_training(
            &template,
            &disturbance_spec,
            ppo,
            sample.schedule(1.0),
            &short_run(1990),
        )
    });

    assert_eq!(study.trials.len(), 2);
    assert_eq!(study.n_failed(), 0);
    let best = study.best_trial().unwrap();
    assert!(best.params.contains_key("ent_coef"));
    assert!(best.params.contains_key("min_lr"));

    let results = dir.path().join("results.txt");
    study.write_results(&results).unwrap();
    let text = std::fs::read_to_string(&results).unwrap();
    assert!(text.contains("cstr_mini"));

    study.write_report(dir.path().join("report.json")).unwrap();
    assert!(dir.path().join("report.json").exists());
}
