//! Sequential hyperparameter study.
//!
//! Runs numbered trials against an objective closure, keeps a full record
//! of every trial (including failures), and can persist both a
//! plain-text best-result line and a JSON leaderboard.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::sampler::{ParamValue, Trial};
use crate::orchestrator::TrialError;

/// Outcome of one trial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialRecord {
    pub number: usize,
    pub params: BTreeMap<String, ParamValue>,
    /// Objective value; `None` for failed trials.
    pub value: Option<f64>,
    /// Failure description for failed trials.
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// A maximizing study over a parameter space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Study {
    pub name: String,
    pub seed: u64,
    pub trials: Vec<TrialRecord>,
}

impl Study {
    pub fn new(name: impl Into<String>, seed: u64) -> Self {
        Self {
            name: name.into(),
            seed,
            trials: Vec::new(),
        }
    }

    /// Run `n_trials` trials of `objective`, maximizing its return value.
    ///
    /// A failed trial is recorded with its error string and the study
    /// moves on to the next trial; only the caller's panic can stop a
    /// study early.
    pub fn optimize<F>(&mut self, n_trials: usize, mut objective: F)
    where
        F: FnMut(&mut Trial) -> Result<f64, TrialError>,
    {
        let start_number = self.trials.len();
        for number in start_number..start_number + n_trials {
            let mut trial = Trial::new(self.seed, number);
            let started_at = Utc::now();
            let result = objective(&mut trial);
            let finished_at = Utc::now();
            let params = trial.into_params();

            match result {
                Ok(value) => {
                    info!(study = %self.name, trial = number, value, "trial complete");
                    self.trials.push(TrialRecord {
                        number,
                        params,
                        value: Some(value),
                        error: None,
                        started_at,
                        finished_at,
                    });
                }
                Err(e) => {
                    warn!(study = %self.name, trial = number, error = %e, "trial failed");
                    self.trials.push(TrialRecord {
                        number,
                        params,
                        value: None,
                        error: Some(e.to_string()),
                        started_at,
                        finished_at,
                    });
                }
            }
        }
    }

    /// Completed trial with the highest objective value.
    pub fn best_trial(&self) -> Option<&TrialRecord> {
        self.trials
            .iter()
            .filter(|t| t.value.is_some_and(f64::is_finite))
            .max_by(|a, b| {
                // Both values are Some and finite here.
                a.value
                    .partial_cmp(&b.value)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    pub fn n_completed(&self) -> usize {
        self.trials.iter().filter(|t| t.value.is_some()).count()
    }

    pub fn n_failed(&self) -> usize {
        self.trials.iter().filter(|t| t.error.is_some()).count()
    }

    /// Append a plain-text record of the best trial to `path`.
    pub fn write_results(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        match self.best_trial() {
            Some(best) => {
                let params = best
                    .params
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(
                    file,
                    "[{}] study {}: best trial {} value {:.6} ({})",
                    Utc::now().to_rfc3339(),
                    self.name,
                    best.number,
                    best.value.unwrap_or(f64::NAN),
                    params
                )?;
            }
            None => {
                writeln!(
                    file,
                    "[{}] study {}: no completed trials ({} failed)",
                    Utc::now().to_rfc3339(),
                    self.name,
                    self.n_failed()
                )?;
            }
        }
        Ok(())
    }

    /// Write the full trial leaderboard as JSON to `path`.
    pub fn write_report(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)
            .map_err(std::io::Error::from)
    }
}
