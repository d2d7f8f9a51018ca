//! Training loggers.
//!
//! Provides logging backends for per-evaluation training metrics.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use crate::learner::LearnerStats;

/// Training snapshot for logging.
#[derive(Debug, Clone)]
pub struct TrainingSnapshot {
    /// Total environment steps.
    pub env_steps: usize,
    /// Number of completed episodes.
    pub episodes: usize,
    /// Average training episode reward.
    pub avg_reward: f32,
    /// Policy loss.
    pub policy_loss: f32,
    /// Value function loss.
    pub value_loss: f32,
    /// Entropy.
    pub entropy: f32,
    /// Current learning rate.
    pub learning_rate: f64,
    /// Mean held-out evaluation reward (if an evaluation ran).
    pub eval_reward: Option<f32>,
}

impl TrainingSnapshot {
    pub fn from_stats(stats: &LearnerStats) -> Self {
        Self {
            env_steps: stats.total_steps,
            episodes: stats.episodes,
            avg_reward: stats.avg_reward,
            policy_loss: stats.policy_loss,
            value_loss: stats.value_loss,
            entropy: stats.entropy,
            learning_rate: stats.learning_rate,
            eval_reward: None,
        }
    }

    /// Set the held-out evaluation reward.
    pub fn with_eval_reward(mut self, reward: f32) -> Self {
        self.eval_reward = Some(reward);
        self
    }
}

/// Logger trait for different logging backends.
pub trait MetricsLogger: Send {
    /// Log a training snapshot.
    fn log(&mut self, snapshot: &TrainingSnapshot);

    /// Flush any buffered output.
    fn flush(&mut self);
}

/// CSV file logger.
pub struct CsvLogger {
    writer: BufWriter<File>,
    start_time: Instant,
}

impl CsvLogger {
    /// Create a new CSV logger writing to `path`.
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(
            writer,
            "env_steps,episodes,avg_reward,policy_loss,value_loss,entropy,learning_rate,eval_reward,elapsed_secs"
        )?;

        Ok(Self {
            writer,
            start_time: Instant::now(),
        })
    }
}

impl MetricsLogger for CsvLogger {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        let eval_str = snapshot
            .eval_reward
            .map(|r| format!("{:.6}", r))
            .unwrap_or_default();

        let _ = writeln!(
            self.writer,
            "{},{},{:.6},{:.6},{:.6},{:.6},{:.8},{},{:.2}",
            snapshot.env_steps,
            snapshot.episodes,
            snapshot.avg_reward,
            snapshot.policy_loss,
            snapshot.value_loss,
            snapshot.entropy,
            snapshot.learning_rate,
            eval_str,
            self.start_time.elapsed().as_secs_f32()
        );
    }

    fn flush(&mut self) {
        let _ = self.writer.flush();
    }
}

impl Drop for CsvLogger {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Multi-logger that writes to multiple backends.
pub struct MultiLogger {
    loggers: Vec<Box<dyn MetricsLogger>>,
}

impl MultiLogger {
    pub fn new() -> Self {
        Self {
            loggers: Vec::new(),
        }
    }

    /// Add a logger backend.
    pub fn add(mut self, logger: Box<dyn MetricsLogger>) -> Self {
        self.loggers.push(logger);
        self
    }
}

impl Default for MultiLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsLogger for MultiLogger {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        for logger in &mut self.loggers {
            logger.log(snapshot);
        }
    }

    fn flush(&mut self) {
        for logger in &mut self.loggers {
            logger.flush();
        }
    }
}
