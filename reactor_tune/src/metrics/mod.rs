//! Training metrics and logging.
//!
//! ## Loggers
//!
//! - [`CsvLogger`]: CSV file logging for analysis
//! - [`MultiLogger`]: Combine multiple loggers

pub mod logger;

pub use logger::{CsvLogger, MetricsLogger, MultiLogger, TrainingSnapshot};
