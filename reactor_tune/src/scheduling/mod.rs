//! Learning rate scheduling module.
//!
//! Schedulers map training progress to a learning rate. Progress is
//! expressed as the fraction of training *remaining*: `1.0` at the first
//! gradient update, decreasing towards `0.0` at the last.
//!
//! ## Available Schedulers
//!
//! - [`ConstantLr`]: No scheduling (constant rate)
//! - [`CosineAnnealing`]: Cyclic cosine interpolation between a minimum
//!   and maximum rate
//!
//! ## Example
//!
//! ```rust,ignore
//! use reactor_tune::scheduling::{CosineAnnealing, LrSchedule};
//!
//! let schedule = CosineAnnealing::new(2e-3, 1e-2, 4.0);
//!
//! // In training loop:
//! let lr = schedule.rate(progress_remaining);
//! ```

pub mod lr_scheduler;

pub use lr_scheduler::{cosine_annealing, ConstantLr, CosineAnnealing, LrSchedule};
