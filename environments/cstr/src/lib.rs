//! # CSTR Environment
//!
//! Continuous stirred-tank reactor setpoint-tracking environment for the
//! `reactor-tune` training stack.
//!
//! The task: hold the reactor temperature on a stepped setpoint by
//! manipulating the coolant temperature, while the inlet stream
//! temperature jumps between random levels the agent cannot observe
//! directly. Actions and observations are normalized to `[-1, 1]`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cstr_env::CstrConfig;
//! use reactor_tune::environment::EnvTemplate;
//! use reactor_tune::generate;
//!
//! let config = CstrConfig::new()
//!     .with_noise_seed(1990)
//!     .with_disturbance(generate(1990, 100, 350.0, 450.0));
//! let mut env = config.build()?;
//! let obs = env.reset();
//! ```

pub mod config;
pub mod env;
pub mod model;

pub use config::{BoxSpace, CstrConfig};
pub use env::CstrEnv;
pub use model::ReactorParams;
