//! Learning rate schedulers for policy optimization.
//!
//! Provides the schedules used by the training orchestrator:
//! - `ConstantLr`: Fixed learning rate
//! - `CosineAnnealing`: Cyclic cosine interpolation between min and max LR
//!
//! # Data Integrity
//!
//! All schedulers validate inputs in debug builds and handle edge cases
//! gracefully in release builds to prevent NaN/Inf propagation into the
//! optimizer:
//!
//! - **Non-finite inputs**: NaN/Inf LR values trigger debug panic
//! - **Negative LR**: Negative learning rates trigger debug panic
//! - **Out-of-range progress**: Progress is clamped to `[0, 1]`

/// Learning rate schedule trait.
///
/// `progress_remaining` runs from `1.0` (start of training) down to `0.0`
/// (end of training).
pub trait LrSchedule: Send + Sync {
    /// Learning rate for the given remaining-progress fraction.
    fn rate(&self, progress_remaining: f64) -> f64;
}

/// Constant learning rate (no scheduling).
///
/// # Data Validation
///
/// In debug builds, panics if the LR is non-finite or negative. In release
/// builds, invalid values are replaced with 0.0.
#[derive(Debug, Clone)]
pub struct ConstantLr {
    lr: f64,
}

impl ConstantLr {
    /// Create a new constant LR schedule.
    ///
    /// # Panics (debug only)
    ///
    /// Panics if `lr` is NaN, Inf, or negative.
    pub fn new(lr: f64) -> Self {
        debug_assert!(lr.is_finite(), "ConstantLr: lr must be finite, got {}", lr);
        debug_assert!(lr >= 0.0, "ConstantLr: lr must be non-negative, got {}", lr);

        // In release, sanitize invalid values to 0.0
        let lr = if lr.is_finite() && lr >= 0.0 { lr } else { 0.0 };

        Self { lr }
    }

    /// Get the configured learning rate.
    pub fn lr(&self) -> f64 {
        self.lr
    }
}

impl LrSchedule for ConstantLr {
    fn rate(&self, _progress_remaining: f64) -> f64 {
        self.lr
    }
}

/// Cyclic cosine annealing between `min_lr` and `max_lr`.
///
/// At the start of training (`progress_remaining = 1.0`) the rate is
/// `max_lr`; it then follows `num_cycles` half-cosine oscillations of the
/// elapsed-progress fraction:
///
/// ```text
/// rate = min_lr + (max_lr - min_lr) / 2
///        * (1 + cos(pi * num_cycles * (1 - progress_remaining)))
/// ```
///
/// With an even integer `num_cycles` the schedule also ends at `max_lr`;
/// an odd integer ends at `min_lr`.
///
/// # Data Validation
///
/// In debug builds, panics if `min_lr > max_lr`, either rate is
/// non-finite/negative, or `num_cycles` is not finite and positive. In
/// release builds, invalid rates are sanitized to 0.0 and an invalid
/// cycle count falls back to 1.0.
#[derive(Debug, Clone)]
pub struct CosineAnnealing {
    min_lr: f64,
    max_lr: f64,
    num_cycles: f64,
}

impl CosineAnnealing {
    /// Create a new cosine annealing schedule.
    ///
    /// # Arguments
    ///
    /// * `min_lr` - Trough learning rate (finite, non-negative)
    /// * `max_lr` - Peak learning rate (finite, `>= min_lr`)
    /// * `num_cycles` - Number of half-cosine oscillations (finite, > 0)
    ///
    /// # Panics (debug only)
    ///
    /// Panics if any argument is invalid.
    pub fn new(min_lr: f64, max_lr: f64, num_cycles: f64) -> Self {
        debug_assert!(
            min_lr.is_finite() && min_lr >= 0.0,
            "CosineAnnealing: min_lr must be finite and non-negative, got {}",
            min_lr
        );
        debug_assert!(
            max_lr.is_finite() && max_lr >= 0.0,
            "CosineAnnealing: max_lr must be finite and non-negative, got {}",
            max_lr
        );
        debug_assert!(
            min_lr <= max_lr,
            "CosineAnnealing: min_lr {} exceeds max_lr {}",
            min_lr,
            max_lr
        );
        debug_assert!(
            num_cycles.is_finite() && num_cycles > 0.0,
            "CosineAnnealing: num_cycles must be finite and positive, got {}",
            num_cycles
        );

        let min_lr = if min_lr.is_finite() && min_lr >= 0.0 { min_lr } else { 0.0 };
        let max_lr = if max_lr.is_finite() && max_lr >= min_lr { max_lr } else { min_lr };
        let num_cycles = if num_cycles.is_finite() && num_cycles > 0.0 {
            num_cycles
        } else {
            1.0
        };

        Self {
            min_lr,
            max_lr,
            num_cycles,
        }
    }
}

impl LrSchedule for CosineAnnealing {
    fn rate(&self, progress_remaining: f64) -> f64 {
        cosine_annealing(progress_remaining, self.min_lr, self.max_lr, self.num_cycles)
    }
}

/// Cosine annealing as a free function.
///
/// Clamps `progress_remaining` into `[0, 1]` before evaluating, so a
/// slightly overshooting training loop cannot push the rate out of
/// `[min_lr, max_lr]`.
pub fn cosine_annealing(progress_remaining: f64, min_lr: f64, max_lr: f64, num_cycles: f64) -> f64 {
    let progress_remaining = if progress_remaining.is_finite() {
        progress_remaining.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let elapsed = 1.0 - progress_remaining;
    min_lr + (max_lr - min_lr) / 2.0 * (1.0 + (std::f64::consts::PI * num_cycles * elapsed).cos())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn constant_lr_ignores_progress() {
        let s = ConstantLr::new(3e-4);
        assert_eq!(s.rate(1.0), 3e-4);
        assert_eq!(s.rate(0.5), 3e-4);
        assert_eq!(s.rate(0.0), 3e-4);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic)]
    fn constant_lr_rejects_nan() {
        let _ = ConstantLr::new(f64::NAN);
    }

    #[test]
    fn cosine_starts_at_max() {
        let r = cosine_annealing(1.0, 0.002, 0.02, 4.0);
        assert!((r - 0.02).abs() < EPS);
    }

    #[test]
    fn even_cycle_count_ends_at_max() {
        let r = cosine_annealing(0.0, 0.002, 0.02, 4.0);
        assert!((r - 0.02).abs() < EPS);
    }

    #[test]
    fn odd_cycle_count_ends_at_min() {
        let r = cosine_annealing(0.0, 0.002, 0.02, 3.0);
        assert!((r - 0.002).abs() < EPS);
    }

    #[test]
    fn rate_stays_within_bounds() {
        let s = CosineAnnealing::new(0.002, 0.02, 4.0);
        for i in 0..=1000 {
            let p = i as f64 / 1000.0;
            let r = s.rate(p);
            assert!(
                (0.002 - EPS..=0.02 + EPS).contains(&r),
                "rate {} out of bounds at progress {}",
                r,
                p
            );
        }
    }

    #[test]
    fn half_cycle_touches_the_trough() {
        // One full cosine cycle: trough at elapsed = 0.5.
        let r = cosine_annealing(0.5, 0.002, 0.02, 1.0);
        assert!((r - 0.002).abs() < EPS);
    }

    #[test]
    fn overshooting_progress_is_clamped() {
        let s = CosineAnnealing::new(0.002, 0.02, 4.0);
        assert_eq!(s.rate(-0.1), s.rate(0.0));
        assert_eq!(s.rate(1.5), s.rate(1.0));
    }

    #[test]
    fn degenerate_range_is_constant() {
        let s = CosineAnnealing::new(0.01, 0.01, 4.0);
        assert_eq!(s.rate(0.7), 0.01);
        assert_eq!(s.rate(0.1), 0.01);
    }
}
