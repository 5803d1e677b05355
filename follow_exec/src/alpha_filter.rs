//! # Alpha filter
//!
//! A first order low-pass filter (exponential smoothing) which works on any
//! value type which can be added together and scaled by an `f64`, so both
//! scalars and `nalgebra` vectors can be filtered component-wise.
//!
//! The blend coefficient is derived from the sample interval and a time
//! constant:
//!
//! ```text
//! alpha = dt / (time_constant + dt)
//! state = state * (1 - alpha) + sample * alpha
//! ```
//!
//! Both `dt` and the time constant may change every cycle, so
//! `set_parameters` should be called before each `update`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::ops::{Add, Mul};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// First order low-pass filter.
///
/// The filter has no notion of "uninitialised", callers should `reset` it to
/// a sensible value before filtering. Updating with a non-finite sample will
/// poison the state until the next `reset`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AlphaFilter<T> {
    /// Blend coefficient in [0, 1]. Zero means the state never moves.
    alpha: f64,

    /// Current filtered value
    state: T,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<T> AlphaFilter<T>
where
    T: Copy + Add<Output = T> + Mul<f64, Output = T>,
{
    /// Create a new filter whose state is `value`.
    pub fn new(value: T) -> Self {
        Self { alpha: 0.0, state: value }
    }

    /// Set the state to `value` without any blending.
    pub fn reset(&mut self, value: T) {
        self.state = value;
    }

    /// Recompute the blend coefficient from the sample interval `dt_s` and
    /// the filter's `time_constant_s`.
    ///
    /// If the parameters do not give a usable coefficient (negative or
    /// non-finite) the previous coefficient is kept.
    pub fn set_parameters(&mut self, dt_s: f64, time_constant_s: f64) {
        let denominator = time_constant_s + dt_s;

        if dt_s >= 0.0 && denominator.is_finite() && denominator > std::f64::EPSILON {
            self.set_alpha(dt_s / denominator);
        }
    }

    /// Directly set the blend coefficient, which is clamped to [0, 1].
    pub fn set_alpha(&mut self, alpha: f64) {
        if alpha.is_finite() {
            self.alpha = alpha.max(0.0).min(1.0);
        }
    }

    /// Blend a new sample into the state, returning the new state.
    pub fn update(&mut self, sample: T) -> T {
        self.state = self.state * (1.0 - self.alpha) + sample * self.alpha;
        self.state
    }

    /// Current filtered value.
    pub fn state(&self) -> T {
        self.state
    }

    /// Current blend coefficient.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Vector2, Vector3};

    #[test]
    fn test_alpha_from_parameters() {
        let mut f = AlphaFilter::new(0.0f64);

        f.set_parameters(0.5, 1.5);
        assert_relative_eq!(f.alpha(), 0.25);

        // A time constant of zero passes samples straight through
        f.set_parameters(0.1, 0.0);
        assert_relative_eq!(f.alpha(), 1.0);
    }

    #[test]
    fn test_bad_parameters_keep_alpha() {
        let mut f = AlphaFilter::new(0.0f64);
        f.set_parameters(0.5, 1.5);

        f.set_parameters(0.0, 0.0);
        assert_relative_eq!(f.alpha(), 0.25);

        f.set_parameters(std::f64::NAN, 1.0);
        assert_relative_eq!(f.alpha(), 0.25);

        f.set_parameters(-0.1, 1.0);
        assert_relative_eq!(f.alpha(), 0.25);
    }

    #[test]
    fn test_scalar_update() {
        let mut f = AlphaFilter::new(0.0f64);
        f.set_parameters(0.5, 1.5);

        assert_relative_eq!(f.update(4.0), 1.0);
        assert_relative_eq!(f.update(4.0), 1.75);
        assert_relative_eq!(f.state(), 1.75);
    }

    #[test]
    fn test_reset_does_not_blend() {
        let mut f = AlphaFilter::new(0.0f64);
        f.set_parameters(0.5, 1.5);

        f.reset(10.0);
        assert_relative_eq!(f.state(), 10.0);
        assert_relative_eq!(f.update(10.0), 10.0);
    }

    #[test]
    fn test_zero_alpha_holds() {
        let mut f = AlphaFilter::new(3.0f64);

        assert_relative_eq!(f.update(100.0), 3.0);
    }

    #[test]
    fn test_vector_update_is_componentwise() {
        let mut f = AlphaFilter::new(Vector2::new(0.0, 10.0));
        f.set_alpha(0.5);

        let s = f.update(Vector2::new(2.0, 0.0));
        assert_relative_eq!(s.x, 1.0);
        assert_relative_eq!(s.y, 5.0);
    }

    #[test]
    fn test_vector_converges() {
        let target = Vector3::new(10.0, -4.0, 2.0);
        let mut f = AlphaFilter::new(Vector3::zeros());

        for _ in 0..2000 {
            f.set_parameters(0.02, 1.0);
            f.update(target);
        }

        assert!((f.state() - target).norm() < 1e-6);
    }

    #[test]
    fn test_nan_poisons_until_reset() {
        let mut f = AlphaFilter::new(1.0f64);
        f.set_alpha(0.5);

        f.update(std::f64::NAN);
        assert!(f.state().is_nan());
        f.update(1.0);
        assert!(f.state().is_nan());

        f.reset(2.0);
        assert_relative_eq!(f.update(2.0), 2.0);
    }
}
