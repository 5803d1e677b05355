//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{storage::Storage, Dim, Matrix, Vector2};
use num_traits::Float;

/// Clamp a value into the range `[min, max]`.
pub fn clamp<T>(value: &T, min: &T, max: &T) -> T
where
    T: Float
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Get the signed angular distance between two angles in the range of [0, 2pi].
///
/// This function will return the shortest signed distance between a and b accounting for wrapping
/// between 0 and 2pi.
pub fn get_ang_dist_2pi<T>(a: T, b: T) -> T
where
    T: Float
{
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();

    let c = rem_euclid(a - b, tau_t);
    let d = rem_euclid(b - a, tau_t);

    if c < d {
        -c
    }
    else {
        d
    }
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`, violating the mathematical definition, if
/// `self` is much smaller than `rhs.abs()` in magnitude and `self < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

/// Returns true if every element of the vector or matrix is finite.
pub fn all_finite<R, C, S>(m: &Matrix<f64, R, C, S>) -> bool
where
    R: Dim,
    C: Dim,
    S: Storage<f64, R, C>
{
    m.iter().all(|x| x.is_finite())
}

/// Normalise a 2D vector, or return the zero vector if it has (almost) no
/// length or isn't finite.
pub fn unit_or_zero(v: &Vector2<f64>) -> Vector2<f64> {
    if !all_finite(v) {
        return Vector2::zeros();
    }

    v.try_normalize(std::f64::EPSILON)
        .unwrap_or_else(Vector2::zeros)
}
