//! Target position prediction

use nalgebra::Vector3;

/// Predict where the target will be after `dt_s` seconds by forward
/// integration of its estimated position, velocity and acceleration.
pub fn predict_target_position(
    dt_s: f64,
    position_m: &Vector3<f64>,
    velocity_ms: &Vector3<f64>,
    acceleration_mss: &Vector3<f64>
) -> Vector3<f64> {
    position_m + velocity_ms * dt_s + acceleration_mss * (0.5 * dt_s * dt_s)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_stationary_target() {
        let p = Vector3::new(10.0, 0.0, -5.0);

        assert_eq!(
            predict_target_position(1.5, &p, &Vector3::zeros(), &Vector3::zeros()),
            p
        );
    }

    #[test]
    fn test_constant_acceleration() {
        let p = predict_target_position(
            2.0,
            &Vector3::new(1.0, 0.0, 0.0),
            &Vector3::new(1.0, -1.0, 0.0),
            &Vector3::new(0.0, 0.0, 2.0)
        );

        assert_eq!(p, Vector3::new(3.0, -2.0, 4.0));
    }

    #[test]
    fn test_zero_horizon() {
        let p = Vector3::new(4.0, 5.0, 6.0);
        let v = Vector3::new(100.0, 100.0, 100.0);

        assert_eq!(predict_target_position(0.0, &p, &v, &v), p);
    }
}
