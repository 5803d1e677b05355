//! Follow control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

// Internal
use super::{FollowCtrlError, MIN_FOLLOW_DISTANCE_M, MIN_FOLLOW_HEIGHT_M};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for follow control.
///
/// The selectors are kept as raw integers, as they would be in the parameter
/// store, and are decoded every cycle so that an out of range value degrades
/// to a safe default rather than failing to load.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Params {

    /// Minimum follow height. In constant altitude mode the vehicle will not
    /// descend below this height, in target tracking mode this is the height
    /// kept above the target.
    ///
    /// Units: meters
    pub min_follow_height_m: f64,

    /// Horizontal distance to keep between the target and the vehicle.
    ///
    /// Units: meters
    pub follow_distance_m: f64,

    /// Follow perspective selector, see `Perspective` for the codes.
    pub perspective: i32,

    /// Altitude mode selector, see `AltitudeMode` for the codes.
    pub alt_mode: i32
}

/// A set of parameters which can be changed while the controller runs.
///
/// Clones share the same underlying parameters.
#[derive(Debug, Clone, Default)]
pub struct SharedParams {
    inner: Arc<RwLock<Params>>
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Provides the follow control parameters.
///
/// The controller reads the parameters once at the start of every cycle, so
/// implementations must be cheap and must not block.
pub trait ConfigProvider {
    /// Get the current parameters.
    fn params(&self) -> Params;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            min_follow_height_m: 8.0,
            follow_distance_m: 8.0,
            perspective: 1,
            alt_mode: 0
        }
    }
}

impl Params {
    /// Load the parameters from a file in the params directory.
    pub fn load(param_file_path: &str) -> Result<Self, FollowCtrlError> {
        let params: Self = util::params::load(param_file_path)
            .map_err(FollowCtrlError::ParamLoadError)?;

        params.validate()?;

        Ok(params)
    }

    /// Check that the distances are usable. The selectors are not checked as
    /// unknown codes are decoded to their defaults.
    pub fn validate(&self) -> Result<(), FollowCtrlError> {
        // Written so that NaN fails the comparison
        if !(self.follow_distance_m.is_finite()
            && self.follow_distance_m >= MIN_FOLLOW_DISTANCE_M)
        {
            return Err(FollowCtrlError::InvalidParam(
                "follow_distance_m", self.follow_distance_m
            ));
        }

        if !(self.min_follow_height_m.is_finite()
            && self.min_follow_height_m >= MIN_FOLLOW_HEIGHT_M)
        {
            return Err(FollowCtrlError::InvalidParam(
                "min_follow_height_m", self.min_follow_height_m
            ));
        }

        Ok(())
    }
}

impl ConfigProvider for Params {
    fn params(&self) -> Params {
        self.clone()
    }
}

impl SharedParams {
    pub fn new(params: Params) -> Self {
        Self {
            inner: Arc::new(RwLock::new(params))
        }
    }

    /// Modify the parameters in place.
    pub fn modify<F: FnOnce(&mut Params)>(&self, f: F) {
        // A poisoned lock still holds a usable set of parameters
        let mut guard = match self.inner.write() {
            Ok(g) => g,
            Err(e) => e.into_inner()
        };

        f(&mut guard);
    }
}

impl ConfigProvider for SharedParams {
    fn params(&self) -> Params {
        match self.inner.read() {
            Ok(p) => p.clone(),
            Err(e) => e.into_inner().clone()
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_params_from_toml() {
        let p: Params = util::params::from_str(
            "min_follow_height_m = 8.0\n\
             follow_distance_m = 5.0\n\
             perspective = 2\n\
             alt_mode = 1\n"
        ).unwrap();

        assert_eq!(p.follow_distance_m, 5.0);
        assert_eq!(p.perspective, 2);
        assert_eq!(p.alt_mode, 1);
    }

    #[test]
    fn test_validate() {
        assert!(Params::default().validate().is_ok());

        let p = Params {
            follow_distance_m: -5.0,
            ..Params::default()
        };
        match p.validate() {
            Err(FollowCtrlError::InvalidParam(name, value)) => {
                assert_eq!(name, "follow_distance_m");
                assert_eq!(value, -5.0);
            },
            r => panic!("Expected an invalid follow distance, got {:?}", r)
        }

        let p = Params {
            follow_distance_m: 0.5,
            ..Params::default()
        };
        assert!(p.validate().is_err());

        let p = Params {
            follow_distance_m: std::f64::NAN,
            ..Params::default()
        };
        assert!(p.validate().is_err());

        let p = Params {
            min_follow_height_m: 2.0,
            ..Params::default()
        };
        match p.validate() {
            Err(FollowCtrlError::InvalidParam(name, _)) => {
                assert_eq!(name, "min_follow_height_m")
            },
            r => panic!("Expected an invalid follow height, got {:?}", r)
        }

        let p = Params {
            min_follow_height_m: std::f64::INFINITY,
            ..Params::default()
        };
        assert!(p.validate().is_err());

        // Limits are inclusive
        let p = Params {
            min_follow_height_m: MIN_FOLLOW_HEIGHT_M,
            follow_distance_m: MIN_FOLLOW_DISTANCE_M,
            ..Params::default()
        };
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_shared_params() {
        let shared = SharedParams::new(Params::default());
        let handle = shared.clone();

        handle.modify(|p| p.perspective = 3);

        assert_eq!(shared.params().perspective, 3);
    }
}
