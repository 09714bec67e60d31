use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Time step used when nothing stiff needs resolving.
pub const DEF_TSTEP: f64 = 0.025;

/// An applied force: on/off plus its two parameters.
///
/// The meaning of `value` and `misc` depends on the force:
///
/// | force            | `value`    | `misc`               |
/// |------------------|------------|----------------------|
/// | gravity          | magnitude  | direction in degrees |
/// | center of mass   | gain       | damping              |
/// | point attraction | magnitude  | exponent             |
/// | wall             | magnitude  | exponent             |
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Force {
    pub enabled: bool,
    pub value: f64,
    pub misc: f64,
}

impl Force {
    const fn off(value: f64, misc: f64) -> Self {
        Self {
            enabled: false,
            value,
            misc,
        }
    }
}

/// Which of the four viewport walls are solid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Walls {
    pub top: bool,
    pub left: bool,
    pub right: bool,
    pub bottom: bool,
}

impl Walls {
    /// All four walls enabled.
    pub const ALL: Self = Self {
        top: true,
        left: true,
        right: true,
        bottom: true,
    };

    /// No walls.
    pub const NONE: Self = Self {
        top: false,
        left: false,
        right: false,
        bottom: false,
    };
}

/// Shared simulation parameters.
///
/// Holds both the physics configuration and the "current" values a host
/// applies to newly created or selected entities (`mass`, `elasticity`,
/// `stiffness`, `damping`, `fix_mass`). [`System::eval_selection`] writes the
/// latter back from the selection.
///
/// [`System::eval_selection`]: crate::core::System::eval_selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// Current mass value.
    pub mass: f64,
    /// Current elasticity.
    pub elasticity: f64,
    /// Current spring stiffness.
    pub stiffness: f64,
    /// Current spring damping.
    pub damping: f64,
    /// New masses are created fixed.
    pub fix_mass: bool,
    /// Mass used as the reference point for centering and point attraction.
    pub center: Option<usize>,
    pub gravity: Force,
    pub center_of_mass: Force,
    pub point_attraction: Force,
    pub wall: Force,
    /// Linear viscous drag coefficient.
    pub viscosity: f64,
    /// Wall stickiness.
    pub stickiness: f64,
    /// Step size; the adaptive integrator updates it every tick.
    pub time_step: f64,
    /// Divisor applied to the adaptive error estimate.
    pub precision: f64,
    /// Use the adaptive RKF45 integrator instead of fixed-step RK4.
    pub adaptive: bool,
    pub walls: Walls,
    /// Resolve pairwise mass collisions.
    pub collide: bool,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            mass: 1.0,
            elasticity: 1.0,
            stiffness: 1.0,
            damping: 1.0,
            fix_mass: false,
            center: None,
            gravity: Force::off(10.0, 0.0),
            center_of_mass: Force::off(5.0, 2.0),
            point_attraction: Force::off(10.0, 0.0),
            wall: Force::off(10000.0, 1.0),
            viscosity: 0.0,
            stickiness: 0.0,
            time_step: DEF_TSTEP,
            precision: 1.0,
            adaptive: false,
            walls: Walls::ALL,
            collide: false,
        }
    }
}

impl Params {
    /// Reject values the physics cannot work with.
    ///
    /// Errors:
    /// - `Error::InvalidParam` for any non-finite value, or a non-positive
    ///   `mass`, `time_step` or `precision`.
    pub fn validate(&self) -> Result<()> {
        let scalars = [
            ("mass", self.mass),
            ("elasticity", self.elasticity),
            ("stiffness", self.stiffness),
            ("damping", self.damping),
            ("viscosity", self.viscosity),
            ("stickiness", self.stickiness),
            ("time_step", self.time_step),
            ("precision", self.precision),
        ];
        for (name, value) in scalars {
            if !value.is_finite() {
                return Err(Error::InvalidParam(format!("{name} must be finite")));
            }
        }
        let forces = [
            ("gravity", self.gravity),
            ("center_of_mass", self.center_of_mass),
            ("point_attraction", self.point_attraction),
            ("wall", self.wall),
        ];
        for (name, f) in forces {
            if !f.value.is_finite() || !f.misc.is_finite() {
                return Err(Error::InvalidParam(format!(
                    "{name} parameters must be finite"
                )));
            }
        }
        if self.mass <= 0.0 {
            return Err(Error::InvalidParam("mass must be > 0".into()));
        }
        if self.time_step <= 0.0 {
            return Err(Error::InvalidParam("time_step must be > 0".into()));
        }
        if self.precision <= 0.0 {
            return Err(Error::InvalidParam("precision must be > 0".into()));
        }
        Ok(())
    }

    /// Restore the defaults.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() -> Result<()> {
        let p = Params::default();
        p.validate()?;
        assert_eq!(p.time_step, DEF_TSTEP);
        assert_eq!(p.walls, Walls::ALL);
        assert!(!p.gravity.enabled && !p.wall.enabled);
        assert_eq!(p.center, None);
        Ok(())
    }

    #[test]
    fn invalid_values_rejected() {
        let mut p = Params {
            time_step: 0.0,
            ..Params::default()
        };
        assert!(p.validate().unwrap_err().to_string().contains("time_step"));

        p.time_step = DEF_TSTEP;
        p.precision = -1.0;
        assert!(p.validate().unwrap_err().to_string().contains("precision"));

        p.precision = 1.0;
        p.gravity.misc = f64::INFINITY;
        assert!(p.validate().unwrap_err().to_string().contains("gravity"));

        p.gravity.misc = 0.0;
        for mass in [0.0, -2.0] {
            p.mass = mass;
            assert!(p.validate().unwrap_err().to_string().contains("mass"));
        }
    }

    #[test]
    fn reset_restores_defaults() {
        let mut p = Params {
            viscosity: 3.0,
            center: Some(4),
            ..Params::default()
        };
        p.reset();
        assert_eq!(p, Params::default());
    }
}
