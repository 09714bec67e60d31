use serde::{Deserialize, Serialize};

/// Fixed spatial dimension (planar).
pub const DIM: usize = 2;

/// Smallest physical radius a mass can have.
pub const MIN_RADIUS: u32 = 1;

/// Largest physical radius a mass can have.
pub const MAX_RADIUS: u32 = 64;

/// Radius used for fixed masses ("nails") in pairwise collisions.
pub const NAIL_SIZE: f64 = 4.0;

/// Map a mass value to its physical radius, clamped to `[MIN_RADIUS, MAX_RADIUS]`.
pub fn mass_radius(m: f64) -> u32 {
    // Saturating float-to-int cast: NaN and negatives land on 0 and get clamped.
    let rad = (2.0 * (4.0 * m + 1.0).ln()) as i64;
    rad.clamp(i64::from(MIN_RADIUS), i64::from(MAX_RADIUS)) as u32
}

/// Map a physical radius to the radius of the sphere a host draws for it.
///
/// The drawn sphere comes in five sizes; hit-testing, wall forces and wall
/// bouncing all use this radius so that masses touch walls visually.
pub fn screen_radius(radius: u32) -> u32 {
    sphere_radius(sphere_size(radius))
}

fn sphere_size(radius: u32) -> u32 {
    let rad = ((25 + 2 * radius) / 2).max(15);
    ((rad * 2 - 30) / 10).min(4)
}

fn sphere_radius(size: u32) -> u32 {
    (size * 10 + 30) / 2
}

/// A point mass.
///
/// Fields:
/// - `r`, `v`, `a`: position, velocity and the acceleration from the last force evaluation
/// - `mass`, `elastic`: scalar mass and restitution coefficient
/// - `radius`: physical radius derived from `mass` via [`mass_radius`]
/// - `selected`, `fixed`, `temp_fixed`: status flags; liveness is read with
///   [`Mass::is_alive`] and only changed by the owning store
///
/// The back-references to springs (`parents`) are only reachable through the
/// owning [`System`](crate::core::System), which keeps them consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mass {
    /// Position (x, y).
    pub r: [f64; DIM],
    /// Velocity (vx, vy).
    pub v: [f64; DIM],
    /// Acceleration (ax, ay).
    pub a: [f64; DIM],
    /// Mass (> 0 for any mass taking part in the simulation).
    pub mass: f64,
    /// Elasticity used for wall bounces and pairwise impacts.
    pub elastic: f64,
    /// Physical radius.
    pub radius: u32,
    pub(crate) alive: bool,
    /// Part of the current selection.
    pub selected: bool,
    /// Not moved by the integrator.
    pub fixed: bool,
    /// Fixed only while the host holds a temporary pin.
    pub temp_fixed: bool,
    #[serde(skip)]
    parents: Vec<usize>,
    #[serde(skip)]
    pub(crate) old_r: [f64; DIM],
    #[serde(skip)]
    pub(crate) old_v: [f64; DIM],
}

impl Default for Mass {
    fn default() -> Self {
        Self {
            r: [0.0; DIM],
            v: [0.0; DIM],
            a: [0.0; DIM],
            mass: 0.0,
            elastic: 0.0,
            radius: 0,
            alive: true,
            selected: false,
            fixed: false,
            temp_fixed: false,
            parents: Vec::new(),
            old_r: [0.0; DIM],
            old_v: [0.0; DIM],
        }
    }
}

impl Mass {
    /// Not deleted.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Live and not fixed: the integrator and the wall code only touch these.
    #[inline]
    pub fn is_movable(&self) -> bool {
        self.alive && !self.fixed
    }

    /// Indices of the live springs attached to this mass.
    pub fn parents(&self) -> &[usize] {
        &self.parents
    }

    pub(crate) fn add_parent(&mut self, spring: usize) {
        self.parents.push(spring);
    }

    pub(crate) fn remove_parent(&mut self, spring: usize) {
        if let Some(pos) = self.parents.iter().position(|&p| p == spring) {
            self.parents.remove(pos);
        }
    }

    pub(crate) fn clear_parents(&mut self) {
        self.parents.clear();
    }

    /// Set the mass value and the radius derived from it.
    pub fn set_mass(&mut self, mass: f64) {
        self.mass = mass;
        self.radius = mass_radius(mass);
    }

    /// Radius of the drawn sphere, see [`screen_radius`].
    #[inline]
    pub fn screen_radius(&self) -> f64 {
        f64::from(screen_radius(self.radius))
    }

    /// Radius used in pairwise collisions.
    #[inline]
    pub fn collision_radius(&self) -> f64 {
        if self.fixed {
            NAIL_SIZE
        } else {
            f64::from(self.radius)
        }
    }

    /// Returns the kinetic energy: 1/2 m |v|^2.
    #[inline]
    pub fn kinetic_energy(&self) -> f64 {
        let vsq: f64 = self.v.iter().map(|&c| c * c).sum();
        0.5 * self.mass * vsq
    }

    /// Euclidean distance between the centers of two masses.
    pub fn distance_to(&self, other: &Self) -> f64 {
        (self.r[0] - other.r[0]).hypot(self.r[1] - other.r[1])
    }

    /// Record the current position and velocity as the pre-step snapshot.
    pub(crate) fn save_old(&mut self) {
        self.old_r = self.r;
        self.old_v = self.v;
    }

    /// Reset position and velocity to the pre-step snapshot.
    pub(crate) fn restore_old(&mut self) {
        self.r = self.old_r;
        self.v = self.old_v;
    }

    /// Position and velocity before the current tick started.
    pub fn old_state(&self) -> ([f64; DIM], [f64; DIM]) {
        (self.old_r, self.old_v)
    }

    /// True if any component of the state has become NaN.
    pub fn has_exploded(&self) -> bool {
        self.a
            .iter()
            .chain(self.v.iter())
            .chain(self.r.iter())
            .any(|x| x.is_nan())
    }
}
