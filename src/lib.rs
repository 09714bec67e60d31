//! SpringSim: a planar mass-spring simulator.
//!
//! Point masses connected by damped springs move under gravity, a centering
//! force, point attraction, wall forces and viscous drag. Each tick is
//! integrated with fixed-step RK4 or adaptive RKF45, then masses bounce or
//! stick at the viewport walls and optionally collide with each other.
//!
//! ```
//! use springsim::core::Simulation;
//!
//! # fn main() -> springsim::error::Result<()> {
//! let mut sim = Simulation::new(640.0, 480.0)?;
//! let sys = sim.system_mut();
//! let a = sys.add_mass(300.0, 240.0);
//! let b = sys.add_mass(340.0, 240.0);
//! sys.add_spring(a, b)?;
//! sys.params_mut().gravity.enabled = true;
//!
//! let redraws = (0..100).filter(|_| sim.advance()).count();
//! assert!(redraws > 0);
//! # Ok(())
//! # }
//! ```
//!
//! The Python extension (`SpringSim` class) is built with the `python` feature.

pub mod core;
pub mod error;

#[cfg(feature = "python")]
mod python;
