#![allow(missing_docs)] // Doc comments live on the public items in the submodules

//! Simulation core for SpringSim.
//!
//! Leaves first: the mass and spring records, the shared parameters, the
//! entity store, then the physics (forces, integrators, collisions) and the
//! tick driver that ties them together.

pub mod collide;
pub mod forces;
pub mod integrator;
pub mod mass;
pub mod params;
pub mod sim;
pub mod spring;
pub mod system;

pub use integrator::{NoOpObserver, StepObserver, DT_MAX, DT_MIN};
pub use mass::{Mass, DIM};
pub use params::{Force, Params, Walls, DEF_TSTEP};
pub use sim::Simulation;
pub use spring::Spring;
pub use system::{Object, System, DRAG_MASS, DRAG_SPRING};
