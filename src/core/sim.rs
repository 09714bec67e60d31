use log::{debug, trace};

use crate::core::collide::{resolve_impacts, resolve_walls};
use crate::core::integrator::{Integrator, NoOpObserver, StepObserver};
use crate::core::params::{Params, DEF_TSTEP};
use crate::core::system::System;
use crate::error::{Error, Result};

/// Simulated time between redraw signals.
pub const REDRAW_INTERVAL: f64 = 0.05;

/// Ticks after which a redraw is signalled even if little time has passed.
pub const MAX_QUIET_TICKS: u32 = 8;

/// Tick driver: owns the entity store and the viewport it lives in.
///
/// The viewport is `[0, width] x [0, height]` with y pointing up. A host
/// calls [`Simulation::advance`] once per timer tick and redraws whenever it
/// returns true. All edits go through [`Simulation::system_mut`] between ticks.
#[derive(Debug, Clone)]
pub struct Simulation {
    system: System,
    width: f64,
    height: f64,
    time_elapsed: f64,
    quiet_ticks: u32,
    last_step: f64,
    saved: Option<System>,
    integrator: Integrator,
}

impl Simulation {
    /// Create an empty simulation in a `width` x `height` viewport.
    ///
    /// Errors:
    /// - `Error::InvalidParam` if either extent is not finite and > 0
    pub fn new(width: f64, height: f64) -> Result<Self> {
        Self::with_system(System::new(), width, height)
    }

    /// Wrap an existing system, e.g. one filled by bulk insertion.
    ///
    /// Errors:
    /// - `Error::InvalidParam` for a bad viewport or invalid parameters
    pub fn with_system(system: System, width: f64, height: f64) -> Result<Self> {
        check_viewport(width, height)?;
        system.params().validate()?;
        Ok(Self {
            system,
            width,
            height,
            time_elapsed: 0.0,
            quiet_ticks: 0,
            last_step: 0.0,
            saved: None,
            integrator: Integrator::default(),
        })
    }

    pub fn system(&self) -> &System {
        &self.system
    }

    pub fn system_mut(&mut self) -> &mut System {
        &mut self.system
    }

    pub fn params(&self) -> &Params {
        self.system.params()
    }

    /// Install new parameters after validating them.
    pub fn set_params(&mut self, params: Params) -> Result<()> {
        params.validate()?;
        *self.system.params_mut() = params;
        Ok(())
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Resize the viewport.
    pub fn set_viewport(&mut self, width: f64, height: f64) -> Result<()> {
        check_viewport(width, height)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Step size taken by the most recent tick (0 before the first one).
    pub fn last_step(&self) -> f64 {
        self.last_step
    }

    /// Keep a copy of the current system, replacing any earlier copy.
    pub fn save_state(&mut self) {
        self.saved = Some(self.system.clone());
    }

    /// Go back to the saved copy. Returns false if nothing was saved.
    pub fn restore_state(&mut self) -> bool {
        match &self.saved {
            Some(saved) => {
                self.system = saved.clone();
                true
            }
            None => false,
        }
    }

    /// Advance one tick. Returns true when the host should redraw.
    pub fn advance(&mut self) -> bool {
        self.advance_observed(&mut NoOpObserver)
    }

    /// Advance one tick, reporting adaptive step decisions to `observer`.
    ///
    /// The tick snapshots every movable mass, integrates, deletes masses
    /// whose state became NaN, resolves walls and (if enabled) pairwise
    /// impacts, and finally decides whether a redraw is due.
    pub fn advance_observed(&mut self, observer: &mut impl StepObserver) -> bool {
        for m in self.system.masses_mut().iter_mut().filter(|m| m.is_movable()) {
            m.save_old();
        }

        let h = self.integrate(observer);
        self.last_step = h;

        resolve_walls(&mut self.system, self.width, self.height, h);
        if self.system.params().collide {
            resolve_impacts(self.system.masses_mut());
        }

        self.batch(h)
    }

    fn integrate(&mut self, observer: &mut impl StepObserver) -> f64 {
        let (w, h) = (self.width, self.height);
        if !self.system.any_live_spring() {
            // Nothing stiff to resolve.
            if self.system.params().adaptive {
                self.system.params_mut().time_step = DEF_TSTEP;
            }
            self.integrator.rk4(&mut self.system, w, h, DEF_TSTEP);
            return DEF_TSTEP;
        }
        if self.system.params().adaptive {
            self.integrator.rkf45(&mut self.system, w, h, observer)
        } else {
            let dt = self.system.params().time_step;
            self.integrator.rk4(&mut self.system, w, h, dt);
            dt
        }
    }

    /// Accumulate simulated time and decide whether a redraw is due.
    fn batch(&mut self, h: f64) -> bool {
        self.time_elapsed += h;
        if self.time_elapsed > REDRAW_INTERVAL {
            self.time_elapsed -= REDRAW_INTERVAL;
            self.quiet_ticks = 0;
            trace!("redraw after {REDRAW_INTERVAL}s of simulated time");
            return true;
        }

        self.quiet_ticks += 1;
        if self.quiet_ticks > MAX_QUIET_TICKS {
            self.quiet_ticks = 0;
            debug!(
                "redraw after {MAX_QUIET_TICKS} quiet ticks, {:.6}s pending",
                self.time_elapsed
            );
            return true;
        }
        false
    }
}

fn check_viewport(width: f64, height: f64) -> Result<()> {
    if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
        return Err(Error::InvalidParam(
            "viewport extents must be finite and > 0".into(),
        ));
    }
    Ok(())
}
