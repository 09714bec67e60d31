//! Explicit Runge-Kutta integrators.
//!
//! Both integrators advance only live, movable masses. Stage derivatives live
//! in the integrator's own buffers; the masses carry just the pre-tick
//! snapshot taken by [`Simulation`](crate::core::Simulation) before stepping.

use log::debug;

use crate::core::forces::accumulate_accel;
use crate::core::mass::{Mass, DIM};
use crate::core::system::System;

/// Smallest step the adaptive integrator will take.
pub const DT_MIN: f64 = 0.0001;

/// Largest step the adaptive integrator will take.
pub const DT_MAX: f64 = 0.5;

/// Floor of the adaptive error estimate.
const MIN_ERROR: f64 = 0.00001;

/// Position followed by velocity.
type Phase = [f64; 2 * DIM];

/// Classical RK4 stage coefficients.
const RK4_A: [&[f64]; 3] = [&[0.5], &[0.0, 0.5], &[0.0, 0.0, 1.0]];
const RK4_B: [f64; 4] = [1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0];

/// Cash-Karp stage coefficients.
const CK_A: [&[f64]; 5] = [
    &[0.2],
    &[3.0 / 40.0, 9.0 / 40.0],
    &[0.3, -0.9, 1.2],
    &[-11.0 / 54.0, 2.5, -70.0 / 27.0, 35.0 / 27.0],
    &[
        1631.0 / 55296.0,
        175.0 / 512.0,
        575.0 / 13824.0,
        44275.0 / 110592.0,
        253.0 / 4096.0,
    ],
];

/// Fifth-order weights; this estimate is the one committed.
const CK_B5: [f64; 6] = [
    37.0 / 378.0,
    0.0,
    250.0 / 621.0,
    125.0 / 594.0,
    0.0,
    512.0 / 1771.0,
];

/// Embedded fourth-order weights, used only for the error estimate.
const CK_B4: [f64; 6] = [
    2825.0 / 27648.0,
    0.0,
    18575.0 / 48384.0,
    13525.0 / 55296.0,
    277.0 / 14336.0,
    0.25,
];

/// Hooks into the adaptive step-size loop.
///
/// Both methods default to no-ops. `system` is the state right after the
/// decision: on rejection every movable mass is back at its pre-tick
/// snapshot, on acceptance the new state is committed.
pub trait StepObserver {
    /// An attempt with step `h` was rejected with normalized `error >= 1`.
    fn step_rejected(&mut self, _system: &System, _h: f64, _error: f64) {}

    /// A step of size `h` was committed with normalized `error`.
    fn step_accepted(&mut self, _system: &System, _h: f64, _error: f64) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpObserver;

impl StepObserver for NoOpObserver {}

/// Stage scratch space, reused across ticks.
#[derive(Debug, Default, Clone)]
pub(crate) struct Integrator {
    movable: Vec<usize>,
    start: Vec<Phase>,
    stages: Vec<Vec<Phase>>,
}

impl Integrator {
    /// One classical RK4 step of size `h`.
    pub(crate) fn rk4(&mut self, system: &mut System, width: f64, height: f64, h: f64) {
        self.evaluate(system, width, height, h, &RK4_A);
        self.commit(system, &RK4_B);
    }

    /// One adaptive Cash-Karp RKF45 step; returns the step size committed.
    ///
    /// The step size is read from and written back to `time_step` in the
    /// system's parameters. Rejected attempts restore the pre-tick snapshot
    /// and retry with a smaller step until the error is acceptable or the
    /// step reaches [`DT_MIN`].
    pub(crate) fn rkf45(
        &mut self,
        system: &mut System,
        width: f64,
        height: f64,
        observer: &mut impl StepObserver,
    ) -> f64 {
        loop {
            let h = system.params().time_step.clamp(DT_MIN, DT_MAX);
            system.params_mut().time_step = h;

            self.evaluate(system, width, height, h, &CK_A);
            let error = self.error_estimate() / system.params().precision;

            if error < 1.0 {
                self.commit(system, &CK_B5);
                system.params_mut().time_step = h * 0.9 * (-error.ln() / 8.0).exp();
                observer.step_accepted(system, h, error);
                return h;
            }

            if h > DT_MIN {
                for m in system.masses_mut().iter_mut().filter(|m| m.is_movable()) {
                    m.restore_old();
                }
                system.params_mut().time_step = h * 0.9 * (-error.ln() / 4.0).exp();
                debug!(
                    "rejected step h={h:.6} error={error:.3}, retrying with h={:.6}",
                    system.params().time_step
                );
                observer.step_rejected(system, h, error);
                continue;
            }

            // Already at the floor: take the step regardless.
            debug!("accepting step at DT_MIN with error={error:.3}");
            self.commit(system, &CK_B5);
            observer.step_accepted(system, h, error);
            return h;
        }
    }

    /// Run every stage of an explicit tableau, leaving the masses at the last
    /// stage point and the derivatives in `self.stages`.
    fn evaluate(&mut self, system: &mut System, width: f64, height: f64, h: f64, a: &[&[f64]]) {
        self.movable.clear();
        self.start.clear();
        for (i, m) in system.masses().iter().enumerate() {
            if m.is_movable() {
                self.movable.push(i);
                self.start.push(phase(m));
            }
        }

        let n_stages = a.len() + 1;
        self.stages.resize_with(n_stages, Vec::new);
        for stage in 0..n_stages {
            if stage > 0 {
                let row = a[stage - 1];
                let masses = system.masses_mut();
                for (j, &i) in self.movable.iter().enumerate() {
                    let p = combine(&self.start[j], row, &self.stages, j);
                    set_phase(&mut masses[i], &p);
                }
            }

            accumulate_accel(system, width, height);

            let masses = system.masses();
            let k = &mut self.stages[stage];
            k.clear();
            k.extend(self.movable.iter().map(|&i| derivative(&masses[i], h)));
        }
    }

    /// Write `start + sum(b_i * k_i)` back to every movable mass.
    fn commit(&self, system: &mut System, b: &[f64]) {
        let masses = system.masses_mut();
        for (j, &i) in self.movable.iter().enumerate() {
            let p = combine(&self.start[j], b, &self.stages, j);
            set_phase(&mut masses[i], &p);
        }
    }

    /// Largest per-mass sum of absolute differences between the fifth- and
    /// fourth-order estimates. NaN estimates are ignored here; the masses
    /// that produced them are removed after the step.
    fn error_estimate(&self) -> f64 {
        (0..self.movable.len())
            .map(|j| {
                (0..2 * DIM)
                    .map(|c| {
                        CK_B5
                            .iter()
                            .zip(&CK_B4)
                            .zip(&self.stages)
                            .map(|((b5, b4), k)| (b5 - b4) * k[j][c])
                            .sum::<f64>()
                            .abs()
                    })
                    .sum::<f64>()
            })
            .fold(MIN_ERROR, |max, err| if err > max { err } else { max })
    }
}

fn phase(m: &Mass) -> Phase {
    let mut p = [0.0; 2 * DIM];
    p[..DIM].copy_from_slice(&m.r);
    p[DIM..].copy_from_slice(&m.v);
    p
}

fn set_phase(m: &mut Mass, p: &Phase) {
    m.r.copy_from_slice(&p[..DIM]);
    m.v.copy_from_slice(&p[DIM..]);
}

/// Change of phase over `h` at the current state and acceleration.
fn derivative(m: &Mass, h: f64) -> Phase {
    let mut k = [0.0; 2 * DIM];
    for d in 0..DIM {
        k[d] = m.v[d] * h;
        k[DIM + d] = m.a[d] * h;
    }
    k
}

/// `start + sum(w_i * stages[i][j])` over the weights given.
fn combine(start: &Phase, weights: &[f64], stages: &[Vec<Phase>], j: usize) -> Phase {
    let mut p = *start;
    for (w, k) in weights.iter().zip(stages) {
        if *w == 0.0 {
            continue;
        }
        for c in 0..2 * DIM {
            p[c] += w * k[j][c];
        }
    }
    p
}
