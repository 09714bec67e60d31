//! Post-step collision handling: wall sticking and bouncing, then optional
//! pairwise impacts between masses.

use log::warn;

use crate::core::mass::{Mass, DIM};
use crate::core::params::Walls;
use crate::core::system::System;

/// Stickiness calibration: with stickiness above 1, a unit mass under unit
/// gravity stays stuck to a wall.
pub const STICK_MAG: f64 = 1.0;

/// How close the pre-step position must be to a wall for a resting mass to stick.
const STICK_DISTANCE: f64 = 0.5;

/// Stand-in for a zero horizontal separation in pairwise impacts.
const MIN_SEPARATION: f64 = 1e-10;

/// Wall limits along one axis for one mass; `None` where the wall is off.
#[derive(Debug, Clone, Copy)]
struct Limits {
    lo: Option<f64>,
    hi: Option<f64>,
}

impl Limits {
    fn near(&self, x: f64) -> bool {
        let close = |wall: f64| (x - wall).abs() < STICK_DISTANCE;
        self.lo.is_some_and(close) || self.hi.is_some_and(close)
    }
}

/// Per-axis limits for a mass of screen radius `rad`. Axis 0 runs
/// left to right, axis 1 bottom to top.
fn limits(walls: Walls, width: f64, height: f64, rad: f64) -> [Limits; DIM] {
    [
        Limits {
            lo: walls.left.then_some(rad),
            hi: walls.right.then_some(width - rad),
        },
        Limits {
            lo: walls.bottom.then_some(rad),
            hi: walls.top.then_some(height - rad),
        },
    ]
}

/// Delete exploded masses, then stick or bounce the remaining movable masses
/// against the enabled walls.
///
/// `h` is the step just taken; it scales the resting stick threshold.
/// Each mass's pre-step snapshot must have been saved before stepping.
pub fn resolve_walls(system: &mut System, width: f64, height: f64, h: f64) {
    let walls = system.params().walls;
    let stickiness = system.params().stickiness;
    let stick_mag = STICK_MAG * h * stickiness;

    for i in 0..system.mass_count() {
        let m = &system.masses()[i];
        if !m.is_movable() {
            continue;
        }
        if m.has_exploded() {
            warn!("mass {i} exploded, deleting it");
            // Index is in range by construction.
            let _ = system.delete_mass(i);
            continue;
        }

        let m = &mut system.masses_mut()[i];
        let bounds = limits(walls, width, height, m.screen_radius());
        if stick(m, &bounds, stick_mag) {
            continue;
        }
        for (axis, lim) in bounds.iter().enumerate() {
            bounce(m, axis, lim, stick_mag);
        }
    }
}

/// A mass resting against a wall stays there while the pull away from it is
/// below the threshold. Only the first axis with a nearby wall is checked.
fn stick(m: &mut Mass, bounds: &[Limits; DIM], stick_mag: f64) -> bool {
    if m.old_v != [0.0; DIM] {
        return false;
    }
    let Some(axis) = (0..DIM).find(|&k| bounds[k].near(m.old_r[k])) else {
        return false;
    };
    if m.v[axis].abs() < stick_mag / m.mass {
        m.r = m.old_r;
        m.v = [0.0; DIM];
        return true;
    }
    false
}

/// Reflect a mass that crossed a wall along `axis` during the step. A
/// rebound slower than the stick threshold leaves the mass at rest.
fn bounce(m: &mut Mass, axis: usize, lim: &Limits, stick_mag: f64) {
    let other = 1 - axis;
    let threshold = stick_mag / m.mass;

    if let Some(lo) = lim.lo.filter(|&lo| m.r[axis] < lo && m.old_r[axis] >= lo) {
        m.r[axis] = lo;
        if m.v[axis] < 0.0 {
            m.v[axis] = -m.v[axis] * m.elastic;
            m.v[other] *= m.elastic;
            if m.v[axis] < threshold {
                m.v = [0.0; DIM];
            }
        }
    } else if let Some(hi) = lim.hi.filter(|&hi| m.r[axis] > hi && m.old_r[axis] <= hi) {
        m.r[axis] = hi;
        if m.v[axis] > 0.0 {
            m.v[axis] = -m.v[axis] * m.elastic;
            m.v[other] *= m.elastic;
            if m.v[axis] > -threshold {
                m.v = [0.0; DIM];
            }
        }
    }
}

/// Resolve every overlapping, approaching pair of live masses.
///
/// Pairs `(i, j)` with `i < j` are visited in lexicographic order and each
/// impact sees the velocities left by the previous ones.
pub fn resolve_impacts(masses: &mut [Mass]) {
    for i in 0..masses.len() {
        let (head, tail) = masses.split_at_mut(i + 1);
        let m1 = &mut head[i];
        if !m1.is_alive() {
            continue;
        }
        for m2 in tail.iter_mut().filter(|m| m.is_alive()) {
            impact(m1, m2);
        }
    }
}

fn impact(m1: &mut Mass, m2: &mut Mass) {
    let mut d = [m2.r[0] - m1.r[0], m2.r[1] - m1.r[1]];
    let dq = [d[0] * d[0], d[1] * d[1]];
    let sum = dq[0] + dq[1];
    let overlapping = sum.sqrt() < m1.collision_radius() + m2.collision_radius();
    if !overlapping {
        return;
    }

    let (v1, v2) = (m1.v, m2.v);
    let approaching = (v1[0] - v2[0]) * d[0] > 0.0 || (v1[1] - v2[1]) * d[1] > 0.0;
    if !approaching {
        return;
    }
    if d[0] == 0.0 {
        d[0] = MIN_SEPARATION;
    }

    let restitution = 1.0 + (m1.elastic + m2.elastic) / 2.0;
    if !m1.fixed {
        let ratio = if m2.fixed {
            restitution
        } else {
            restitution / (1.0 + m1.mass / m2.mass)
        };
        m1.v = exchange(v1, v2, ratio, d, dq, sum);
    }
    if !m2.fixed {
        let ratio = if m1.fixed {
            restitution
        } else {
            restitution / (1.0 + m2.mass / m1.mass)
        };
        m2.v = exchange(v2, v1, ratio, d, dq, sum);
    }
}

/// New velocity of a mass moving at `va` after hitting one moving at `vb`
/// along the line of centers `d`.
fn exchange(
    va: [f64; DIM],
    vb: [f64; DIM],
    ratio: f64,
    d: [f64; DIM],
    dq: [f64; DIM],
    sum: f64,
) -> [f64; DIM] {
    let vx = (va[0] - (va[0] - vb[0]) * ratio) * (dq[0] / sum) + va[0] * (dq[1] / sum)
        - (va[1] - vb[1]) * ratio * (d[0] * d[1] / sum);
    let vy = (vx - va[0]) * (d[1] / d[0]) + va[1];
    [vx, vy]
}
