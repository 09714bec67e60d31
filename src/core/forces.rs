//! Force accumulation.
//!
//! Recomputes the acceleration of every live, movable mass from scratch.
//! Contributions are added in a fixed order (gravity and centering, drag,
//! point attraction, walls, springs) so results are reproducible.

use crate::core::mass::{Mass, DIM};
use crate::core::params::{Force, Params, Walls};
use crate::core::spring::Spring;
use crate::core::system::System;

/// Nominal radius of the attraction point.
const CENTER_RADIUS: f64 = 1.0;

/// Overwrite `a` of every live, movable mass with the net acceleration at
/// the current positions and velocities.
///
/// `width` and `height` describe the viewport: its center is the reference
/// point when no center mass is set, and its edges are the walls. The y axis
/// points up, so the bottom wall is at `y = 0`.
pub fn accumulate_accel(system: &mut System, width: f64, height: f64) {
    let center = system
        .resolve_center()
        .unwrap_or([width / 2.0, height / 2.0]);
    let (masses, springs, params) = system.split_mut();

    let g = gravity(params.gravity);
    let og = if params.center_of_mass.enabled {
        centering(masses, params.center_of_mass, params.center, center)
    } else {
        [0.0; DIM]
    };

    for (i, m) in masses.iter_mut().enumerate() {
        if !m.is_movable() {
            continue;
        }
        // The center mass is the reference itself and is not pulled toward it.
        let pull = if params.center == Some(i) { [0.0; DIM] } else { og };
        for k in 0..DIM {
            m.a[k] = g[k] + pull[k] - params.viscosity * m.v[k];
        }
    }

    if params.point_attraction.enabled {
        point_attraction(masses, params.point_attraction, center);
    }
    if params.wall.enabled {
        wall_force(masses, params, width, height);
    }
    spring_forces(masses, springs);
}

/// Uniform gravity; `misc` is the direction in degrees, 0 pointing down.
fn gravity(force: Force) -> [f64; DIM] {
    if !force.enabled {
        return [0.0; DIM];
    }
    let theta = force.misc.to_radians();
    [force.value * theta.sin(), -force.value * theta.cos()]
}

/// Pseudo-acceleration steering the mass-weighted centroid of the movable
/// masses (center mass excluded) toward `center`, damped by their mean velocity.
fn centering(
    masses: &[Mass],
    force: Force,
    center_id: Option<usize>,
    center: [f64; DIM],
) -> [f64; DIM] {
    let mut msum = 0.0;
    let mut mr = [0.0; DIM];
    let mut mv = [0.0; DIM];
    for (i, m) in masses.iter().enumerate() {
        if center_id == Some(i) || !m.is_movable() {
            continue;
        }
        msum += m.mass;
        for k in 0..DIM {
            mr[k] += m.mass * m.r[k];
            mv[k] += m.mass * m.v[k];
        }
    }
    if msum == 0.0 {
        return [0.0; DIM];
    }

    let mut og = [0.0; DIM];
    for k in 0..DIM {
        let offset = mr[k] / msum - center[k];
        let mean_v = mv[k] / msum;
        og[k] = -(force.value * offset + force.misc * mean_v) / msum;
    }
    og
}

/// Inverse-power attraction toward `center`; `misc` is the exponent.
fn point_attraction(masses: &mut [Mass], force: Force, center: [f64; DIM]) {
    for m in masses.iter_mut().filter(|m| m.is_movable()) {
        let mut d = [center[0] - m.r[0], center[1] - m.r[1]];
        let mut mag = d[0].hypot(d[1]);

        let min_dist = f64::from(m.radius) + CENTER_RADIUS;
        if mag < min_dist {
            let scale = mag / min_dist;
            d = [d[0] * scale, d[1] * scale];
            mag = min_dist;
        }

        let fmag = force.value / mag.powf(force.misc);
        for k in 0..DIM {
            m.a[k] += fmag * d[k] / mag;
        }
    }
}

/// Inverse-power force from each enabled wall; positive `value` repels.
fn wall_force(masses: &mut [Mass], params: &Params, width: f64, height: f64) {
    let Walls {
        top,
        left,
        right,
        bottom,
    } = params.walls;
    let gval = -params.wall.value;
    let exp = params.wall.misc;
    // Force at `dist` from a wall; none once the mass is past it.
    let push = |dist: f64| (dist >= 0.0).then(|| gval / dist.max(1.0).powf(exp));

    for m in masses.iter_mut().filter(|m| m.is_movable()) {
        let rad = m.screen_radius();
        let [x, y] = m.r;
        let mut da = [0.0; DIM];

        if let Some(f) = push(x - rad).filter(|_| left) {
            da[0] -= f;
        }
        if let Some(f) = push(width - rad - x).filter(|_| right) {
            da[0] += f;
        }
        if let Some(f) = push(height - rad - y).filter(|_| top) {
            da[1] += f;
        }
        if let Some(f) = push(y - rad).filter(|_| bottom) {
            da[1] -= f;
        }

        for k in 0..DIM {
            m.a[k] += da[k];
        }
    }
}

/// Damped Hooke forces of every live spring, split between its endpoints
/// in inverse proportion to their masses.
fn spring_forces(masses: &mut [Mass], springs: &[Spring]) {
    for s in springs.iter().filter(|s| s.is_alive()) {
        let [i1, i2] = s.endpoints();
        let (m1, m2) = (&masses[i1], &masses[i2]);

        let d = [m1.r[0] - m2.r[0], m1.r[1] - m2.r[1]];
        if d[0] == 0.0 && d[1] == 0.0 {
            continue;
        }
        let mag = d[0].hypot(d[1]);

        let mut force = s.ks * (s.restlen - mag);
        if s.kd != 0.0 {
            let closing =
                ((m1.v[0] - m2.v[0]) * d[0] + (m1.v[1] - m2.v[1]) * d[1]) / mag;
            force -= s.kd * closing;
        }
        force /= mag;
        let f = [force * d[0], force * d[1]];

        // Fixed and dead endpoints keep whatever acceleration they had.
        if masses[i1].is_movable() {
            let m1 = &mut masses[i1];
            for k in 0..DIM {
                m1.a[k] += f[k] / m1.mass;
            }
        }
        if masses[i2].is_movable() {
            let m2 = &mut masses[i2];
            for k in 0..DIM {
                m2.a[k] -= f[k] / m2.mass;
            }
        }
    }
}
