use log::debug;
use ordered_float::NotNan;

use crate::core::mass::{Mass, DIM};
use crate::core::params::Params;
use crate::core::spring::Spring;
use crate::error::{Error, Result};

/// Index of the reserved drag mass.
pub const DRAG_MASS: usize = 0;

/// Index of the reserved drag spring.
pub const DRAG_SPRING: usize = 0;

/// Hit-test proximity for masses (squared before use).
const MPROXIMITY: f64 = 8.0;

/// Hit-test proximity for springs.
const SPROXIMITY: f64 = 8.0;

/// Result of a hit test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Object {
    Mass(usize),
    Spring(usize),
}

/// The entity store: every mass and spring plus the shared parameters.
///
/// Entities live in two append-only arrays. Indices are permanent: deletion
/// only clears the alive flag, and only [`System::delete_all`] (or
/// [`System::reset`]) invalidates existing indices.
///
/// Invariant: the `parents` of every live mass are exactly the live springs
/// that reference it. All mutators below maintain it; [`System::reconnect_masses`]
/// rebuilds it after bulk insertion.
///
/// Mass 0 and spring 0 are reserved for an interactively dragged spring
/// (see [`System::attach_drag_spring`]). The drag mass is permanently fixed
/// and never alive, so it takes no part in forces, collisions, selection or
/// hit-testing; only the drag spring's geometry reads its position.
#[derive(Debug, Clone)]
pub struct System {
    masses: Vec<Mass>,
    springs: Vec<Spring>,
    params: Params,
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}

impl System {
    /// An empty system holding only the drag mass and drag spring.
    pub fn new() -> Self {
        let mut system = Self {
            masses: Vec::new(),
            springs: Vec::new(),
            params: Params::default(),
        };
        system.init_objects();
        system
    }

    fn init_objects(&mut self) {
        let m = self.create_mass();
        self.masses[m].alive = false;
        self.masses[m].fixed = true;

        let s = self.create_spring();
        self.springs[s].alive = false;
        self.springs[s].m1 = m;
        self.springs[s].m2 = m;
        self.masses[m].add_parent(s);
    }

    // ============ Accessors ============

    /// Number of mass slots, dead ones included.
    pub fn mass_count(&self) -> usize {
        self.masses.len()
    }

    /// Number of spring slots, dead ones included.
    pub fn spring_count(&self) -> usize {
        self.springs.len()
    }

    /// Number of live masses.
    pub fn live_mass_count(&self) -> usize {
        self.masses.iter().filter(|m| m.alive).count()
    }

    /// Number of live springs.
    pub fn live_spring_count(&self) -> usize {
        self.springs.iter().filter(|s| s.alive).count()
    }

    /// True if at least one spring is alive.
    pub fn any_live_spring(&self) -> bool {
        self.springs.iter().any(|s| s.alive)
    }

    pub fn masses(&self) -> &[Mass] {
        &self.masses
    }

    pub fn springs(&self) -> &[Spring] {
        &self.springs
    }

    pub(crate) fn masses_mut(&mut self) -> &mut [Mass] {
        &mut self.masses
    }

    /// Masses and springs at once, for code that reads springs while writing masses.
    pub(crate) fn split_mut(&mut self) -> (&mut [Mass], &[Spring], &Params) {
        (&mut self.masses, &self.springs, &self.params)
    }

    /// Checked access to a mass slot.
    pub fn mass(&self, i: usize) -> Result<&Mass> {
        self.masses.get(i).ok_or(Error::NoSuchMass(i))
    }

    /// Checked mutable access to a mass slot.
    ///
    /// Liveness and back-references are not reachable from here; use the
    /// store's mutators for those.
    pub fn mass_mut(&mut self, i: usize) -> Result<&mut Mass> {
        self.masses.get_mut(i).ok_or(Error::NoSuchMass(i))
    }

    /// Checked access to a spring slot.
    pub fn spring(&self, i: usize) -> Result<&Spring> {
        self.springs.get(i).ok_or(Error::NoSuchSpring(i))
    }

    /// Checked mutable access to a spring slot.
    pub fn spring_mut(&mut self, i: usize) -> Result<&mut Spring> {
        self.springs.get_mut(i).ok_or(Error::NoSuchSpring(i))
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    /// Total kinetic energy of the live, movable masses.
    pub fn kinetic_energy(&self) -> f64 {
        self.masses
            .iter()
            .filter(|m| m.is_movable())
            .map(Mass::kinetic_energy)
            .sum()
    }

    fn check_mass(&self, i: usize) -> Result<()> {
        if i < self.masses.len() {
            Ok(())
        } else {
            Err(Error::NoSuchMass(i))
        }
    }

    fn check_spring(&self, i: usize) -> Result<()> {
        if i < self.springs.len() {
            Ok(())
        } else {
            Err(Error::NoSuchSpring(i))
        }
    }

    // ============ Creation ============

    /// Append a default mass and return its index.
    pub fn create_mass(&mut self) -> usize {
        self.masses.push(Mass::default());
        self.masses.len() - 1
    }

    /// Append a default spring and return its index.
    pub fn create_spring(&mut self) -> usize {
        self.springs.push(Spring::default());
        self.springs.len() - 1
    }

    /// Create a mass at `(x, y)` using the current mass, elasticity and
    /// fixed-mass parameters.
    pub fn add_mass(&mut self, x: f64, y: f64) -> usize {
        let i = self.create_mass();
        let (mass, elastic, fixed) = (self.params.mass, self.params.elasticity, self.params.fix_mass);
        let m = &mut self.masses[i];
        m.r = [x, y];
        m.set_mass(mass);
        m.elastic = elastic;
        m.fixed = fixed;
        i
    }

    /// Connect two masses with a spring using the current stiffness and
    /// damping; the rest length is the current distance between them.
    ///
    /// Errors:
    /// - `Error::NoSuchMass` if either endpoint is out of range
    /// - `Error::SentinelMass` if either endpoint is the drag mass
    pub fn add_spring(&mut self, m1: usize, m2: usize) -> Result<usize> {
        self.check_mass(m1)?;
        self.check_mass(m2)?;
        if self.is_drag_mass(m1) || self.is_drag_mass(m2) {
            return Err(Error::SentinelMass);
        }
        let restlen = self.masses[m1].distance_to(&self.masses[m2]);
        let spring = Spring::new(m1, m2, self.params.stiffness, self.params.damping, restlen);
        let i = self.create_spring();
        self.springs[i] = spring;
        self.masses[m1].add_parent(i);
        self.masses[m2].add_parent(i);
        Ok(i)
    }

    /// Append a fully specified mass without touching any back-reference.
    ///
    /// Meant for bulk loading; its `parents` start empty.
    pub fn insert_mass(&mut self, mut mass: Mass) -> usize {
        mass.clear_parents();
        let i = self.create_mass();
        self.masses[i] = mass;
        i
    }

    /// Append a fully specified spring without registering it with its
    /// endpoints. Call [`System::reconnect_masses`] once the batch is in.
    ///
    /// Errors:
    /// - `Error::NoSuchMass` if an endpoint is out of range
    pub fn insert_spring(&mut self, spring: Spring) -> Result<usize> {
        self.check_mass(spring.m1)?;
        self.check_mass(spring.m2)?;
        let i = self.create_spring();
        self.springs[i] = spring;
        Ok(i)
    }

    // ============ Back-references ============

    /// Record `parent` as attached to mass `which`.
    pub fn add_mass_parent(&mut self, which: usize, parent: usize) -> Result<()> {
        self.check_spring(parent)?;
        self.mass_mut(which)?.add_parent(parent);
        Ok(())
    }

    /// Forget `parent` on mass `which`. Dead masses are left untouched.
    pub fn delete_mass_parent(&mut self, which: usize, parent: usize) -> Result<()> {
        let mass = self.mass_mut(which)?;
        if mass.alive {
            mass.remove_parent(parent);
        }
        Ok(())
    }

    /// Rebuild every `parents` list from the live springs.
    pub fn reconnect_masses(&mut self) {
        for m in &mut self.masses {
            m.clear_parents();
        }
        for (i, s) in self.springs.iter().enumerate() {
            if !s.alive {
                continue;
            }
            self.masses[s.m1].add_parent(i);
            // The drag target never lists the drag spring.
            if i != DRAG_SPRING {
                self.masses[s.m2].add_parent(i);
            }
        }
        debug!(
            "reconnected {} masses to {} springs",
            self.masses.len(),
            self.springs.len()
        );
    }

    // ============ Deletion ============

    /// Delete a spring and unregister it from its live endpoints. No-op if dead.
    pub fn delete_spring(&mut self, which: usize) -> Result<()> {
        let spring = self.spring_mut(which)?;
        if !spring.alive {
            return Ok(());
        }
        spring.alive = false;
        let [m1, m2] = spring.endpoints();
        self.delete_mass_parent(m1, which)?;
        self.delete_mass_parent(m2, which)
    }

    /// Delete a mass and every spring attached to it. No-op if dead.
    ///
    /// Clears the center reference if it pointed at this mass, and releases
    /// the drag spring if it was pulling this mass.
    pub fn delete_mass(&mut self, which: usize) -> Result<()> {
        let mass = self.mass_mut(which)?;
        if mass.alive {
            mass.alive = false;
            // The mass is dead now, so the cascade leaves its own list alone.
            let parents = mass.parents().to_vec();
            for p in parents {
                self.delete_spring(p)?;
            }
            if self.springs[DRAG_SPRING].m2 == which {
                self.release_drag_spring();
            }
        }
        if self.params.center == Some(which) {
            self.params.center = None;
        }
        Ok(())
    }

    /// Delete every selected mass, then every selected spring.
    pub fn delete_selected(&mut self) {
        for i in 0..self.masses.len() {
            if self.masses[i].selected {
                // In range by construction.
                let _ = self.delete_mass(i);
            }
        }
        for i in 0..self.springs.len() {
            if self.springs[i].selected {
                let _ = self.delete_spring(i);
            }
        }
    }

    /// Wipe both arrays. Every index handed out so far becomes invalid; the
    /// drag mass and drag spring are recreated at their reserved indices.
    pub fn delete_all(&mut self) {
        debug!(
            "deleting all {} masses and {} springs",
            self.masses.len(),
            self.springs.len()
        );
        self.masses.clear();
        self.springs.clear();
        self.params.center = None;
        self.init_objects();
    }

    /// Delete everything and restore the default parameters.
    pub fn reset(&mut self) {
        self.delete_all();
        self.params.reset();
    }

    // ============ Hit testing ============

    /// Find the mass or spring nearest to `(x, y)`, if any is close enough.
    ///
    /// Masses are tried first and always win over springs. With `mass_only`
    /// the mass proximity is enlarged and springs are not considered.
    pub fn nearest_object(&self, x: f64, y: f64, mass_only: bool) -> Option<Object> {
        let mut threshold = MPROXIMITY * MPROXIMITY;
        if mass_only {
            threshold *= 36.0;
        }

        let closest_mass = self
            .masses
            .iter()
            .enumerate()
            .filter(|(_, m)| m.alive)
            .filter_map(|(i, m)| {
                let d2 = (m.r[0] - x).powi(2) + (m.r[1] - y).powi(2);
                let rad = m.screen_radius();
                (d2 - rad * rad < threshold)
                    .then(|| NotNan::new(d2).ok().map(|d| (d, i)))
                    .flatten()
            })
            .min_by_key(|&(d, _)| d);

        if let Some((_, i)) = closest_mass {
            return Some(Object::Mass(i));
        }
        if mass_only {
            return None;
        }

        self.springs
            .iter()
            .enumerate()
            .filter(|&(i, s)| s.alive && !self.is_drag_spring(i))
            .filter_map(|(i, s)| {
                let [x1, y1] = self.masses[s.m1].r;
                let [x2, y2] = self.masses[s.m2].r;
                let inside = x > x1.min(x2) - SPROXIMITY
                    && x < x1.max(x2) + SPROXIMITY
                    && y > y1.min(y2) - SPROXIMITY
                    && y < y1.max(y2) + SPROXIMITY;
                if !inside {
                    return None;
                }
                let a1 = y2 - y1;
                let b1 = x1 - x2;
                let c1 = y1 * x2 - y2 * x1;
                let dist = ((x * a1 + y * b1 + c1) / a1.hypot(b1)).abs();
                // Zero-length springs give NaN here and drop out.
                let dist = NotNan::new(dist).ok()?;
                (dist.into_inner() < SPROXIMITY).then_some((dist, i))
            })
            .min_by_key(|&(d, _)| d)
            .map(|(_, i)| Object::Spring(i))
    }

    // ============ Selection ============

    /// Select one entity, or toggle its selection if `shifted`.
    ///
    /// Errors:
    /// - `Error::NoSuchMass` / `Error::NoSuchSpring` for an index out of range
    /// - `Error::SentinelMass` / `Error::SentinelSpring` for the drag entities
    pub fn select_object(&mut self, object: Object, shifted: bool) -> Result<()> {
        let selected = match object {
            Object::Mass(DRAG_MASS) => return Err(Error::SentinelMass),
            Object::Spring(DRAG_SPRING) => return Err(Error::SentinelSpring),
            Object::Mass(i) => &mut self.mass_mut(i)?.selected,
            Object::Spring(i) => &mut self.spring_mut(i)?.selected,
        };
        *selected = if shifted { !*selected } else { true };
        Ok(())
    }

    /// Select every live mass strictly inside the rectangle spanned by the
    /// two corners, and every live spring with both endpoints inside.
    pub fn select_objects(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) {
        let (lx, hx) = (x0.min(x1), x0.max(x1));
        let (ly, hy) = (y0.min(y1), y0.max(y1));
        let inside = |r: &[f64; DIM]| lx < r[0] && r[0] < hx && ly < r[1] && r[1] < hy;

        for m in &mut self.masses {
            if m.alive && inside(&m.r) {
                m.selected = true;
            }
        }
        for (i, s) in self.springs.iter_mut().enumerate() {
            if s.alive
                && i != DRAG_SPRING
                && inside(&self.masses[s.m1].r)
                && inside(&self.masses[s.m2].r)
            {
                s.selected = true;
            }
        }
    }

    pub fn unselect_all(&mut self) {
        for m in &mut self.masses {
            m.selected = false;
        }
        for s in &mut self.springs {
            s.selected = false;
        }
    }

    pub fn select_all(&mut self) {
        for m in &mut self.masses {
            if m.alive {
                m.selected = true;
            }
        }
        for (i, s) in self.springs.iter_mut().enumerate() {
            if s.alive && i != DRAG_SPRING {
                s.selected = true;
            }
        }
    }

    pub fn anything_selected(&self) -> bool {
        self.masses.iter().any(|m| m.selected) || self.springs.iter().any(|s| s.selected)
    }

    /// Pull the current parameters from the selection.
    ///
    /// A parameter is copied only if every selected entity agrees on it. The
    /// fixed flag is copied from the first selected mass unless a later
    /// selected mass is fixed. Returns true if any parameter changed.
    pub fn eval_selection(&mut self) -> bool {
        let mut changed = false;

        let mut selected = self.masses.iter().filter(|m| m.selected);
        if let Some(first) = selected.next() {
            let (mut mass_same, mut elas_same, mut fix_same) = (true, true, true);
            for m in selected {
                if mass_same && m.mass != first.mass {
                    mass_same = false;
                }
                if elas_same && m.elastic != first.elastic {
                    elas_same = false;
                }
                if fix_same && m.fixed {
                    fix_same = false;
                }
            }
            if mass_same && first.mass != self.params.mass {
                self.params.mass = first.mass;
                changed = true;
            }
            if elas_same && first.elastic != self.params.elasticity {
                self.params.elasticity = first.elastic;
                changed = true;
            }
            if fix_same && first.fixed != self.params.fix_mass {
                self.params.fix_mass = first.fixed;
                changed = true;
            }
        }

        let mut selected = self.springs.iter().filter(|s| s.selected);
        if let Some(first) = selected.next() {
            let (mut ks_same, mut kd_same) = (true, true);
            for s in selected {
                if ks_same && s.ks != first.ks {
                    ks_same = false;
                }
                if kd_same && s.kd != first.kd {
                    kd_same = false;
                }
            }
            if ks_same && first.ks != self.params.stiffness {
                self.params.stiffness = first.ks;
                changed = true;
            }
            if kd_same && first.kd != self.params.damping {
                self.params.damping = first.kd;
                changed = true;
            }
        }

        changed
    }

    /// Copy the selected masses, then the springs that were selected before
    /// copying started, remapping spring endpoints onto the copies.
    ///
    /// A copied spring with neither endpoint copied is dropped. One with a
    /// single copied endpoint keeps its other end on the original mass.
    pub fn duplicate_selected(&mut self) {
        let mass_end = self.masses.len();
        let spring_end = self.springs.len();

        let mut mapping: Vec<(usize, usize)> = Vec::new();
        for i in 0..mass_end {
            if self.masses[i].selected {
                let mut copy = self.masses[i].clone();
                copy.selected = false;
                copy.clear_parents();
                mapping.push((i, self.insert_mass(copy)));
            }
        }
        let remap = |m: usize| {
            mapping
                .iter()
                .find(|&&(from, _)| from == m)
                .map(|&(_, to)| to)
        };

        let mut copied_springs = 0usize;
        for i in 0..spring_end {
            if !self.springs[i].selected {
                continue;
            }
            let (new_m1, new_m2) = (remap(self.springs[i].m1), remap(self.springs[i].m2));
            if new_m1.is_none() && new_m2.is_none() {
                continue;
            }
            let mut copy = self.springs[i].clone();
            copy.selected = false;
            copy.m1 = new_m1.unwrap_or(copy.m1);
            copy.m2 = new_m2.unwrap_or(copy.m2);
            let (m1, m2, alive) = (copy.m1, copy.m2, copy.alive);
            let which = self.create_spring();
            self.springs[which] = copy;
            if alive {
                self.masses[m1].add_parent(which);
                self.masses[m2].add_parent(which);
            }
            copied_springs += 1;
        }
        debug!(
            "duplicated {} masses and {} springs",
            mapping.len(),
            copied_springs
        );
    }

    // ============ Bulk edits ============

    /// Translate every selected mass.
    pub fn move_selected_masses(&mut self, dx: f64, dy: f64) {
        for m in self.masses.iter_mut().filter(|m| m.selected) {
            m.r[0] += dx;
            m.r[1] += dy;
        }
    }

    /// Set (or, if `relative`, add to) the velocity of every selected mass.
    pub fn set_mass_velocity(&mut self, vx: f64, vy: f64, relative: bool) {
        for m in self.masses.iter_mut().filter(|m| m.selected) {
            if relative {
                m.v[0] += vx;
                m.v[1] += vy;
            } else {
                m.v = [vx, vy];
            }
        }
    }

    /// Pin (`store == true`) or release the selected masses.
    ///
    /// Pinning fixes every selected mass that was free and tags it
    /// temp-fixed; releasing frees only the tagged ones.
    pub fn set_temp_fixed(&mut self, store: bool) {
        for m in self.masses.iter_mut().filter(|m| m.selected) {
            if store {
                m.temp_fixed = !m.fixed;
                m.fixed = true;
            } else if m.temp_fixed {
                m.fixed = false;
                m.temp_fixed = false;
            }
        }
    }

    /// Set the rest length of every selected spring to its current length.
    pub fn set_rest_length(&mut self) {
        let masses = &self.masses;
        for s in self.springs.iter_mut().filter(|s| s.selected) {
            s.restlen = masses[s.m1].distance_to(&masses[s.m2]);
        }
    }

    /// Make the single selected mass the center reference.
    ///
    /// With no mass selected the center is cleared; with more than one this
    /// is a no-op. Returns true if the center was updated.
    pub fn set_center(&mut self) -> bool {
        let mut selected = self
            .masses
            .iter()
            .enumerate()
            .filter(|(_, m)| m.selected)
            .map(|(i, _)| i);
        match (selected.next(), selected.next()) {
            (_, Some(_)) => false,
            (center, None) => {
                self.params.center = center;
                true
            }
        }
    }

    /// Clear the center reference.
    pub fn clear_center(&mut self) {
        self.params.center = None;
    }

    /// The center mass position, if a live center mass is set.
    ///
    /// A center pointing at a dead mass is cleared.
    pub(crate) fn resolve_center(&mut self) -> Option<[f64; DIM]> {
        let i = self.params.center?;
        match self.masses.get(i) {
            Some(m) if m.alive => Some(m.r),
            _ => {
                self.params.center = None;
                None
            }
        }
    }

    /// Set the mass of every selected mass (and the current mass parameter).
    ///
    /// Errors:
    /// - `Error::InvalidParam` if `mass` is not finite and positive. Nothing
    ///   changes in that case.
    pub fn set_selected_mass(&mut self, mass: f64) -> Result<()> {
        if !(mass.is_finite() && mass > 0.0) {
            return Err(Error::InvalidParam(format!("mass must be > 0, got {mass}")));
        }
        self.params.mass = mass;
        for m in self.masses.iter_mut().filter(|m| m.selected) {
            m.set_mass(mass);
        }
        Ok(())
    }

    /// Set the elasticity of every selected mass (and the current parameter).
    pub fn set_selected_elasticity(&mut self, elastic: f64) {
        self.params.elasticity = elastic;
        for m in self.masses.iter_mut().filter(|m| m.selected) {
            m.elastic = elastic;
        }
    }

    /// Fix or free every selected mass, dropping any temporary pin.
    pub fn set_selected_fixed(&mut self, fixed: bool) {
        self.params.fix_mass = fixed;
        for m in self.masses.iter_mut().filter(|m| m.selected) {
            m.fixed = fixed;
            m.temp_fixed = false;
        }
    }

    /// Set the stiffness of every selected spring (and the current parameter).
    pub fn set_selected_stiffness(&mut self, ks: f64) {
        self.params.stiffness = ks;
        for s in self.springs.iter_mut().filter(|s| s.selected) {
            s.ks = ks;
        }
    }

    /// Set the damping of every selected spring (and the current parameter).
    pub fn set_selected_damping(&mut self, kd: f64) {
        self.params.damping = kd;
        for s in self.springs.iter_mut().filter(|s| s.selected) {
            s.kd = kd;
        }
    }

    // ============ Drag spring ============

    pub fn is_drag_mass(&self, i: usize) -> bool {
        i == DRAG_MASS
    }

    pub fn is_drag_spring(&self, i: usize) -> bool {
        i == DRAG_SPRING
    }

    /// Hook the drag spring onto mass `to` and bring it alive.
    ///
    /// The spring runs from the drag mass to `to` with the current stiffness
    /// and damping and zero rest length, so it pulls `to` toward wherever
    /// [`System::move_drag_mass`] puts the drag mass.
    pub fn attach_drag_spring(&mut self, to: usize) -> Result<()> {
        self.check_mass(to)?;
        if self.is_drag_mass(to) {
            return Err(Error::SentinelMass);
        }
        let (ks, kd) = (self.params.stiffness, self.params.damping);
        let spring = &mut self.springs[DRAG_SPRING];
        spring.m1 = DRAG_MASS;
        spring.m2 = to;
        spring.ks = ks;
        spring.kd = kd;
        spring.restlen = 0.0;
        spring.selected = false;
        spring.alive = true;
        let drag = &mut self.masses[DRAG_MASS];
        if !drag.parents().contains(&DRAG_SPRING) {
            drag.add_parent(DRAG_SPRING);
        }
        Ok(())
    }

    /// Switch the drag spring off. Its target's back-references are not touched.
    pub fn release_drag_spring(&mut self) {
        self.springs[DRAG_SPRING].alive = false;
    }

    /// Move the drag mass.
    pub fn move_drag_mass(&mut self, x: f64, y: f64) {
        self.masses[DRAG_MASS].r = [x, y];
    }

    /// The drag spring, alive while a drag is in progress.
    pub fn drag_spring(&self) -> &Spring {
        &self.springs[DRAG_SPRING]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Result<(System, [usize; 3], [usize; 3])> {
        let mut sys = System::new();
        let a = sys.add_mass(100.0, 100.0);
        let b = sys.add_mass(200.0, 100.0);
        let c = sys.add_mass(150.0, 200.0);
        let ab = sys.add_spring(a, b)?;
        let bc = sys.add_spring(b, c)?;
        let ca = sys.add_spring(c, a)?;
        Ok((sys, [a, b, c], [ab, bc, ca]))
    }

    #[test]
    fn new_system_has_only_sentinels() {
        let sys = System::new();
        assert_eq!(sys.mass_count(), 1);
        assert_eq!(sys.spring_count(), 1);
        assert_eq!(sys.live_mass_count(), 0);
        assert_eq!(sys.live_spring_count(), 0);
        assert!(sys.masses()[DRAG_MASS].fixed);
    }

    #[test]
    fn indices_are_appended() {
        let mut sys = System::new();
        let a = sys.create_mass();
        let b = sys.create_mass();
        assert_eq!((a, b), (1, 2));
        assert_eq!(sys.create_spring(), 1);
    }

    #[test]
    fn add_spring_registers_parents() -> Result<()> {
        let (sys, [a, b, c], [ab, bc, ca]) = triangle()?;
        assert_eq!(sys.mass(a)?.parents(), &[ab, ca]);
        assert_eq!(sys.mass(b)?.parents(), &[ab, bc]);
        assert_eq!(sys.mass(c)?.parents(), &[bc, ca]);
        assert!((sys.spring(ab)?.restlen - 100.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn add_spring_rejects_bad_endpoints() {
        let mut sys = System::new();
        let a = sys.add_mass(0.0, 0.0);
        assert!(matches!(sys.add_spring(a, 99), Err(Error::NoSuchMass(99))));
        assert!(matches!(sys.add_spring(a, DRAG_MASS), Err(Error::SentinelMass)));
    }

    #[test]
    fn checked_accessors_report_missing() {
        let sys = System::new();
        assert!(matches!(sys.mass(7), Err(Error::NoSuchMass(7))));
        assert!(matches!(sys.spring(3), Err(Error::NoSuchSpring(3))));
    }

    #[test]
    fn deleting_spring_unlinks_both_ends() -> Result<()> {
        let (mut sys, [a, b, _], [ab, bc, ca]) = triangle()?;
        sys.delete_spring(ab)?;
        assert!(!sys.spring(ab)?.is_alive());
        assert_eq!(sys.mass(a)?.parents(), &[ca]);
        assert_eq!(sys.mass(b)?.parents(), &[bc]);
        // Idempotent.
        sys.delete_spring(ab)?;
        assert_eq!(sys.mass(a)?.parents(), &[ca]);
        Ok(())
    }

    #[test]
    fn deleting_mass_cascades() -> Result<()> {
        let (mut sys, [a, b, c], [ab, bc, ca]) = triangle()?;
        let springs_before = sys.spring_count();
        sys.delete_mass(a)?;
        assert!(!sys.mass(a)?.is_alive());
        assert!(!sys.spring(ab)?.is_alive());
        assert!(!sys.spring(ca)?.is_alive());
        assert!(sys.spring(bc)?.is_alive());
        assert_eq!(sys.spring_count(), springs_before);
        assert_eq!(sys.mass(b)?.parents(), &[bc]);
        assert_eq!(sys.mass(c)?.parents(), &[bc]);
        // The dead mass keeps its list as it was.
        assert_eq!(sys.mass(a)?.parents(), &[ab, ca]);
        Ok(())
    }

    #[test]
    fn deleting_center_mass_clears_center() -> Result<()> {
        let (mut sys, [a, _, _], _) = triangle()?;
        sys.params_mut().center = Some(a);
        sys.delete_mass(a)?;
        assert_eq!(sys.params().center, None);
        Ok(())
    }

    #[test]
    fn delete_selected_handles_overlap() -> Result<()> {
        let (mut sys, [a, b, c], [ab, bc, ca]) = triangle()?;
        sys.select_object(Object::Mass(a), false)?;
        sys.select_object(Object::Spring(ab), false)?;
        sys.select_object(Object::Spring(bc), false)?;
        sys.delete_selected();
        assert!(!sys.mass(a)?.is_alive());
        assert!(sys.mass(b)?.is_alive() && sys.mass(c)?.is_alive());
        assert!(!sys.spring(ab)?.is_alive());
        assert!(!sys.spring(bc)?.is_alive());
        assert!(!sys.spring(ca)?.is_alive());
        assert!(sys.mass(b)?.parents().is_empty());
        Ok(())
    }

    #[test]
    fn reconnect_rebuilds_from_live_springs() -> Result<()> {
        let mut sys = System::new();
        let a = sys.insert_mass(Mass::default());
        let b = sys.insert_mass(Mass::default());
        let s = sys.insert_spring(Spring::new(a, b, 1.0, 0.0, 1.0))?;
        assert!(sys.mass(a)?.parents().is_empty());
        sys.reconnect_masses();
        assert_eq!(sys.mass(a)?.parents(), &[s]);
        assert_eq!(sys.mass(b)?.parents(), &[s]);
        assert!(sys.masses()[DRAG_MASS].parents().is_empty());
        Ok(())
    }

    #[test]
    fn insert_spring_checks_endpoints() {
        let mut sys = System::new();
        let r = sys.insert_spring(Spring::new(0, 5, 1.0, 0.0, 1.0));
        assert!(matches!(r, Err(Error::NoSuchMass(5))));
    }

    #[test]
    fn delete_all_invalidates_everything() -> Result<()> {
        let (mut sys, _, _) = triangle()?;
        sys.params_mut().center = Some(2);
        sys.delete_all();
        assert_eq!(sys.mass_count(), 1);
        assert_eq!(sys.spring_count(), 1);
        assert_eq!(sys.params().center, None);
        assert!(sys.mass(2).is_err());
        Ok(())
    }

    #[test]
    fn nearest_prefers_closest_mass() {
        let mut sys = System::new();
        let a = sys.add_mass(100.0, 100.0);
        let b = sys.add_mass(110.0, 100.0);
        assert_eq!(sys.nearest_object(107.0, 100.0, false), Some(Object::Mass(b)));
        assert_eq!(sys.nearest_object(103.0, 100.0, false), Some(Object::Mass(a)));
        // Equidistant: first one found wins.
        assert_eq!(sys.nearest_object(105.0, 100.0, false), Some(Object::Mass(a)));
    }

    #[test]
    fn nearest_finds_spring_between_far_masses() -> Result<()> {
        let mut sys = System::new();
        let a = sys.add_mass(0.0, 0.0);
        let b = sys.add_mass(200.0, 0.0);
        let s = sys.add_spring(a, b)?;
        assert_eq!(sys.nearest_object(100.0, 5.0, false), Some(Object::Spring(s)));
        assert_eq!(sys.nearest_object(100.0, 5.0, true), None);
        assert_eq!(sys.nearest_object(100.0, 30.0, false), None);
        // Outside the segment's expanded bounding box.
        assert_eq!(sys.nearest_object(300.0, 0.0, false), None);
        Ok(())
    }

    #[test]
    fn nearest_mass_only_widens_reach() {
        let mut sys = System::new();
        let a = sys.add_mass(0.0, 0.0);
        // Screen radius 15: 15^2 + 64 < d^2 for d = 20, but within x36.
        assert_eq!(sys.nearest_object(20.0, 0.0, false), None);
        assert_eq!(sys.nearest_object(20.0, 0.0, true), Some(Object::Mass(a)));
    }

    #[test]
    fn select_object_toggles_when_shifted() -> Result<()> {
        let mut sys = System::new();
        let a = sys.add_mass(0.0, 0.0);
        sys.select_object(Object::Mass(a), false)?;
        sys.select_object(Object::Mass(a), false)?;
        assert!(sys.mass(a)?.selected);
        sys.select_object(Object::Mass(a), true)?;
        assert!(!sys.mass(a)?.selected);
        assert!(sys.select_object(Object::Spring(9), false).is_err());

        sys.attach_drag_spring(a)?;
        assert!(matches!(
            sys.select_object(Object::Spring(DRAG_SPRING), false),
            Err(Error::SentinelSpring)
        ));
        assert!(matches!(
            sys.select_object(Object::Mass(DRAG_MASS), true),
            Err(Error::SentinelMass)
        ));
        assert!(!sys.drag_spring().selected);
        Ok(())
    }

    #[test]
    fn select_objects_requires_both_endpoints() -> Result<()> {
        let (mut sys, [a, b, c], [ab, bc, ca]) = triangle()?;
        sys.select_objects(250.0, 150.0, 50.0, 50.0);
        assert!(sys.mass(a)?.selected && sys.mass(b)?.selected);
        assert!(!sys.mass(c)?.selected);
        assert!(sys.spring(ab)?.selected);
        assert!(!sys.spring(bc)?.selected && !sys.spring(ca)?.selected);
        Ok(())
    }

    #[test]
    fn select_objects_is_strict() -> Result<()> {
        let mut sys = System::new();
        let a = sys.add_mass(100.0, 100.0);
        sys.select_objects(100.0, 0.0, 200.0, 200.0);
        assert!(!sys.mass(a)?.selected);
        Ok(())
    }

    #[test]
    fn select_all_skips_dead() -> Result<()> {
        let (mut sys, [a, b, _], [ab, _, _]) = triangle()?;
        sys.delete_mass(a)?;
        sys.select_all();
        assert!(!sys.mass(a)?.selected);
        assert!(sys.mass(b)?.selected);
        assert!(!sys.spring(ab)?.selected);
        assert!(!sys.masses()[DRAG_MASS].selected);
        sys.unselect_all();
        assert!(!sys.anything_selected());
        Ok(())
    }

    #[test]
    fn eval_selection_copies_shared_values() -> Result<()> {
        let (mut sys, [a, b, _], [ab, bc, _]) = triangle()?;
        for (i, el) in [(a, 0.3), (b, 0.7)] {
            let m = sys.mass_mut(i)?;
            m.set_mass(4.0);
            m.elastic = el;
            m.selected = true;
        }
        assert!(sys.eval_selection());
        assert_eq!(sys.params().mass, 4.0);
        assert_eq!(sys.params().elasticity, 1.0);
        assert!(!sys.eval_selection());

        sys.unselect_all();
        for (i, ks, kd) in [(ab, 5.0, 0.5), (bc, 5.0, 0.25)] {
            let s = sys.spring_mut(i)?;
            s.ks = ks;
            s.kd = kd;
            s.selected = true;
        }
        assert!(sys.eval_selection());
        assert_eq!(sys.params().stiffness, 5.0);
        // Damping differs across the selection, so it is left alone.
        assert_eq!(sys.params().damping, 1.0);
        Ok(())
    }

    #[test]
    fn eval_selection_fixed_flag_follows_first_unless_later_fixed() -> Result<()> {
        let (mut sys, [a, b, c], _) = triangle()?;
        sys.mass_mut(a)?.fixed = true;
        sys.select_object(Object::Mass(a), false)?;
        sys.select_object(Object::Mass(b), false)?;
        assert!(sys.eval_selection());
        assert!(sys.params().fix_mass);

        sys.unselect_all();
        sys.params_mut().fix_mass = false;
        sys.mass_mut(a)?.fixed = false;
        sys.mass_mut(c)?.fixed = true;
        sys.select_object(Object::Mass(a), false)?;
        sys.select_object(Object::Mass(c), false)?;
        assert!(!sys.eval_selection());
        assert!(!sys.params().fix_mass);
        Ok(())
    }

    #[test]
    fn duplicate_connected_pair() -> Result<()> {
        let mut sys = System::new();
        let a = sys.add_mass(0.0, 0.0);
        let b = sys.add_mass(50.0, 0.0);
        let s = sys.add_spring(a, b)?;
        sys.select_all();
        sys.duplicate_selected();

        assert_eq!(sys.mass_count(), 5);
        assert_eq!(sys.spring_count(), 3);
        let (na, nb, ns) = (3, 4, 2);
        assert!(sys.mass(na)?.is_alive() && sys.mass(nb)?.is_alive());
        assert!(!sys.mass(na)?.selected);
        let copy = sys.spring(ns)?;
        assert!(copy.is_alive() && !copy.selected);
        assert_eq!(copy.endpoints(), [na, nb]);
        assert_eq!(sys.mass(na)?.parents(), &[ns]);
        assert_eq!(sys.mass(nb)?.parents(), &[ns]);
        assert_eq!(sys.mass(a)?.parents(), &[s]);
        Ok(())
    }

    #[test]
    fn duplicate_drops_unanchored_springs() -> Result<()> {
        let (mut sys, [a, _, _], [ab, bc, _]) = triangle()?;
        sys.select_object(Object::Mass(a), false)?;
        sys.select_object(Object::Spring(ab), false)?;
        sys.select_object(Object::Spring(bc), false)?;
        let springs = sys.spring_count();
        sys.duplicate_selected();
        // ab survives half-remapped; bc touches no copied mass.
        assert_eq!(sys.spring_count(), springs + 1);
        let copy = sys.spring(springs)?;
        let na = sys.mass_count() - 1;
        assert_eq!(copy.endpoints(), [na, 2]);
        assert!(sys.mass(2)?.parents().contains(&springs));
        Ok(())
    }

    #[test]
    fn temp_fix_releases_only_tagged() -> Result<()> {
        let (mut sys, [a, b, _], _) = triangle()?;
        sys.mass_mut(a)?.fixed = true;
        sys.select_object(Object::Mass(a), false)?;
        sys.select_object(Object::Mass(b), false)?;
        sys.set_temp_fixed(true);
        assert!(sys.mass(a)?.fixed && sys.mass(b)?.fixed);
        assert!(!sys.mass(a)?.temp_fixed && sys.mass(b)?.temp_fixed);
        sys.set_temp_fixed(false);
        assert!(sys.mass(a)?.fixed);
        assert!(!sys.mass(b)?.fixed);
        Ok(())
    }

    #[test]
    fn bulk_moves_and_velocities() -> Result<()> {
        let (mut sys, [a, b, _], _) = triangle()?;
        sys.select_object(Object::Mass(a), false)?;
        sys.move_selected_masses(5.0, -5.0);
        assert_eq!(sys.mass(a)?.r, [105.0, 95.0]);
        assert_eq!(sys.mass(b)?.r, [200.0, 100.0]);
        sys.set_mass_velocity(1.0, 2.0, false);
        sys.set_mass_velocity(1.0, 2.0, true);
        assert_eq!(sys.mass(a)?.v, [2.0, 4.0]);
        assert_eq!(sys.mass(b)?.v, [0.0, 0.0]);
        Ok(())
    }

    #[test]
    fn rest_length_follows_geometry() -> Result<()> {
        let (mut sys, [a, _, _], [ab, bc, _]) = triangle()?;
        sys.mass_mut(a)?.r = [50.0, 100.0];
        sys.select_object(Object::Spring(ab), false)?;
        sys.set_rest_length();
        assert!((sys.spring(ab)?.restlen - 150.0).abs() < 1e-12);
        assert!((sys.spring(bc)?.restlen - 50f64.hypot(100.0)).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn center_needs_exactly_one_selected_mass() -> Result<()> {
        let (mut sys, [a, b, _], _) = triangle()?;
        sys.select_object(Object::Mass(a), false)?;
        assert!(sys.set_center());
        assert_eq!(sys.params().center, Some(a));
        sys.select_object(Object::Mass(b), false)?;
        assert!(!sys.set_center());
        assert_eq!(sys.params().center, Some(a));
        sys.unselect_all();
        assert!(sys.set_center());
        assert_eq!(sys.params().center, None);
        Ok(())
    }

    #[test]
    fn apply_parameters_to_selection() -> Result<()> {
        let (mut sys, [a, b, _], [ab, _, _]) = triangle()?;
        sys.select_object(Object::Mass(a), false)?;
        sys.select_object(Object::Spring(ab), false)?;
        sys.set_selected_mass(100.0)?;
        sys.set_selected_elasticity(0.5);
        sys.set_selected_stiffness(7.0);
        sys.set_selected_damping(0.1);
        assert_eq!(sys.mass(a)?.mass, 100.0);
        assert_eq!(sys.mass(a)?.radius, crate::core::mass::mass_radius(100.0));
        assert_eq!(sys.mass(a)?.elastic, 0.5);
        assert_eq!(sys.mass(b)?.mass, 1.0);
        assert_eq!(sys.spring(ab)?.ks, 7.0);
        assert_eq!(sys.spring(ab)?.kd, 0.1);
        assert_eq!(sys.params().stiffness, 7.0);
        sys.set_selected_fixed(true);
        assert!(sys.mass(a)?.fixed && !sys.mass(a)?.temp_fixed);

        for bad in [0.0, -1.0, f64::NAN] {
            assert!(matches!(
                sys.set_selected_mass(bad),
                Err(Error::InvalidParam(_))
            ));
        }
        assert_eq!(sys.mass(a)?.mass, 100.0);
        assert_eq!(sys.params().mass, 100.0);
        Ok(())
    }

    #[test]
    fn drag_spring_toggles_outside_lifecycle() -> Result<()> {
        let mut sys = System::new();
        let a = sys.add_mass(10.0, 10.0);
        sys.attach_drag_spring(a)?;
        sys.move_drag_mass(40.0, 50.0);
        let drag = sys.drag_spring();
        assert!(drag.is_alive());
        assert_eq!(drag.endpoints(), [DRAG_MASS, a]);
        assert_eq!(sys.masses()[DRAG_MASS].r, [40.0, 50.0]);
        // The target does not list the drag spring among its parents.
        assert!(sys.mass(a)?.parents().is_empty());
        sys.release_drag_spring();
        assert!(!sys.drag_spring().is_alive());
        sys.attach_drag_spring(a)?;
        assert_eq!(sys.masses()[DRAG_MASS].parents(), &[DRAG_SPRING]);
        assert!(matches!(sys.attach_drag_spring(DRAG_MASS), Err(Error::SentinelMass)));

        sys.delete_mass(a)?;
        assert!(!sys.drag_spring().is_alive());
        Ok(())
    }

    #[test]
    fn reset_restores_parameters() -> Result<()> {
        let (mut sys, _, _) = triangle()?;
        sys.params_mut().viscosity = 2.0;
        sys.reset();
        assert_eq!(sys.params(), &Params::default());
        assert_eq!(sys.mass_count(), 1);
        Ok(())
    }
}
