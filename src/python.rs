use numpy::ndarray::Array2;
use numpy::{IntoPyArray, PyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::core::{Mass, Object, Simulation, Walls, DIM};

fn py_err<E: ToString>(e: E) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Stack one vector per mass slot into an (N, 2) array; dead slots are zero.
fn per_mass(masses: &[Mass], field: impl Fn(&Mass) -> [f64; DIM]) -> Array2<f64> {
    let mut arr = Array2::<f64>::zeros((masses.len(), DIM));
    for (i, m) in masses.iter().enumerate().filter(|(_, m)| m.is_alive()) {
        let v = field(m);
        for k in 0..DIM {
            arr[[i, k]] = v[k];
        }
    }
    arr
}

/// SpringSim Python-facing wrapper around the Rust Simulation core.
///
/// API:
/// - __new__(width, height)
/// - add_mass(x, y) -> index, add_spring(m1, m2) -> index, delete_mass(i)
/// - advance() -> redraw flag, step(n) -> number of redraw signals
/// - get_positions() / get_velocities() -> np.ndarray, shape (N, 2)
#[pyclass]
pub struct SpringSim {
    sim: Simulation,
}

#[pymethods]
impl SpringSim {
    /// Initialize an empty simulation in a width x height viewport (y up).
    ///
    /// Errors: raises ValueError unless both extents are finite and > 0.
    #[new]
    fn new(width: f64, height: f64) -> PyResult<Self> {
        let sim = Simulation::new(width, height).map_err(py_err)?;
        Ok(Self { sim })
    }

    /// Create a mass at (x, y) with the current mass/elasticity settings.
    fn add_mass(&mut self, x: f64, y: f64) -> PyResult<usize> {
        if !x.is_finite() || !y.is_finite() {
            return Err(py_err("position values must be finite"));
        }
        Ok(self.sim.system_mut().add_mass(x, y))
    }

    /// Connect two masses; rest length is their current distance.
    fn add_spring(&mut self, m1: usize, m2: usize) -> PyResult<usize> {
        self.sim.system_mut().add_spring(m1, m2).map_err(py_err)
    }

    /// Delete a mass and every spring attached to it.
    fn delete_mass(&mut self, i: usize) -> PyResult<()> {
        self.sim.system_mut().delete_mass(i).map_err(py_err)
    }

    /// Advance one tick; returns True when a redraw is due.
    fn advance(&mut self, py: Python<'_>) -> bool {
        py.detach(|| self.sim.advance())
    }

    /// Advance `n` ticks (releases the GIL); returns how many asked for a redraw.
    fn step(&mut self, py: Python<'_>, n: usize) -> usize {
        py.detach(|| (0..n).filter(|_| self.sim.advance()).count())
    }

    /// Return positions as a NumPy array of shape (N, 2), dtype=float64.
    fn get_positions<'py>(&self, py: Python<'py>) -> PyResult<Py<PyArray2<f64>>> {
        let arr = per_mass(self.sim.system().masses(), |m| m.r);
        Ok(arr.into_pyarray(py).to_owned().into())
    }

    /// Return velocities as a NumPy array of shape (N, 2), dtype=float64.
    fn get_velocities<'py>(&self, py: Python<'py>) -> PyResult<Py<PyArray2<f64>>> {
        let arr = per_mass(self.sim.system().masses(), |m| m.v);
        Ok(arr.into_pyarray(py).to_owned().into())
    }

    /// Configure gravity: magnitude and direction in degrees (0 = down).
    #[pyo3(signature = (value, direction=0.0, enabled=true))]
    fn set_gravity(&mut self, value: f64, direction: f64, enabled: bool) -> PyResult<()> {
        let mut params = self.sim.params().clone();
        params.gravity.value = value;
        params.gravity.misc = direction;
        params.gravity.enabled = enabled;
        self.sim.set_params(params).map_err(py_err)
    }

    /// Enable or disable each wall.
    #[pyo3(signature = (top=true, left=true, right=true, bottom=true))]
    fn set_walls(&mut self, top: bool, left: bool, right: bool, bottom: bool) {
        self.sim.system_mut().params_mut().walls = Walls {
            top,
            left,
            right,
            bottom,
        };
    }

    /// Switch between fixed-step RK4 and adaptive RKF45.
    fn set_adaptive(&mut self, adaptive: bool) {
        self.sim.system_mut().params_mut().adaptive = adaptive;
    }

    /// Set the step size (must be finite and > 0).
    fn set_time_step(&mut self, dt: f64) -> PyResult<()> {
        let mut params = self.sim.params().clone();
        params.time_step = dt;
        self.sim.set_params(params).map_err(py_err)
    }

    /// Enable or disable pairwise mass collisions.
    fn set_collide(&mut self, collide: bool) {
        self.sim.system_mut().params_mut().collide = collide;
    }

    /// Hit test: ("mass", i), ("spring", i) or None.
    #[pyo3(signature = (x, y, mass_only=false))]
    fn nearest_object(&self, x: f64, y: f64, mass_only: bool) -> Option<(&'static str, usize)> {
        match self.sim.system().nearest_object(x, y, mass_only)? {
            Object::Mass(i) => Some(("mass", i)),
            Object::Spring(i) => Some(("spring", i)),
        }
    }

    /// Number of mass slots (dead ones included).
    fn mass_count(&self) -> usize {
        self.sim.system().mass_count()
    }

    /// Number of spring slots (dead ones included).
    fn spring_count(&self) -> usize {
        self.sim.system().spring_count()
    }

    /// Number of live masses.
    fn live_mass_count(&self) -> usize {
        self.sim.system().live_mass_count()
    }

    /// Number of live springs.
    fn live_spring_count(&self) -> usize {
        self.sim.system().live_spring_count()
    }

    /// Total kinetic energy of the movable masses.
    fn kinetic_energy(&self) -> f64 {
        self.sim.system().kinetic_energy()
    }
}

/// The springsim Python module entry point.
#[pymodule]
fn springsim(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<SpringSim>()?;
    Ok(())
}
