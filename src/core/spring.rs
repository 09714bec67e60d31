use serde::{Deserialize, Serialize};

/// A damped spring between two masses.
///
/// `m1` and `m2` are weak references into the mass array: they do not keep
/// the masses alive. A spring is deleted in cascade when either endpoint is
/// deleted through the [`System`](crate::core::System), which is also the
/// only place endpoints and liveness change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spring {
    /// Stiffness.
    pub ks: f64,
    /// Damping along the spring axis.
    pub kd: f64,
    /// Rest length.
    pub restlen: f64,
    pub(crate) m1: usize,
    pub(crate) m2: usize,
    pub(crate) alive: bool,
    /// Part of the current selection.
    pub selected: bool,
}

impl Default for Spring {
    fn default() -> Self {
        Self {
            ks: 0.0,
            kd: 0.0,
            restlen: 0.0,
            m1: 0,
            m2: 0,
            alive: true,
            selected: false,
        }
    }
}

impl Spring {
    /// A live, unselected spring between `m1` and `m2`.
    ///
    /// Nothing is registered with the masses until the spring is inserted
    /// into a [`System`](crate::core::System).
    pub fn new(m1: usize, m2: usize, ks: f64, kd: f64, restlen: f64) -> Self {
        Self {
            ks,
            kd,
            restlen,
            m1,
            m2,
            ..Self::default()
        }
    }

    /// First endpoint.
    #[inline]
    pub fn m1(&self) -> usize {
        self.m1
    }

    /// Second endpoint.
    #[inline]
    pub fn m2(&self) -> usize {
        self.m2
    }

    /// Both endpoints, in order.
    #[inline]
    pub fn endpoints(&self) -> [usize; 2] {
        [self.m1, self.m2]
    }

    /// True if `mass` is one of the endpoints.
    #[inline]
    pub fn connects(&self, mass: usize) -> bool {
        self.m1 == mass || self.m2 == mass
    }

    /// Not deleted.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.alive
    }
}
