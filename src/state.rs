//! Per-body simulation state
//!
//! `SimulationState` owns positions, velocities and masses as three parallel
//! arrays. Index `i` names the same body in all three, and the arrays always
//! have the same length; every mutating method keeps that true.
//!
//! Backends never reach into the fields. They borrow the arrays through
//! [`SimulationState::kinematics_mut`] or replace them wholesale from
//! flattened device readbacks.

use crate::error::{SimError, SimResult};
use crate::vector::{self, Vector3};

/// Scalar extents used by the presentation layer for normalisation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub max_mass: f64,
    pub min_mass: f64,
    pub max_position: f64,
}

/// Positions, velocities and masses of every body
#[derive(Debug, Clone)]
pub struct SimulationState {
    positions: Vec<Vector3>,
    velocities: Vec<Vector3>,
    masses: Vec<f32>,
    bounds: Bounds,
}

/// Disjoint mutable view handed to a backend for one step
pub struct KinematicsMut<'a> {
    pub positions: &'a mut [Vector3],
    pub velocities: &'a mut [Vector3],
    pub masses: &'a [f32],
}

impl SimulationState {
    /// Build a state from parallel arrays; bounds are measured from the data
    pub fn new(
        positions: Vec<Vector3>,
        velocities: Vec<Vector3>,
        masses: Vec<f32>,
    ) -> SimResult<Self> {
        if positions.len() != velocities.len() || positions.len() != masses.len() {
            return Err(SimError::InconsistentState {
                positions: positions.len(),
                velocities: velocities.len(),
                masses: masses.len(),
            });
        }
        let bounds = measure_bounds(&positions, &masses);
        Ok(Self {
            positions,
            velocities,
            masses,
            bounds,
        })
    }

    /// Empty state (zero bodies)
    pub fn empty() -> Self {
        Self {
            positions: Vec::new(),
            velocities: Vec::new(),
            masses: Vec::new(),
            bounds: Bounds {
                max_mass: 0.0,
                min_mass: 0.0,
                max_position: 0.0,
            },
        }
    }

    /// Replace the measured bounds with supplier-declared ones
    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Number of bodies
    pub fn len(&self) -> usize {
        self.masses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masses.is_empty()
    }

    pub fn positions(&self) -> &[Vector3] {
        &self.positions
    }

    pub fn velocities(&self) -> &[Vector3] {
        &self.velocities
    }

    pub fn masses(&self) -> &[f32] {
        &self.masses
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Size in bytes of one flattened coordinate array
    pub fn flat_byte_len(&self) -> usize {
        self.len() * 3 * std::mem::size_of::<f32>()
    }

    /// Positions as `[x0, y0, z0, x1, ...]`, rebuilt on every call
    pub fn flattened_positions(&self) -> Vec<f32> {
        vector::flatten(&self.positions)
    }

    /// Velocities as `[x0, y0, z0, x1, ...]`, rebuilt on every call
    pub fn flattened_velocities(&self) -> Vec<f32> {
        vector::flatten(&self.velocities)
    }

    /// Borrow positions and velocities mutably alongside the masses
    pub fn kinematics_mut(&mut self) -> KinematicsMut<'_> {
        KinematicsMut {
            positions: &mut self.positions,
            velocities: &mut self.velocities,
            masses: &self.masses,
        }
    }

    /// Overwrite positions and velocities from flattened device readbacks
    pub fn load_flattened(&mut self, positions: &[f32], velocities: &[f32]) -> SimResult<()> {
        let expected = self.len() * 3;
        if positions.len() != expected || velocities.len() != expected {
            return Err(SimError::InconsistentState {
                positions: positions.len() / 3,
                velocities: velocities.len() / 3,
                masses: self.len(),
            });
        }
        self.positions = vector::unflatten(positions);
        self.velocities = vector::unflatten(velocities);
        Ok(())
    }
}

fn measure_bounds(positions: &[Vector3], masses: &[f32]) -> Bounds {
    let max_mass = masses.iter().copied().fold(f32::MIN, f32::max);
    let min_mass = masses.iter().copied().fold(f32::MAX, f32::min);
    let max_position = positions.iter().map(|p| p.length()).fold(0.0f32, f32::max);
    if masses.is_empty() {
        return Bounds {
            max_mass: 0.0,
            min_mass: 0.0,
            max_position: 0.0,
        };
    }
    Bounds {
        max_mass: f64::from(max_mass),
        min_mass: f64::from(min_mass),
        max_position: f64::from(max_position),
    }
}
