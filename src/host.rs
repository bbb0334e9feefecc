//! Host parallel force engine
//!
//! One step is two data-parallel passes over the bodies:
//!
//! 1. accumulate the gravitational acceleration on each body from every
//!    other body and fold it into the velocity
//! 2. advance each position by its new velocity
//!
//! The passes are separate `par_iter_mut` calls; rayon joins all tasks of the
//! first before the second starts, so no position update can race an
//! acceleration read.

use std::time::Instant;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::config::PhysicalConstants;
use crate::error::SimResult;
use crate::presentation::FrameBuffer;
use crate::state::{KinematicsMut, SimulationState};
use crate::vector::Vector3;

/// Acceleration on body `i` from every `j != i`
///
/// Evaluated in the same order and with the same operations as the GPU
/// kernels so both backends round alike.
#[inline]
pub fn acceleration_on(i: usize, positions: &[Vector3], masses: &[f32], g: f32) -> Vector3 {
    let p_i = positions[i];
    let mut acc = Vector3::ZERO;
    for (j, (&p_j, &m_j)) in positions.iter().zip(masses).enumerate() {
        if i == j {
            continue;
        }
        let r = p_i - p_j;
        let r_mag = r.dot(r).sqrt();
        let a = (m_j * -g) / (r_mag * r_mag);
        acc += (r / r_mag) * a;
    }
    acc
}

/// Steps a [`SimulationState`] on host cores
pub struct HostEngine {
    constants: PhysicalConstants,
    pool: Option<ThreadPool>,
}

impl HostEngine {
    /// Engine on rayon's global pool
    pub fn new(constants: PhysicalConstants) -> Self {
        Self {
            constants,
            pool: None,
        }
    }

    /// Engine on a dedicated pool of `threads` workers
    pub fn with_threads(constants: PhysicalConstants, threads: usize) -> SimResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("nbody-host-{i}"))
            .build()?;
        debug!(threads, "built dedicated host pool");
        Ok(Self {
            constants,
            pool: Some(pool),
        })
    }

    /// Worker threads a step fans out over
    pub fn threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    pub fn constants(&self) -> PhysicalConstants {
        self.constants
    }

    /// Advance `state` by one time step and return the compute time in seconds
    ///
    /// When a frame buffer is given, the new positions are published to it
    /// after the step; the publish is not part of the returned time.
    pub fn step(&self, state: &mut SimulationState, frame: Option<&FrameBuffer>) -> f64 {
        let start = Instant::now();
        match &self.pool {
            Some(pool) => pool.install(|| self.advance(state.kinematics_mut())),
            None => self.advance(state.kinematics_mut()),
        }
        let elapsed = start.elapsed().as_secs_f64();

        if let Some(frame) = frame {
            frame.publish(&state.flattened_positions());
        }
        elapsed
    }

    fn advance(&self, k: KinematicsMut<'_>) {
        let PhysicalConstants { g, dt } = self.constants;
        let KinematicsMut {
            positions,
            velocities,
            masses,
        } = k;

        {
            let positions: &[Vector3] = &*positions;
            velocities.par_iter_mut().enumerate().for_each(|(i, v)| {
                *v += acceleration_on(i, positions, masses, g) * dt;
            });
        }

        positions
            .par_iter_mut()
            .zip(velocities.par_iter())
            .for_each(|(p, &v)| *p += v * dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_G;

    fn engine() -> HostEngine {
        HostEngine::new(PhysicalConstants::default())
    }

    fn pair() -> SimulationState {
        SimulationState::new(
            vec![Vector3::ZERO, Vector3::new(1.496e11, 0.0, 0.0)],
            vec![Vector3::ZERO, Vector3::new(0.0, 29_780.0, 0.0)],
            vec![1.989e30, 5.9724e24],
        )
        .unwrap()
    }

    #[test]
    fn acceleration_points_at_the_other_body() {
        let state = pair();
        let a = acceleration_on(1, state.positions(), state.masses(), DEFAULT_G);
        assert!(a.x < 0.0);
        assert_eq!(a.y, 0.0);
        assert_eq!(a.z, 0.0);

        let b = acceleration_on(0, state.positions(), state.masses(), DEFAULT_G);
        assert!(b.x > 0.0);
    }

    #[test]
    fn empty_and_single_body_states() {
        let mut empty = SimulationState::empty();
        let t = engine().step(&mut empty, None);
        assert!(t >= 0.0);
        assert!(empty.is_empty());

        let mut lone = SimulationState::new(
            vec![Vector3::new(1.0, 2.0, 3.0)],
            vec![Vector3::new(1.0, 0.0, 0.0)],
            vec![5.0],
        )
        .unwrap();
        engine().step(&mut lone, None);
        assert_eq!(lone.velocities()[0], Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(lone.positions()[0], Vector3::new(86_401.0, 2.0, 3.0));
    }

    #[test]
    fn publishes_to_frame() {
        let frame = FrameBuffer::new();
        let mut state = pair();
        engine().step(&mut state, Some(&frame));
        assert_eq!(frame.snapshot(), state.flattened_positions());
    }

    #[test]
    fn dedicated_pool_matches_global_pool() {
        let mut a = pair();
        let mut b = pair();
        let pooled = HostEngine::with_threads(PhysicalConstants::default(), 2).unwrap();
        assert_eq!(pooled.threads(), 2);
        for _ in 0..10 {
            engine().step(&mut a, None);
            pooled.step(&mut b, None);
        }
        assert_eq!(a.positions(), b.positions());
        assert_eq!(a.velocities(), b.velocities());
    }
}
