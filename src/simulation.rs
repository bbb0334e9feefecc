//! Simulation driver
//!
//! [`Simulation`] owns the authoritative [`SimulationState`], the host
//! engine, the optional accelerator engine and the presentation frame. The
//! selected [`Backend`] decides what a plain [`Simulation::step`] does.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{debug, info};

use crate::compare::Comparison;
use crate::config::RunConfig;
use crate::error::{SimError, SimResult};
use crate::gpu::{AcceleratorEngine, GpuContext, InteropMode};
use crate::host::HostEngine;
use crate::presentation::FrameBuffer;
use crate::state::SimulationState;

/// Which compute backends advance the state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Host cores only
    #[default]
    Host,
    /// Accelerator only; positions are exchanged through the frame buffer
    Accelerator,
    /// Both from the same state, compared after every step
    Both,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Host => "cpu",
            Backend::Accelerator => "gpu",
            Backend::Both => "cpugpu",
        }
    }

    pub fn uses_host(self) -> bool {
        matches!(self, Backend::Host | Backend::Both)
    }

    pub fn uses_accelerator(self) -> bool {
        matches!(self, Backend::Accelerator | Backend::Both)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Backend::Host),
            "gpu" => Ok(Backend::Accelerator),
            "cpugpu" => Ok(Backend::Both),
            _ => Err(SimError::UnknownBackend(s.to_string())),
        }
    }
}

/// Cooperative stop flag, checked between steps
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every loop holding a clone of this token to stop at the next step boundary
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A running simulation
pub struct Simulation {
    backend: Backend,
    state: SimulationState,
    host: HostEngine,
    accelerator: Option<AcceleratorEngine>,
    frame: FrameBuffer,
}

impl Simulation {
    /// Build the engines `backend` needs from `config` and configure them for `state`
    ///
    /// Accelerator-only runs share the frame buffer with the device; runs on
    /// both backends keep a private readback buffer and let the host publish.
    pub fn from_config(backend: Backend, config: &RunConfig, state: SimulationState) -> SimResult<Self> {
        let host = match config.host.threads {
            Some(threads) => HostEngine::with_threads(config.physics, threads)?,
            None => HostEngine::new(config.physics),
        };
        let frame = FrameBuffer::with_contents(state.flattened_positions());

        let accelerator = if backend.uses_accelerator() {
            let ctx = GpuContext::new(config.kernel.adapter.as_deref())?;
            let mode = match backend {
                Backend::Both => InteropMode::Dual,
                _ => InteropMode::Shared,
            };
            let mut engine = AcceleratorEngine::new(ctx, config.kernel.clone(), config.physics, mode)
                .with_frame(frame.clone());
            engine.configure(&state)?;
            Some(engine)
        } else {
            None
        };

        info!(
            backend = %backend,
            bodies = state.len(),
            host_threads = host.threads(),
            "simulation ready"
        );
        Ok(Self {
            backend,
            state,
            host,
            accelerator,
            frame,
        })
    }

    /// Host-only simulation around an existing engine
    pub fn host_only(state: SimulationState, host: HostEngine) -> Self {
        let frame = FrameBuffer::with_contents(state.flattened_positions());
        Self {
            backend: Backend::Host,
            state,
            host,
            accelerator: None,
            frame,
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn host(&self) -> &HostEngine {
        &self.host
    }

    pub fn accelerator(&self) -> Option<&AcceleratorEngine> {
        self.accelerator.as_ref()
    }

    /// Handle to the presentation frame
    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    /// Replace the state, e.g. for the next benchmark body count
    ///
    /// The frame is republished first so an accelerator sharing it seeds
    /// from the new positions when it reconfigures.
    pub fn reset(&mut self, state: SimulationState) -> SimResult<()> {
        self.frame.publish(&state.flattened_positions());
        self.state = state;
        if let Some(engine) = self.accelerator.as_mut() {
            engine.configure(&self.state)?;
        }
        Ok(())
    }

    /// One host step; returns its compute time in seconds
    pub fn step_host(&mut self) -> f64 {
        self.host.step(&mut self.state, Some(&self.frame))
    }

    /// One accelerator step; returns its device time in seconds
    pub fn step_accelerator(&mut self) -> SimResult<f64> {
        let engine = self
            .accelerator
            .as_mut()
            .ok_or(SimError::AcceleratorUnavailable)?;
        engine.step(&mut self.state)
    }

    /// Step both backends from the same state: `(host_seconds, accelerator_seconds)`
    ///
    /// The accelerator runs first and leaves its positions in its readback
    /// buffer, then the host advances the state. Afterwards
    /// [`compare`](Self::compare) sees the same logical step from both sides.
    pub fn step_both(&mut self) -> SimResult<(f64, f64)> {
        let accelerator = self.step_accelerator()?;
        let host = self.step_host();
        Ok((host, accelerator))
    }

    /// Divergence of the accelerator's last positions from the host state
    pub fn compare(&self) -> SimResult<Comparison> {
        let engine = self
            .accelerator
            .as_ref()
            .ok_or(SimError::AcceleratorUnavailable)?;
        Comparison::against_flat(self.state.positions(), engine.readback_positions())
    }

    /// One step on the selected backend; returns the time to record
    ///
    /// Runs on both backends report the host time and log the comparison.
    pub fn step(&mut self) -> SimResult<f64> {
        match self.backend {
            Backend::Host => Ok(self.step_host()),
            Backend::Accelerator => self.step_accelerator(),
            Backend::Both => {
                let (host, accelerator) = self.step_both()?;
                let cmp = self.compare()?;
                debug!(
                    host_s = host,
                    accelerator_s = accelerator,
                    mean_error = cmp.mean_error,
                    mean_magnitude = cmp.mean_magnitude,
                    relative_error = cmp.relative_error,
                    "backend comparison"
                );
                Ok(host)
            }
        }
    }

    /// Step until `steps` are done (forever when `None`) or `stop` is raised
    ///
    /// Each step's compute time and frame rate is logged as it happens and
    /// then dropped. Returns the number of completed steps.
    pub fn run(&mut self, steps: Option<usize>, stop: &StopToken) -> SimResult<usize> {
        let mut done = 0;
        let mut last_frame = Instant::now();
        while steps.is_none_or(|limit| done < limit) && !stop.is_stopped() {
            let calc = self.step()?;
            let now = Instant::now();
            let period = now.duration_since(last_frame).as_secs_f64();
            last_frame = now;
            done += 1;
            info!(
                step = done,
                calc_s = calc,
                fps = period.recip(),
                "Calc time: {calc:.6}s, FPS: {:.2}",
                period.recip()
            );
        }
        Ok(done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicalConstants;
    use crate::vector::Vector3;

    fn two_bodies() -> SimulationState {
        SimulationState::new(
            vec![Vector3::ZERO, Vector3::new(1.0e9, 0.0, 0.0)],
            vec![Vector3::ZERO, Vector3::new(0.0, 1.0e3, 0.0)],
            vec![1.0e30, 1.0e20],
        )
        .unwrap()
    }

    fn host_sim() -> Simulation {
        Simulation::host_only(two_bodies(), HostEngine::new(PhysicalConstants::default()))
    }

    #[test]
    fn backend_names() {
        assert_eq!("cpu".parse::<Backend>().unwrap(), Backend::Host);
        assert_eq!("GPU".parse::<Backend>().unwrap(), Backend::Accelerator);
        assert_eq!("cpugpu".parse::<Backend>().unwrap(), Backend::Both);
        assert!(matches!(
            "tpu".parse::<Backend>(),
            Err(SimError::UnknownBackend(_))
        ));
        assert_eq!(Backend::Both.to_string(), "cpugpu");
        assert!(Backend::Both.uses_host() && Backend::Both.uses_accelerator());
        assert!(!Backend::Host.uses_accelerator());
    }

    #[test]
    fn host_step_publishes_frame() {
        let mut sim = host_sim();
        sim.step().unwrap();
        assert_eq!(sim.frame().snapshot(), sim.state().flattened_positions());
    }

    #[test]
    fn accelerator_calls_fail_without_engine() {
        let mut sim = host_sim();
        assert!(matches!(
            sim.step_accelerator(),
            Err(SimError::AcceleratorUnavailable)
        ));
        assert!(matches!(sim.step_both(), Err(SimError::AcceleratorUnavailable)));
        assert!(matches!(sim.compare(), Err(SimError::AcceleratorUnavailable)));
    }

    #[test]
    fn run_stops_at_step_count() {
        let mut sim = host_sim();
        assert_eq!(sim.run(Some(3), &StopToken::new()).unwrap(), 3);
    }

    #[test]
    fn run_honours_stop_token() {
        let mut sim = host_sim();
        let stop = StopToken::new();
        stop.stop();
        assert_eq!(sim.run(None, &stop).unwrap(), 0);
        assert_eq!(sim.state().positions()[1], Vector3::new(1.0e9, 0.0, 0.0));
    }

    #[test]
    fn reset_republishes_frame() {
        let mut sim = host_sim();
        let empty = SimulationState::empty();
        sim.reset(empty).unwrap();
        assert!(sim.frame().is_empty());
        assert!(sim.state().is_empty());
    }
}
