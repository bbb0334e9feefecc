//! Accelerator tests; each one returns early when no adapter is present

use nbodysim::compare::Comparison;
use nbodysim::config::{KernelTuning, PhysicalConstants, RunConfig};
use nbodysim::dataset::{BodySource, Distribution, RandomBodies, SolarSystem};
use nbodysim::error::SimError;
use nbodysim::gpu::{AcceleratorEngine, GpuContext, InteropMode, TilingVariant};
use nbodysim::host::HostEngine;
use nbodysim::simulation::{Backend, Simulation};
use nbodysim::state::SimulationState;

fn context() -> Option<GpuContext> {
    match GpuContext::new(None) {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            eprintln!("skipping: no usable GPU adapter ({e})");
            None
        }
    }
}

fn bodies(count: usize, distribution: Distribution) -> SimulationState {
    SolarSystem::new(RandomBodies {
        seed: Some(2024),
        distribution,
        ..RandomBodies::default()
    })
    .with_count(count)
    .build()
    .unwrap()
}

fn tuning(variant: TilingVariant) -> KernelTuning {
    KernelTuning {
        variant,
        ..KernelTuning::default()
    }
}

#[test]
fn accelerator_matches_host_for_every_variant() {
    let Some(ctx) = context() else { return };
    let constants = PhysicalConstants::default();
    let host = HostEngine::new(constants);
    let initial = bodies(600, Distribution::Normal);

    let mut reference = initial.clone();
    for _ in 0..3 {
        host.step(&mut reference, None);
    }

    for variant in TilingVariant::ALL {
        let mut engine =
            AcceleratorEngine::new(ctx.clone(), tuning(variant), constants, InteropMode::Shared);
        let mut state = initial.clone();
        engine.configure(&state).unwrap();
        for _ in 0..3 {
            let seconds = engine.step(&mut state).unwrap();
            assert!(seconds >= 0.0);
        }

        let cmp = Comparison::between(reference.positions(), state.positions()).unwrap();
        assert!(
            cmp.relative_error < 1e-3,
            "{variant}: relative error {}",
            cmp.relative_error
        );
    }
}

#[test]
fn body_counts_that_do_not_fill_a_workgroup() {
    let Some(ctx) = context() else { return };
    let constants = PhysicalConstants::default();
    let host = HostEngine::new(constants);

    for count in [0, 1, 7, 23] {
        let initial = bodies(count, Distribution::Uniform);
        let mut reference = initial.clone();
        host.step(&mut reference, None);

        for variant in TilingVariant::ALL {
            let mut engine =
                AcceleratorEngine::new(ctx.clone(), tuning(variant), constants, InteropMode::Shared);
            let mut state = initial.clone();
            let config = engine.configure(&state).unwrap();
            assert!(config.dispatch_range >= config.body_count);
            assert_eq!(config.dispatch_range % config.workgroup_size, 0);

            engine.step(&mut state).unwrap();
            let cmp = Comparison::between(reference.positions(), state.positions()).unwrap();
            assert!(cmp.relative_error < 1e-3, "{variant} with {count} random bodies");
        }
    }
}

#[test]
fn shared_mode_updates_state_and_frame() {
    if context().is_none() {
        return;
    }
    let config = RunConfig::default();
    let initial = bodies(100, Distribution::Normal);
    let mut sim = Simulation::from_config(Backend::Accelerator, &config, initial.clone()).unwrap();

    sim.step().unwrap();

    assert_ne!(sim.state().positions(), initial.positions());
    assert_eq!(sim.frame().snapshot(), sim.state().flattened_positions());
    assert_eq!(
        sim.accelerator().unwrap().readback_positions(),
        sim.frame().snapshot().as_slice()
    );
}

#[test]
fn dual_mode_leaves_state_untouched() {
    let Some(ctx) = context() else { return };
    let constants = PhysicalConstants::default();
    let mut engine = AcceleratorEngine::new(
        ctx,
        KernelTuning::default(),
        constants,
        InteropMode::Dual,
    );
    let mut state = bodies(50, Distribution::Normal);
    let before = state.flattened_positions();
    engine.configure(&state).unwrap();

    engine.step(&mut state).unwrap();

    assert_eq!(state.flattened_positions(), before);
    assert_eq!(engine.readback_positions().len(), before.len());
    assert_ne!(engine.readback_positions(), before.as_slice());
}

#[test]
fn both_backends_stay_in_agreement() {
    if context().is_none() {
        return;
    }
    let config = RunConfig::default();
    let mut sim =
        Simulation::from_config(Backend::Both, &config, bodies(200, Distribution::Normal)).unwrap();

    for _ in 0..5 {
        let (host_s, accelerator_s) = sim.step_both().unwrap();
        assert!(host_s >= 0.0 && accelerator_s >= 0.0);
        let cmp = sim.compare().unwrap();
        assert!(cmp.relative_error < 1e-3, "relative error {}", cmp.relative_error);
    }
    assert_eq!(sim.frame().snapshot(), sim.state().flattened_positions());
}

#[test]
fn empty_state_is_rejected() {
    let Some(ctx) = context() else { return };
    let mut engine = AcceleratorEngine::new(
        ctx,
        KernelTuning::default(),
        PhysicalConstants::default(),
        InteropMode::Shared,
    );
    assert!(matches!(
        engine.configure(&SimulationState::empty()),
        Err(SimError::ZeroDispatchRange)
    ));
}

#[test]
fn reconfigures_when_body_count_changes() {
    let Some(ctx) = context() else { return };
    let mut engine = AcceleratorEngine::new(
        ctx,
        KernelTuning::default(),
        PhysicalConstants::default(),
        InteropMode::Shared,
    );
    assert_eq!(
        engine.uses_device_timestamps(),
        engine.context().has_timestamps()
    );
    let mut small = bodies(10, Distribution::Normal);
    engine.configure(&small).unwrap();
    engine.step(&mut small).unwrap();

    let mut large = bodies(300, Distribution::Normal);
    engine.step(&mut large).unwrap();
    assert_eq!(engine.config().unwrap().body_count, 309);
    assert_eq!(engine.readback_positions().len(), 309 * 3);
}
