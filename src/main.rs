use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nbodysim::bench::{BenchmarkMode, Sweep};
use nbodysim::cli::Cli;
use nbodysim::dataset::{BodySource, SolarSystem};
use nbodysim::gpu::GpuContext;
use nbodysim::metrics::{AcceleratorDescription, CsvLog, RunDescription};
use nbodysim::simulation::{Simulation, StopToken};

fn list_adapters() {
    let adapters = GpuContext::enumerate_adapters();
    if adapters.is_empty() {
        println!("No GPU adapters found");
    }
    for a in adapters {
        println!(
            "[{}] {} ({}, {}){}",
            a.index,
            a.name,
            a.backend,
            a.device_type,
            if a.has_timestamps { " timestamps" } else { "" }
        );
    }
}

/// Raise `stop` on the first Ctrl-C; a second one exits immediately
fn stop_on_interrupt(stop: StopToken) {
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(error = %e, "cannot install interrupt handler");
                return;
            }
        };
        runtime.block_on(async {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            info!("interrupted, stopping after the current step");
            stop.stop();
            if tokio::signal::ctrl_c().await.is_ok() {
                std::process::exit(130);
            }
        });
    });
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if cli.list_adapters {
        list_adapters();
        return Ok(());
    }

    let stop = StopToken::new();
    stop_on_interrupt(stop.clone());

    let config = cli.run_config().context("failed to load run configuration")?;
    let source = SolarSystem::new(config.dataset.clone());
    let state = source
        .build()
        .with_context(|| format!("failed to build {} bodies", source.name()))?;
    let mut sim = Simulation::from_config(cli.device, &config, state)
        .with_context(|| format!("failed to set up the {} backend", cli.device))?;

    match cli.benchmark {
        BenchmarkMode::Off => {
            let steps = sim.run(cli.steps, &stop)?;
            info!(steps, "run finished");
        }
        mode => {
            let accelerator = sim.accelerator().map(|engine| AcceleratorDescription {
                adapter: engine.context().adapter().name.clone(),
                variant: engine.tuning().variant,
            });
            let host_threads = cli.device.uses_host().then(|| sim.host().threads());
            let description = RunDescription::detect(accelerator, host_threads);

            let mut log = CsvLog::create(&cli.output, &description.to_string())
                .with_context(|| format!("failed to create log in {}", cli.output.display()))?;
            let rows = Sweep::new(&config.benchmark, &config.dataset)
                .with_stop(stop)
                .run(mode, &mut sim, &mut log)?;
            info!(
                entries = rows.len(),
                path = %log.path().display(),
                "benchmark finished"
            );
        }
    }

    Ok(())
}
