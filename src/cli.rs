use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;

use crate::bench::BenchmarkMode;
use crate::config::RunConfig;
use crate::dataset::Distribution;
use crate::error::{SimError, SimResult};
use crate::gpu::TilingVariant;
use crate::simulation::Backend;

/// Newtonian N-body gravity on host cores and on the GPU.
#[derive(Parser, Debug)]
#[command(name = "nbodysim")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// YAML run configuration; flags below override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Random bodies added to the nine solar-system bodies
    #[arg(short = 'n', long)]
    pub bodies: Option<usize>,

    /// Compute backend: cpu, gpu or cpugpu
    #[arg(short, long, default_value = "cpu", value_parser = parse_named::<Backend>)]
    pub device: Backend,

    /// GPU force kernel: naive, shared-tile or async-copy-tile
    #[arg(short, long, value_parser = parse_named::<TilingVariant>)]
    pub kernel: Option<TilingVariant>,

    /// Random position distribution: normal or uniform
    #[arg(long, value_parser = parse_named::<Distribution>)]
    pub distribution: Option<Distribution>,

    /// Upper bound of random body masses, in kilograms
    #[arg(long)]
    pub max_mass: Option<f64>,

    /// Seed for the random bodies
    #[arg(long)]
    pub seed: Option<u64>,

    /// Host worker threads (rayon's global pool when omitted)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// GPU adapter index or name fragment
    #[arg(long)]
    pub adapter: Option<String>,

    /// Steps to run before exiting (runs until interrupted when omitted)
    #[arg(short, long)]
    pub steps: Option<usize>,

    /// Benchmark sweep: off, short or long
    #[arg(short, long, default_value = "off", value_parser = parse_named::<BenchmarkMode>)]
    pub benchmark: BenchmarkMode,

    /// Directory for benchmark CSV logs
    #[arg(short, long, default_value = "benchmarks")]
    pub output: PathBuf,

    /// Print the available GPU adapters and exit
    #[arg(long)]
    pub list_adapters: bool,
}

fn parse_named<T>(s: &str) -> Result<T, String>
where
    T: FromStr<Err = SimError>,
{
    s.parse().map_err(|e: SimError| e.to_string())
}

impl Cli {
    /// Configuration file (or defaults) with the command-line overrides applied
    pub fn run_config(&self) -> SimResult<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_yaml_file(path)?,
            None => RunConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    /// Overwrite every field of `config` that was given on the command line
    pub fn apply(&self, config: &mut RunConfig) {
        if let Some(n) = self.bodies {
            config.dataset.count = n;
        }
        if let Some(variant) = self.kernel {
            config.kernel.variant = variant;
        }
        if let Some(distribution) = self.distribution {
            config.dataset.distribution = distribution;
        }
        if let Some(max_mass) = self.max_mass {
            config.dataset.max_mass = max_mass;
        }
        if let Some(seed) = self.seed {
            config.dataset.seed = Some(seed);
        }
        if let Some(threads) = self.threads {
            config.host.threads = Some(threads);
        }
        if let Some(adapter) = &self.adapter {
            config.kernel.adapter = Some(adapter.clone());
        }
    }
}
