//! Benchmark sweeps over increasing body counts
//!
//! For every body count the sweep builds a fresh state, reconfigures the
//! engines, and probes with one measured span. A probe whose average step
//! time falls under the configured floor is treated as unsettled: the run
//! warms up to the full warm-up budget, starts a fresh collector, and
//! measures again. Exactly one summary row is recorded per body count.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, info};

use crate::config::SweepConfig;
use crate::dataset::{BodySource, RandomBodies, SolarSystem};
use crate::error::{SimError, SimResult};
use crate::metrics::{PerformanceCollector, SummaryRow, SummarySink};
use crate::simulation::{Simulation, StopToken};

/// Benchmark state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BenchmarkMode {
    /// Plain step loop, nothing aggregated
    #[default]
    Off,
    /// A prefix of the configured body counts
    Short,
    /// Every configured body count
    Long,
}

impl BenchmarkMode {
    pub fn as_str(self) -> &'static str {
        match self {
            BenchmarkMode::Off => "off",
            BenchmarkMode::Short => "short",
            BenchmarkMode::Long => "long",
        }
    }

    /// Random body counts this mode sweeps, in configured order
    pub fn body_counts(self, sweep: &SweepConfig) -> &[usize] {
        match self {
            BenchmarkMode::Off => &[],
            BenchmarkMode::Short => {
                &sweep.body_counts[..sweep.short_sweep_len.min(sweep.body_counts.len())]
            }
            BenchmarkMode::Long => &sweep.body_counts,
        }
    }
}

impl fmt::Display for BenchmarkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BenchmarkMode {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(BenchmarkMode::Off),
            "short" => Ok(BenchmarkMode::Short),
            "long" => Ok(BenchmarkMode::Long),
            _ => Err(SimError::UnknownBenchmarkMode(s.to_string())),
        }
    }
}

/// Drives one sweep and hands each summary row to a sink
pub struct Sweep<'a> {
    config: &'a SweepConfig,
    dataset: &'a RandomBodies,
    stop: StopToken,
}

impl<'a> Sweep<'a> {
    pub fn new(config: &'a SweepConfig, dataset: &'a RandomBodies) -> Self {
        Self {
            config,
            dataset,
            stop: StopToken::new(),
        }
    }

    /// Use `stop` to end the sweep at the next step boundary
    pub fn with_stop(mut self, stop: StopToken) -> Self {
        self.stop = stop;
        self
    }

    /// Run the sweep for `mode` on `sim`, returning the recorded rows
    ///
    /// A stop request abandons the body count in progress; rows already
    /// recorded are kept.
    pub fn run(
        &self,
        mode: BenchmarkMode,
        sim: &mut Simulation,
        sink: &mut dyn SummarySink,
    ) -> SimResult<Vec<SummaryRow>> {
        self.config.validate()?;
        let counts = mode.body_counts(self.config);
        info!(mode = %mode, entries = counts.len(), "starting benchmark sweep");

        let mut rows = Vec::with_capacity(counts.len());
        for &count in counts {
            if self.stop.is_stopped() {
                break;
            }
            let state = SolarSystem::new(self.dataset.clone())
                .with_count(count)
                .build()?;
            let bodies = state.len();
            sim.reset(state)?;

            let Some(row) = self.measure(sim, bodies)? else {
                info!(bodies, "benchmark sweep stopped");
                break;
            };
            sink.record(&row)?;
            info!(
                bodies,
                calc_avg_s = row.calc_avg,
                fps_avg = row.fps_avg,
                "sweep entry recorded"
            );
            rows.push(row);
        }
        Ok(rows)
    }

    /// Probe, warm up if the probe is too fast, measure; `None` if stopped
    fn measure(&self, sim: &mut Simulation, bodies: usize) -> SimResult<Option<SummaryRow>> {
        let measured = self.config.measured_steps.max(1);

        let mut collector = PerformanceCollector::new();
        if !self.span(sim, measured, Some(&mut collector))? {
            return Ok(None);
        }

        let probe_avg = collector.calc_times().avg().unwrap_or(0.0);
        let warmup = self.config.warmup_steps.saturating_sub(measured);
        if probe_avg < self.config.floor_seconds && warmup > 0 {
            debug!(
                bodies,
                probe_avg_s = probe_avg,
                floor_s = self.config.floor_seconds,
                warmup_steps = warmup,
                "probe below floor, extending warm-up"
            );
            if !self.span(sim, warmup, None)? {
                return Ok(None);
            }
            collector = PerformanceCollector::new();
            if !self.span(sim, measured, Some(&mut collector))? {
                return Ok(None);
            }
        }

        Ok(collector.summary(bodies))
    }

    /// Run `steps` steps, recording into `collector` if given; false if stopped
    fn span(
        &self,
        sim: &mut Simulation,
        steps: usize,
        mut collector: Option<&mut PerformanceCollector>,
    ) -> SimResult<bool> {
        for _ in 0..steps {
            if self.stop.is_stopped() {
                return Ok(false);
            }
            let calc = sim.step()?;
            if let Some(collector) = collector.as_deref_mut() {
                collector.record(calc);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicalConstants;
    use crate::dataset::FIXED_BODIES;
    use crate::host::HostEngine;
    use crate::state::SimulationState;

    fn sweep_config() -> SweepConfig {
        SweepConfig {
            body_counts: vec![0, 3, 8],
            short_sweep_len: 2,
            warmup_steps: 4,
            measured_steps: 2,
            floor_seconds: 0.0,
        }
    }

    fn dataset() -> RandomBodies {
        RandomBodies {
            seed: Some(7),
            ..RandomBodies::default()
        }
    }

    fn sim() -> Simulation {
        Simulation::host_only(
            SimulationState::empty(),
            HostEngine::new(PhysicalConstants::default()),
        )
    }

    #[test]
    fn mode_names() {
        assert_eq!("short".parse::<BenchmarkMode>().unwrap(), BenchmarkMode::Short);
        assert_eq!("LONG".parse::<BenchmarkMode>().unwrap(), BenchmarkMode::Long);
        assert!("medium".parse::<BenchmarkMode>().is_err());
        assert_eq!(BenchmarkMode::Off.to_string(), "off");
    }

    #[test]
    fn short_sweep_is_a_prefix() {
        let cfg = sweep_config();
        assert_eq!(BenchmarkMode::Off.body_counts(&cfg), &[] as &[usize]);
        assert_eq!(BenchmarkMode::Short.body_counts(&cfg), &[0, 3]);
        assert_eq!(BenchmarkMode::Long.body_counts(&cfg), &[0, 3, 8]);

        let oversized = SweepConfig {
            short_sweep_len: 10,
            ..sweep_config()
        };
        assert_eq!(BenchmarkMode::Short.body_counts(&oversized).len(), 3);
    }

    #[test]
    fn long_sweep_records_one_row_per_count() {
        let cfg = sweep_config();
        let data = dataset();
        let mut sim = sim();
        let mut sink: Vec<SummaryRow> = Vec::new();

        let rows = Sweep::new(&cfg, &data)
            .run(BenchmarkMode::Long, &mut sim, &mut sink)
            .unwrap();

        assert_eq!(rows, sink);
        let bodies: Vec<usize> = rows.iter().map(|r| r.bodies).collect();
        assert_eq!(
            bodies,
            vec![FIXED_BODIES, FIXED_BODIES + 3, FIXED_BODIES + 8]
        );
        for row in &rows {
            assert!(row.calc_min <= row.calc_avg && row.calc_avg <= row.calc_max);
        }
        assert_eq!(sim.state().len(), FIXED_BODIES + 8);
    }

    #[test]
    fn unreachable_floor_still_records() {
        let cfg = SweepConfig {
            floor_seconds: f64::INFINITY,
            ..sweep_config()
        };
        let data = dataset();
        let mut sink: Vec<SummaryRow> = Vec::new();
        let rows = Sweep::new(&cfg, &data)
            .run(BenchmarkMode::Short, &mut sim(), &mut sink)
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn descending_counts_are_refused() {
        let cfg = SweepConfig {
            body_counts: vec![8, 3],
            ..sweep_config()
        };
        let data = dataset();
        let mut sink: Vec<SummaryRow> = Vec::new();
        let err = Sweep::new(&cfg, &data)
            .run(BenchmarkMode::Long, &mut sim(), &mut sink)
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidSweep(_)));
        assert!(sink.is_empty());
    }

    #[test]
    fn stopped_sweep_records_nothing() {
        let cfg = sweep_config();
        let data = dataset();
        let stop = StopToken::new();
        stop.stop();
        let mut sink: Vec<SummaryRow> = Vec::new();
        let rows = Sweep::new(&cfg, &data)
            .with_stop(stop)
            .run(BenchmarkMode::Long, &mut sim(), &mut sink)
            .unwrap();
        assert!(rows.is_empty());
        assert!(sink.is_empty());
    }
}
