//! Initial conditions
//!
//! A [`BodySource`] is anything that can hand over a starting
//! [`SimulationState`]. The stock source is [`SolarSystem`]: the Sun and the
//! eight planets laid out on the x axis with circular-orbit speeds on y,
//! followed by a configurable number of random bodies.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution as _, Normal, Uniform};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SimError, SimResult};
use crate::state::{Bounds, SimulationState};
use crate::vector::Vector3;

/// Produces the initial positions, velocities and masses of a run
pub trait BodySource {
    /// Short human-readable name, used in logs
    fn name(&self) -> &str;

    /// Build a fresh state
    fn build(&self) -> SimResult<SimulationState>;
}

/// How random body positions are drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Distribution {
    /// N(0, 1e11) per axis
    #[default]
    Normal,
    /// U(-p_max, p_max) per axis
    Uniform,
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distribution::Normal => write!(f, "normal"),
            Distribution::Uniform => write!(f, "uniform"),
        }
    }
}

impl FromStr for Distribution {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(Distribution::Normal),
            "uniform" => Ok(Distribution::Uniform),
            other => Err(SimError::UnknownDistribution(other.to_string())),
        }
    }
}

/// Standard deviation of normally distributed positions, in meters
pub const NORMAL_POSITION_SIGMA: f64 = 1e11;

/// Mass of the Sun in kilograms
pub const SUN_MASS: f64 = 1.989e30;

/// Fixed bodies: (x position m, y velocity m/s, mass kg)
const PLANETS: [(f64, f64, f64); 9] = [
    (0.0, 0.0, SUN_MASS),
    (57.909e9, 47.36e3, 0.33011e24),
    (108.209e9, 35.02e3, 4.8675e24),
    (149.596e9, 29.78e3, 5.9724e24),
    (227.923e9, 24.07e3, 0.64171e24),
    (778.570e9, 13e3, 1898.19e24),
    (1433.529e9, 9.68e3, 568.34e24),
    (2872.463e9, 6.80e3, 86.813e24),
    (4495.060e9, 5.43e3, 102.413e24),
];

/// Number of bodies every [`SolarSystem`] starts with
pub const FIXED_BODIES: usize = PLANETS.len();

/// Ranges for the random bodies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomBodies {
    pub count: usize,
    pub distribution: Distribution,
    pub max_mass: f64,
    pub min_mass: f64,
    pub max_position: f64,
    pub max_velocity: f64,
    pub min_velocity: f64,
    /// Fixed seed for reproducible runs; drawn from the OS when absent
    pub seed: Option<u64>,
}

impl Default for RandomBodies {
    fn default() -> Self {
        Self {
            count: 0,
            distribution: Distribution::Normal,
            max_mass: 1e20,
            min_mass: 1e10,
            max_position: 5e12,
            max_velocity: 5e3,
            min_velocity: 0.0,
            seed: None,
        }
    }
}

impl RandomBodies {
    fn validate(&self) -> SimResult<()> {
        // Bodies are stored as f32, so every bound must be a finite f32.
        for (name, value) in [
            ("max mass", self.max_mass),
            ("min mass", self.min_mass),
            ("max position", self.max_position),
            ("max velocity", self.max_velocity),
            ("min velocity", self.min_velocity),
        ] {
            if !value.is_finite() || value.abs() > f64::from(f32::MAX) {
                return Err(SimError::InvalidDataset(format!(
                    "{name} {value} is not a finite f32"
                )));
            }
        }
        if !(self.min_mass > 0.0 && self.min_mass <= self.max_mass) {
            return Err(SimError::InvalidDataset(format!(
                "mass range [{}, {}] must be positive and ordered",
                self.min_mass, self.max_mass
            )));
        }
        if self.max_position <= 0.0 {
            return Err(SimError::InvalidDataset(format!(
                "max position {} must be positive",
                self.max_position
            )));
        }
        if self.min_velocity > self.max_velocity {
            return Err(SimError::InvalidDataset(format!(
                "velocity range [{}, {}] is reversed",
                self.min_velocity, self.max_velocity
            )));
        }
        Ok(())
    }
}

/// The solar system plus `count` random bodies
#[derive(Debug, Clone, Default)]
pub struct SolarSystem {
    random: RandomBodies,
}

impl SolarSystem {
    pub fn new(random: RandomBodies) -> Self {
        Self { random }
    }

    /// Same ranges, different random body count
    pub fn with_count(mut self, count: usize) -> Self {
        self.random.count = count;
        self
    }

    pub fn random(&self) -> &RandomBodies {
        &self.random
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.random.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }
}

impl BodySource for SolarSystem {
    fn name(&self) -> &str {
        "solar-system"
    }

    fn build(&self) -> SimResult<SimulationState> {
        let r = &self.random;
        r.validate()?;

        let total = FIXED_BODIES + r.count;
        let mut positions = Vec::with_capacity(total);
        let mut velocities = Vec::with_capacity(total);
        let mut masses = Vec::with_capacity(total);

        for &(x, vy, m) in &PLANETS {
            positions.push(Vector3::new(x as f32, 0.0, 0.0));
            velocities.push(Vector3::new(0.0, vy as f32, 0.0));
            masses.push(m as f32);
        }

        let mut rng = self.rng();
        let normal = Normal::new(0.0, NORMAL_POSITION_SIGMA)
            .map_err(|e| SimError::InvalidDataset(e.to_string()))?;
        let uniform_pos = Uniform::new_inclusive(-r.max_position, r.max_position);
        let uniform_vel = Uniform::new_inclusive(r.min_velocity, r.max_velocity);
        let log_mass = Uniform::new_inclusive(r.min_mass.log10(), r.max_mass.log10());

        for _ in 0..r.count {
            let p = match r.distribution {
                Distribution::Normal => [
                    normal.sample(&mut rng),
                    normal.sample(&mut rng),
                    normal.sample(&mut rng),
                ],
                Distribution::Uniform => [
                    uniform_pos.sample(&mut rng),
                    uniform_pos.sample(&mut rng),
                    uniform_pos.sample(&mut rng),
                ],
            };
            positions.push(Vector3::new(p[0] as f32, p[1] as f32, p[2] as f32));
            velocities.push(Vector3::new(
                uniform_vel.sample(&mut rng) as f32,
                uniform_vel.sample(&mut rng) as f32,
                uniform_vel.sample(&mut rng) as f32,
            ));
            masses.push(10f64.powf(rng.sample(log_mass)) as f32);
        }

        debug!(
            bodies = total,
            distribution = %r.distribution,
            "built solar system dataset"
        );

        Ok(
            SimulationState::new(positions, velocities, masses)?.with_bounds(Bounds {
                max_mass: SUN_MASS.max(r.max_mass),
                min_mass: r.min_mass,
                max_position: r.max_position,
            }),
        )
    }
}
