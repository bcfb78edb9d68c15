use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SimulationError;

fn default_restitution() -> f64 {
    1.0
}

fn default_output_rate() -> f64 {
    1.0
}

fn default_random_seed() -> u64 {
    100
}

fn default_run_name() -> String {
    "default".to_string()
}

fn default_output_dir() -> String {
    "runs".to_string()
}

/// Full parameter set for one run. Mirrored verbatim into `parameters.json`
/// next to the frames so a finished run is self-describing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub ndim: usize,
    pub num_balls: usize,
    pub ball_radius: f64,
    pub domain_size: Vec<f64>,
    pub simulation_time: f64,
    #[serde(default)]
    pub gravity: bool,
    #[serde(default = "default_restitution")]
    pub ball_restitution: f64,
    #[serde(default = "default_restitution")]
    pub wall_restitution: f64,
    #[serde(default = "default_output_rate")]
    pub output_rate: f64,
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,
    #[serde(default = "default_run_name")]
    pub run_name: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl SimulationConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SimulationError> {
        let file = File::open(path.as_ref()).map_err(|e| {
            SimulationError::Config(format!("cannot open {}: {e}", path.as_ref().display()))
        })?;
        let config: SimulationConfig = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| SimulationError::Config(format!("malformed config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.ndim != 2 && self.ndim != 3 {
            return Err(SimulationError::Config(format!(
                "ndim must be 2 or 3, got {}",
                self.ndim
            )));
        }
        if self.num_balls == 0 {
            return Err(SimulationError::Config("num_balls must be at least 1".into()));
        }
        if self.ball_radius <= 0.0 {
            return Err(SimulationError::Config("ball_radius must be positive".into()));
        }
        // Cell size is 1.0 and balls start centered in distinct cells, so
        // anything above 0.5 would overlap a neighbor at t=0.
        if self.ball_radius > 0.5 {
            return Err(SimulationError::Config(format!(
                "ball_radius {} exceeds the 0.5 maximum for unit cells",
                self.ball_radius
            )));
        }
        if self.domain_size.len() != self.ndim {
            return Err(SimulationError::Config(format!(
                "domain_size has {} entries for ndim={}",
                self.domain_size.len(),
                self.ndim
            )));
        }
        if self.domain_size.iter().any(|&s| s <= 0.0) {
            return Err(SimulationError::Config(
                "all domain_size entries must be positive".into(),
            ));
        }
        if self.simulation_time <= 0.0 {
            return Err(SimulationError::Config("simulation_time must be positive".into()));
        }
        if self.output_rate <= 0.0 {
            return Err(SimulationError::Config("output_rate must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.ball_restitution) {
            return Err(SimulationError::Config("ball_restitution must be in [0, 1]".into()));
        }
        if !(0.0..=1.0).contains(&self.wall_restitution) {
            return Err(SimulationError::Config("wall_restitution must be in [0, 1]".into()));
        }
        let capacity = self.placement_capacity();
        if self.num_balls > capacity {
            return Err(SimulationError::Placement {
                num_balls: self.num_balls,
                capacity,
            });
        }
        Ok(())
    }

    /// How many balls the row-major cell-centered placement can seat. Only
    /// whole cells count, so fractional domain extents are truncated here.
    pub fn placement_capacity(&self) -> usize {
        self.domain_size
            .iter()
            .map(|&s| s as usize)
            .product()
    }
}
