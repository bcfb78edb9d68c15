use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use nalgebra::SVector;

use crate::config::SimulationConfig;
use crate::error::SimulationError;

/// Writes numbered snapshot frames plus a `parameters.json` mirror of the
/// configuration into `<output_dir>/<run_name>`.
pub struct OutputWriter {
    run_dir: PathBuf,
    frame_count: usize,
}

impl OutputWriter {
    pub fn create(output_dir: &str, run_name: &str) -> Result<Self, SimulationError> {
        let run_dir = Path::new(output_dir).join(run_name);
        fs::create_dir_all(&run_dir)?;
        Ok(OutputWriter {
            run_dir,
            frame_count: 0,
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn frames_written(&self) -> usize {
        self.frame_count
    }

    pub fn write_parameters(&self, config: &SimulationConfig) -> Result<(), SimulationError> {
        let file = File::create(self.run_dir.join("parameters.json"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), config)
            .map_err(|e| SimulationError::Config(format!("cannot serialize parameters: {e}")))?;
        Ok(())
    }

    /// One `frame_NNNNNN.txt` per call, indices monotone from zero:
    ///
    /// ```text
    /// # Time: <t>
    /// # Balls: <n>
    /// <id> <x> <y> [<z>] <vx> <vy> [<vz>]
    /// ```
    pub fn write_frame<const D: usize>(
        &mut self,
        time: f64,
        states: &[(SVector<f64, D>, SVector<f64, D>)],
    ) -> Result<(), SimulationError> {
        let path = self
            .run_dir
            .join(format!("frame_{:06}.txt", self.frame_count));
        let mut file = BufWriter::new(File::create(path)?);

        writeln!(file, "# Time: {}", time)?;
        writeln!(file, "# Balls: {}", states.len())?;
        for (index, (position, velocity)) in states.iter().enumerate() {
            write!(file, "{}", index)?;
            for axis in 0..D {
                write!(file, " {}", position[axis])?;
            }
            for axis in 0..D {
                write!(file, " {}", velocity[axis])?;
            }
            writeln!(file)?;
        }
        file.flush()?;

        self.frame_count += 1;
        Ok(())
    }
}
