use crate::body::BodyId;
use crate::controller::AdaptiveController;
use crate::error::Result;
use crate::observer::{EnergyMonitor, StepObserver, StepReport};
use crate::vector::Vec3;
use chrono::Utc;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// One body at one accepted step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryPoint {
    pub step: usize,
    pub time: f64,
    pub id: BodyId,
    pub mass: f64,
    pub position: Vec3,
    pub velocity: Vec3,
}

/// Observer keeping every accepted state, optionally thinned to every
/// `every`-th step.
#[derive(Debug, Clone)]
pub struct TrajectoryRecorder {
    every: usize,
    pub points: Vec<TrajectoryPoint>,
    pub step_lengths: Vec<f64>,
}

impl TrajectoryRecorder {
    pub fn new() -> Self {
        Self::every(1)
    }

    pub fn every(every: usize) -> Self {
        Self {
            every: every.max(1),
            points: Vec::new(),
            step_lengths: Vec::new(),
        }
    }

    /// Recorded positions of one body, in step order.
    pub fn positions_of(&self, id: BodyId) -> Vec<Vec3> {
        self.points
            .iter()
            .filter(|p| p.id == id)
            .map(|p| p.position)
            .collect()
    }
}

impl Default for TrajectoryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl StepObserver for TrajectoryRecorder {
    fn after_step(&mut self, report: &StepReport<'_>) {
        self.step_lengths.push(report.step_length);
        if report.step % self.every != 0 {
            return;
        }
        for body in report.world.bodies() {
            self.points.push(TrajectoryPoint {
                step: report.step,
                time: report.time,
                id: body.id,
                mass: body.mass,
                position: body.position,
                velocity: body.velocity,
            });
        }
    }
}

/// Writes the recorded trajectory as CSV.
pub fn write_positions<W: Write>(writer: W, recorder: &TrajectoryRecorder) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([
        "step", "time", "body_id", "mass", "x", "y", "z", "vx", "vy", "vz",
    ])?;
    for p in &recorder.points {
        wtr.write_record(&[
            p.step.to_string(),
            p.time.to_string(),
            p.id.to_string(),
            p.mass.to_string(),
            p.position.x.to_string(),
            p.position.y.to_string(),
            p.position.z.to_string(),
            p.velocity.x.to_string(),
            p.velocity.y.to_string(),
            p.velocity.z.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn export_positions<P: AsRef<Path>>(path: P, recorder: &TrajectoryRecorder) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_positions(file, recorder)
}

/// One line of the run log.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub date: String,
    pub method: String,
    pub boundary: String,
    pub initial_bodies: usize,
    pub remaining_bodies: usize,
    pub n_steps: usize,
    pub simulated_time: f64,
    pub final_step_length: f64,
    pub last_error: f64,
    pub initial_energy: f64,
    pub final_energy: f64,
    pub max_energy_drift: f64,
    pub energy_thresholds: String,
    pub execution_duration: f64,
    pub notes: String,
}

impl RunSummary {
    pub fn from_run(
        controller: &AdaptiveController,
        monitor: &EnergyMonitor,
        execution_duration: f64,
        notes: &str,
    ) -> Result<Self> {
        Ok(RunSummary {
            date: Utc::now().to_rfc3339(),
            method: controller.method().to_string(),
            boundary: controller.boundary().to_string(),
            initial_bodies: controller.initial_world().len(),
            remaining_bodies: controller.current_world().len(),
            n_steps: controller.accepted_steps(),
            simulated_time: controller.elapsed_time(),
            final_step_length: controller.step_length(),
            last_error: controller.last_error(),
            initial_energy: controller.initial_energy(),
            final_energy: controller.total_energy(),
            max_energy_drift: monitor.max_drift(),
            energy_thresholds: serde_json::to_string(&monitor.exceeded())?,
            execution_duration,
            notes: notes.to_string(),
        })
    }
}

/// Appends `summary` to a CSV log, writing the header only for a new file.
pub fn append_run_summary<P: AsRef<Path>>(path: P, summary: &RunSummary) -> Result<()> {
    let file_exists = path.as_ref().exists();
    let file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;

    let mut wtr = csv::WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    wtr.serialize(summary)?;
    wtr.flush()?;
    Ok(())
}
