//! Hooks invoked around every accepted step.
//!
//! The numerical core never times or prints anything itself; progress bars,
//! wall-clock timing and energy bookkeeping all hang off [`StepObserver`].

use crate::boundary::BoundaryEvent;
use crate::config::Physics;
use crate::world::World;
use indicatif::{ProgressBar, ProgressStyle};
use ordered_float::OrderedFloat;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Snapshot of one accepted step handed to observers.
#[derive(Debug, Clone, Copy)]
pub struct StepReport<'a> {
    /// Number of accepted steps so far, this one included
    pub step: usize,
    pub time: f64,
    pub step_length: f64,
    pub error: f64,
    pub threshold: f64,
    pub world: &'a World,
    pub physics: &'a Physics,
    pub events: &'a [BoundaryEvent],
}

pub trait StepObserver {
    fn before_step(&mut self, _step: usize) {}
    fn after_step(&mut self, report: &StepReport<'_>);
}

impl<A: StepObserver, B: StepObserver> StepObserver for (A, B) {
    fn before_step(&mut self, step: usize) {
        self.0.before_step(step);
        self.1.before_step(step);
    }

    fn after_step(&mut self, report: &StepReport<'_>) {
        self.0.after_step(report);
        self.1.after_step(report);
    }
}

impl<O: StepObserver + ?Sized> StepObserver for &mut O {
    fn before_step(&mut self, step: usize) {
        (**self).before_step(step);
    }

    fn after_step(&mut self, report: &StepReport<'_>) {
        (**self).after_step(report);
    }
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl StepObserver for Silent {
    fn after_step(&mut self, _report: &StepReport<'_>) {}
}

/// Progress bar over a fixed number of steps.
pub struct ProgressObserver {
    pb: ProgressBar,
}

impl ProgressObserver {
    pub fn new(num_steps: u64, label: &str) -> Self {
        let pb = ProgressBar::new(num_steps);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(format!("Solving with {}", label));
        Self { pb }
    }

    pub fn hidden() -> Self {
        Self {
            pb: ProgressBar::hidden(),
        }
    }

    pub fn finish(&self) {
        self.pb.finish_with_message("Simulation complete");
    }
}

impl StepObserver for ProgressObserver {
    fn after_step(&mut self, report: &StepReport<'_>) {
        for event in report.events {
            if let BoundaryEvent::Removed(id) = event {
                self.pb.println(format!("Planet {} is dead!", id));
            }
        }
        if report.step % 100 == 0 {
            self.pb.set_message(format!("h={:.3e} err={:.3e}", report.step_length, report.error));
        }
        self.pb.inc(1);
    }
}

/// Wall-clock time spent in each accepted step.
#[derive(Debug, Default)]
pub struct TimingObserver {
    started: Option<Instant>,
    pub durations: Vec<Duration>,
}

impl TimingObserver {
    pub fn total(&self) -> Duration {
        self.durations.iter().sum()
    }
}

impl StepObserver for TimingObserver {
    fn before_step(&mut self, _step: usize) {
        self.started = Some(Instant::now());
    }

    fn after_step(&mut self, _report: &StepReport<'_>) {
        if let Some(start) = self.started.take() {
            self.durations.push(start.elapsed());
        }
    }
}

/// Tracks total energy per step and the simulated time at which the relative
/// drift first exceeded each threshold.
#[derive(Debug, Clone)]
pub struct EnergyMonitor {
    initial_energy: f64,
    pub total_energy: Vec<f64>,
    pub energy_thresholds: Vec<f64>,
    pub time_energy_exceeded: HashMap<OrderedFloat<f64>, Option<f64>>,
}

impl EnergyMonitor {
    pub fn new(initial_energy: f64) -> Self {
        Self::with_thresholds(
            initial_energy,
            vec![0.01, 0.05, 0.1, 0.2, 0.3, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 4.0, 5.0, 10.0],
        )
    }

    pub fn with_thresholds(initial_energy: f64, energy_thresholds: Vec<f64>) -> Self {
        let time_energy_exceeded = energy_thresholds
            .iter()
            .map(|&t| (OrderedFloat(t), None))
            .collect();
        Self {
            initial_energy,
            total_energy: Vec::new(),
            energy_thresholds,
            time_energy_exceeded,
        }
    }

    pub fn initial_energy(&self) -> f64 {
        self.initial_energy
    }

    /// Largest absolute drift seen so far.
    pub fn max_drift(&self) -> f64 {
        self.total_energy
            .iter()
            .map(|e| (e - self.initial_energy).abs())
            .fold(0.0, f64::max)
    }

    /// Thresholds with the time they were first crossed, sorted by threshold.
    pub fn exceeded(&self) -> Vec<(f64, Option<f64>)> {
        let mut out: Vec<(f64, Option<f64>)> = self
            .time_energy_exceeded
            .iter()
            .map(|(k, v)| (k.into_inner(), *v))
            .collect();
        out.sort_by(|a, b| a.0.total_cmp(&b.0));
        out
    }

    fn record(&mut self, energy: f64, time: f64) {
        self.total_energy.push(energy);
        let scale = self.initial_energy.abs();
        for &t in &self.energy_thresholds {
            if let Some(val) = self.time_energy_exceeded.get_mut(&OrderedFloat(t)) {
                if val.is_none() && (energy - self.initial_energy).abs() > scale * t {
                    *val = Some(time);
                }
            }
        }
    }
}

impl StepObserver for EnergyMonitor {
    fn after_step(&mut self, report: &StepReport<'_>) {
        self.record(report.world.total_energy(report.physics), report.time);
    }
}
