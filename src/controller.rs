use crate::boundary::{Boundary, BoundaryEvent};
use crate::config::{BoundaryConfig, Physics, SimConfig, StepLimits, Tolerances};
use crate::error::{Error, Result};
use crate::observer::{Silent, StepObserver, StepReport};
use crate::solvers::{Method, StepContext};
use crate::world::World;
use std::fmt;

/// Drives an integration scheme with step-doubling error control.
///
/// Each logical step compares one step of length `h` against two steps of
/// length `h/2` taken from the same accepted world. The step length is
/// doubled while the estimate is comfortably small and halved while it is too
/// large; the half-step result is then committed and the boundary policy
/// applied to it.
#[derive(Debug, Clone)]
pub struct AdaptiveController {
    method: Method,
    boundary: Boundary,
    radius: f64,
    initial_world: World,
    current_world: World,
    h: f64,
    h_max: f64,
    h_min: f64,
    max_implicit_iterations: usize,
    pub tolerances: Tolerances,
    physics: Physics,
    last_error: f64,
    last_threshold: f64,
    initial_energy: f64,
    elapsed_time: f64,
    accepted_steps: usize,
    last_events: Vec<BoundaryEvent>,
}

impl AdaptiveController {
    pub fn new(method: Method, boundary: Boundary, initial_world: World) -> Self {
        let config = SimConfig {
            method,
            boundary: BoundaryConfig {
                policy: boundary,
                ..Default::default()
            },
            ..Default::default()
        };
        Self::from_config(&config, initial_world)
    }

    pub fn from_config(config: &SimConfig, initial_world: World) -> Self {
        let StepLimits {
            initial,
            max,
            min,
            max_implicit_iterations,
        } = config.steps;
        let initial_energy = initial_world.total_energy(&config.physics);
        Self {
            method: config.method,
            boundary: config.boundary.policy,
            radius: config.boundary.radius,
            current_world: initial_world.clone(),
            initial_world,
            h: initial,
            h_max: max,
            h_min: min,
            max_implicit_iterations,
            tolerances: config.tolerances,
            physics: config.physics,
            last_error: 0.0,
            last_threshold: config.tolerances.absolute,
            initial_energy,
            elapsed_time: 0.0,
            accepted_steps: 0,
            last_events: Vec::new(),
        }
    }

    /// Replaces the physical constants and re-derives the reference energy.
    pub fn with_physics(mut self, physics: Physics) -> Self {
        self.physics = physics;
        self.initial_energy = self.initial_world.total_energy(&physics);
        self
    }

    pub fn set_relative_tolerance(&mut self, e: f64) {
        self.tolerances.relative = e;
    }

    pub fn set_absolute_tolerance(&mut self, e: f64) {
        self.tolerances.absolute = e;
    }

    pub fn set_radius(&mut self, r: f64) {
        self.radius = r;
    }

    pub fn set_boundary(&mut self, boundary: Boundary) {
        self.boundary = boundary;
    }

    pub fn set_initial_energy(&mut self, energy: f64) {
        self.initial_energy = energy;
    }

    pub fn set_step_length(&mut self, h: f64) {
        self.h = h;
    }

    pub fn set_max_step(&mut self, h_max: f64) {
        self.h_max = h_max;
    }

    pub fn set_min_step(&mut self, h_min: f64) {
        self.h_min = h_min;
    }

    pub fn change_method(&mut self, method: Method) {
        self.method = method;
    }

    /// Switches scheme by name, rejecting anything outside the six methods.
    pub fn change_method_by_name(&mut self, name: &str) -> Result<()> {
        self.method = name.parse()?;
        Ok(())
    }

    /// Restores the initial world. Step length and tolerances are kept.
    pub fn reset(&mut self) {
        self.current_world = self.initial_world.clone();
        self.elapsed_time = 0.0;
        self.accepted_steps = 0;
        self.last_events.clear();
    }

    pub fn step(&mut self) -> Result<()> {
        self.step_with(&mut Silent)
    }

    /// Advances one adaptively sized step.
    ///
    /// On error the accepted world, step length and counters are unchanged.
    pub fn step_with(&mut self, observer: &mut dyn StepObserver) -> Result<()> {
        observer.before_step(self.accepted_steps + 1);

        let e = self.tolerances.threshold(self.current_world.bounding_radius());
        let mut h = self.h;
        let (mut candidate, mut d) = self.trial(h, e)?;

        while d < e / 10.0 && h < self.h_max {
            h = (h * 2.0).min(self.h_max);
            (candidate, d) = self.trial(h, e)?;
        }
        while d >= e {
            h /= 2.0;
            if h < self.h_min {
                return Err(Error::StepSizeUnderflow {
                    h,
                    h_min: self.h_min,
                });
            }
            (candidate, d) = self.trial(h, e)?;
        }

        if !d.is_finite() || !candidate.is_finite() {
            return Err(Error::NonFiniteState {
                time: self.elapsed_time + h,
            });
        }

        self.last_events = self.boundary.apply(&mut candidate, self.radius);
        self.current_world = candidate;
        self.h = h;
        self.last_error = d;
        self.last_threshold = e;
        self.elapsed_time += h;
        self.accepted_steps += 1;

        observer.after_step(&StepReport {
            step: self.accepted_steps,
            time: self.elapsed_time,
            step_length: h,
            error: d,
            threshold: e,
            world: &self.current_world,
            physics: &self.physics,
            events: &self.last_events,
        });
        Ok(())
    }

    pub fn solve(&mut self, steps: usize) -> Result<usize> {
        self.solve_with(steps, &mut Silent)
    }

    /// Runs up to `steps` logical steps, stopping early once every body is
    /// gone. Returns the number of steps taken.
    pub fn solve_with(&mut self, steps: usize, observer: &mut dyn StepObserver) -> Result<usize> {
        for taken in 0..steps {
            if self.current_world.is_empty() {
                return Ok(taken);
            }
            self.step_with(observer)?;
        }
        Ok(steps)
    }

    /// One full step and two half steps from the accepted world; returns the
    /// half-step result and the scaled discrepancy between the two.
    fn trial(&self, h: f64, e: f64) -> Result<(World, f64)> {
        let ctx = StepContext::new(&self.physics, e, self.max_implicit_iterations);
        let full = self.method.advance(&self.current_world, h, &ctx)?;
        let half = self.method.advance(&self.current_world, h / 2.0, &ctx)?;
        let twice_half = self.method.advance(&half, h / 2.0, &ctx)?;
        let d = self.method.error_coefficient() * World::delta_pos(&full, &twice_half)?;
        Ok((twice_half, d))
    }

    pub fn world(&self) -> World {
        self.current_world.clone()
    }

    pub fn current_world(&self) -> &World {
        &self.current_world
    }

    pub fn initial_world(&self) -> &World {
        &self.initial_world
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn boundary(&self) -> Boundary {
        self.boundary
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn physics(&self) -> &Physics {
        &self.physics
    }

    pub fn step_length(&self) -> f64 {
        self.h
    }

    pub fn max_step(&self) -> f64 {
        self.h_max
    }

    pub fn last_error(&self) -> f64 {
        self.last_error
    }

    /// Acceptance threshold used by the most recent step.
    pub fn last_threshold(&self) -> f64 {
        self.last_threshold
    }

    pub fn last_events(&self) -> &[BoundaryEvent] {
        &self.last_events
    }

    pub fn elapsed_time(&self) -> f64 {
        self.elapsed_time
    }

    pub fn accepted_steps(&self) -> usize {
        self.accepted_steps
    }

    pub fn total_energy(&self) -> f64 {
        self.current_world.total_energy(&self.physics)
    }

    pub fn initial_energy(&self) -> f64 {
        self.initial_energy
    }

    pub fn energy_drift(&self) -> f64 {
        self.total_energy() - self.initial_energy
    }
}

impl fmt::Display for AdaptiveController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "method={}, step length(h)={}, err={}, threshold={}, t={}",
            self.method, self.h, self.last_error, self.last_threshold, self.elapsed_time
        )
    }
}
