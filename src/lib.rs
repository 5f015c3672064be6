//! Adaptive step-size integration of point masses orbiting a central body.
//!
//! A [`World`] holds the central mass and the orbiting [`Body`] values. An
//! [`AdaptiveController`] advances it with one of six [`Method`]s, sizing each
//! step by comparing one full step against two half steps, and applies a
//! [`Boundary`] policy to every accepted state.

pub mod body;
pub mod boundary;
pub mod config;
pub mod controller;
pub mod error;
pub mod experiment;
pub mod observer;
pub mod orbit_generator;
pub mod solvers;
pub mod vector;
pub mod world;

pub use body::{Body, BodyId};
pub use boundary::{Boundary, BoundaryEvent};
pub use config::{Physics, SimConfig, StepLimits, Tolerances};
pub use controller::AdaptiveController;
pub use error::{Error, Result};
pub use observer::{EnergyMonitor, StepObserver, StepReport};
pub use solvers::{Integrator, Method};
pub use vector::{Vec3, VectorExt};
pub use world::World;
