//! Run configuration.
//!
//! Every physical constant and numerical knob lives here and is threaded
//! explicitly into the engine, so two simulations with different constants can
//! share a process. A config file is JSON; every field is optional:
//!
//! ```json
//! {
//!   "method": "explicit-rk4",
//!   "physics": { "gravitational_constant": 1.0 },
//!   "tolerances": { "relative": 0.0, "absolute": 1e-6 },
//!   "steps": { "initial": 1e-4, "max": 0.05 },
//!   "boundary": { "policy": "box", "radius": 50.0 }
//! }
//! ```

use crate::boundary::Boundary;
use crate::error::Result;
use crate::solvers::Method;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Physical constants used by force and energy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Physics {
    pub gravitational_constant: f64,
    /// Minimum separation used in force and potential terms
    pub softening_floor: f64,
    /// Mass given to bodies created without one
    pub default_mass: f64,
}

impl Default for Physics {
    fn default() -> Self {
        Self {
            gravitational_constant: 6674.0,
            softening_floor: crate::vector::SAFE_NORM_FLOOR,
            default_mass: 1.0,
        }
    }
}

impl Physics {
    /// Unit gravitational constant, handy for scaled problems.
    pub fn scaled() -> Self {
        Self {
            gravitational_constant: 1.0,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    pub relative: f64,
    pub absolute: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            relative: 1e-8,
            absolute: 1e-4,
        }
    }
}

impl Tolerances {
    pub fn new(relative: f64, absolute: f64) -> Self {
        Self { relative, absolute }
    }

    /// Acceptance threshold for a world whose farthest body sits at `radius`.
    pub fn threshold(&self, radius: f64) -> f64 {
        self.relative * radius + self.absolute
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepLimits {
    pub initial: f64,
    pub max: f64,
    pub min: f64,
    pub max_implicit_iterations: usize,
}

impl Default for StepLimits {
    fn default() -> Self {
        Self {
            initial: 1e-5,
            max: 0.2,
            min: 1e-15,
            max_implicit_iterations: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryConfig {
    pub policy: Boundary,
    pub radius: f64,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            policy: Boundary::Kill,
            radius: 4000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub method: Method,
    pub physics: Physics,
    pub tolerances: Tolerances,
    pub steps: StepLimits,
    pub boundary: BoundaryConfig,
}

impl SimConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = SimConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SimConfig::default());
        assert_eq!(config.method, Method::ExplicitEuler);
        assert_eq!(config.boundary.policy, Boundary::Kill);
        assert_eq!(config.physics.gravitational_constant, 6674.0);
    }

    #[test]
    fn partial_sections_override_only_named_fields() {
        let config = SimConfig::from_json_str(
            r#"{
                "method": "velocity-verlet",
                "tolerances": { "absolute": 1e-6 },
                "boundary": { "policy": "box" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.method, Method::VelocityVerlet);
        assert_eq!(config.tolerances.absolute, 1e-6);
        assert_eq!(config.tolerances.relative, 1e-8);
        assert_eq!(config.boundary.policy, Boundary::Box);
        assert_eq!(config.boundary.radius, 4000.0);
    }

    #[test]
    fn unknown_method_name_is_rejected() {
        assert!(SimConfig::from_json_str(r#"{ "method": "rk45" }"#).is_err());
    }

    #[test]
    fn threshold_combines_relative_and_absolute() {
        let tol = Tolerances::new(0.5, 1.0);
        assert_eq!(tol.threshold(4.0), 3.0);
    }
}
