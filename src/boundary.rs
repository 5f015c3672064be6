// src/boundary.rs

use crate::body::BodyId;
use crate::error::Error;
use crate::world::World;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What happens to bodies that leave the sphere of the configured radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Boundary {
    /// Bodies may wander off freely.
    None,
    /// Bodies beyond the radius are removed for good.
    #[default]
    Kill,
    /// Elastic wall: one radial bounce per excursion.
    Box,
}

/// Per-body transition produced while applying a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryEvent {
    Removed(BodyId),
    /// Crossed outward and had its radial velocity reversed
    Reflected(BodyId),
    /// Crossed outward while already heading back in
    Escaped(BodyId),
    Returned(BodyId),
}

impl Boundary {
    pub fn name(&self) -> &'static str {
        match self {
            Boundary::None => "none",
            Boundary::Kill => "kill",
            Boundary::Box => "box",
        }
    }

    /// Applies the policy to `world` in place and reports what changed.
    pub fn apply(&self, world: &mut World, radius: f64) -> Vec<BoundaryEvent> {
        match self {
            Boundary::None => Vec::new(),
            Boundary::Kill => kill(world, radius),
            Boundary::Box => reflect(world, radius),
        }
    }
}

fn kill(world: &mut World, radius: f64) -> Vec<BoundaryEvent> {
    let mut events = Vec::new();
    world.retain(|body| {
        let inside = body.distance() <= radius;
        if !inside {
            events.push(BoundaryEvent::Removed(body.id));
        }
        inside
    });
    events
}

fn reflect(world: &mut World, radius: f64) -> Vec<BoundaryEvent> {
    let mut events = Vec::new();
    for body in world.bodies_mut() {
        let r = body.distance();
        match (body.in_bound, r > radius) {
            (true, true) => {
                body.in_bound = false;
                let n = body.position / r;
                let radial = body.velocity.dot(&n);
                if radial > 0.0 {
                    body.velocity -= 2.0 * radial * n;
                    events.push(BoundaryEvent::Reflected(body.id));
                } else {
                    events.push(BoundaryEvent::Escaped(body.id));
                }
            }
            (false, false) => {
                body.in_bound = true;
                events.push(BoundaryEvent::Returned(body.id));
            }
            _ => {}
        }
    }
    events
}

impl FromStr for Boundary {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Boundary::None),
            "kill" => Ok(Boundary::Kill),
            "box" => Ok(Boundary::Box),
            _ => Err(Error::UnknownBoundary(s.to_string())),
        }
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
