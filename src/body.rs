// src/body.rs

use crate::vector::Vec3;
use std::fmt;

pub type BodyId = u32;

/// One simulated mass orbiting the central body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub id: BodyId,
    pub position: Vec3,
    pub velocity: Vec3,
    pub mass: f64,
    /// Cleared while the body sits outside the box boundary.
    pub in_bound: bool,
}

impl Body {
    pub fn new(id: BodyId, position: Vec3, velocity: Vec3, mass: f64) -> Self {
        Body {
            id,
            position,
            velocity,
            mass,
            in_bound: true,
        }
    }

    /// Raw distance from the origin, no floor applied.
    pub fn distance(&self) -> f64 {
        self.position.norm()
    }

    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass * self.velocity.norm_squared()
    }

    pub fn is_finite(&self) -> bool {
        self.position.iter().chain(self.velocity.iter()).all(|c| c.is_finite())
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ID: {}, pos=({}, {}, {}), vel=({}, {}, {})",
            self.id,
            self.position.x,
            self.position.y,
            self.position.z,
            self.velocity.x,
            self.velocity.y,
            self.velocity.z
        )
    }
}
