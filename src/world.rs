// src/world.rs

use crate::body::{Body, BodyId};
use crate::config::Physics;
use crate::error::{Error, Result};
use crate::vector::{Vec3, VectorExt};
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Time derivative of a single body's state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDeriv {
    pub dpos: Vec3, // velocity
    pub dvel: Vec3, // acceleration
}

/// Derivative of a whole world, keyed like the world it came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Deriv {
    pub bodies: BTreeMap<BodyId, BodyDeriv>,
}

/// The central mass plus every orbiting body at one instant.
///
/// A `World` is a plain value: cloning yields an independent snapshot, which is
/// what every trial step of the controller works on.
#[derive(Debug, Clone, PartialEq)]
pub struct World {
    pub central_mass: f64,
    bodies: BTreeMap<BodyId, Body>,
    retired: BTreeSet<BodyId>,
    next_id: BodyId,
}

/// Ids are handed out in increasing order, so the largest id has no use.
fn successor(id: BodyId) -> Result<BodyId> {
    id.checked_add(1).ok_or_else(|| Error::InvalidBody {
        id,
        reason: "id space exhausted".to_string(),
    })
}

impl World {
    pub fn new(central_mass: f64) -> Self {
        World {
            central_mass,
            bodies: BTreeMap::new(),
            retired: BTreeSet::new(),
            next_id: 1,
        }
    }

    /// Builds a world keeping each body's id. Ids must be unique.
    pub fn from_bodies<I>(central_mass: f64, bodies: I) -> Result<Self>
    where
        I: IntoIterator<Item = Body>,
    {
        let mut world = World::new(central_mass);
        for body in bodies {
            world.insert_body(body)?;
        }
        Ok(world)
    }

    /// Adds a body under the next free id and returns that id.
    pub fn add_body(&mut self, position: Vec3, velocity: Vec3, mass: f64) -> Result<BodyId> {
        let id = self.next_id;
        let next_id = successor(id)?;
        self.insert_body(Body::new(id, position, velocity, mass))?;
        self.next_id = next_id;
        Ok(id)
    }

    pub fn insert_body(&mut self, body: Body) -> Result<()> {
        if !(body.mass > 0.0) {
            return Err(Error::InvalidBody {
                id: body.id,
                reason: format!("mass must be positive, got {}", body.mass),
            });
        }
        if self.bodies.contains_key(&body.id) || self.retired.contains(&body.id) {
            return Err(Error::DuplicateBody(body.id));
        }
        self.next_id = self.next_id.max(successor(body.id)?);
        self.bodies.insert(body.id, body);
        Ok(())
    }

    /// Removes a body; its id stays retired for the lifetime of this world.
    pub fn remove_body(&mut self, id: BodyId) -> Option<Body> {
        let removed = self.bodies.remove(&id);
        if removed.is_some() {
            self.retired.insert(id);
        }
        removed
    }

    /// Keeps only the bodies for which `keep` returns true, retiring the rest.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&mut Body) -> bool,
    {
        let retired = &mut self.retired;
        self.bodies.retain(|id, body| {
            let kept = keep(body);
            if !kept {
                retired.insert(*id);
            }
            kept
        });
    }

    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.get(&id)
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.bodies.get_mut(&id)
    }

    pub fn bodies(&self) -> impl Iterator<Item = &Body> {
        self.bodies.values()
    }

    pub fn bodies_mut(&mut self) -> impl Iterator<Item = &mut Body> {
        self.bodies.values_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = BodyId> + '_ {
        self.bodies.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Largest raw distance of any body from the origin, 0 for an empty world.
    pub fn bounding_radius(&self) -> f64 {
        self.bodies().map(Body::distance).fold(0.0, f64::max)
    }

    pub fn is_finite(&self) -> bool {
        self.bodies().all(Body::is_finite)
    }

    /// Acceleration of every body ("velocity derivative").
    ///
    /// Recomputed from scratch on each call: central attraction plus the pull
    /// of every other body, with separations floored by the softening floor.
    pub fn accelerations(&self, physics: &Physics) -> BTreeMap<BodyId, Vec3> {
        let g = physics.gravitational_constant;
        let floor = physics.softening_floor;

        self.bodies
            .iter()
            .map(|(&id, body)| {
                let r = body.position.safe_norm_with(floor);
                let central = -g * self.central_mass / r.powi(3) * body.position;

                let pairwise: Vec3 = self
                    .bodies
                    .values()
                    .filter(|other| other.id != id)
                    .map(|other| {
                        let r_vec = body.position - other.position;
                        let r = r_vec.safe_norm_with(floor);
                        -g * other.mass / r.powi(3) * r_vec
                    })
                    .sum();

                (id, central + pairwise)
            })
            .collect()
    }

    /// Velocity of every body ("position derivative").
    pub fn velocities(&self) -> BTreeMap<BodyId, Vec3> {
        self.bodies.iter().map(|(&id, b)| (id, b.velocity)).collect()
    }

    pub fn derivatives(&self, physics: &Physics) -> Deriv {
        let accelerations = self.accelerations(physics);
        let bodies = self
            .bodies
            .iter()
            .map(|(&id, body)| {
                let dvel = accelerations.get(&id).copied().unwrap_or_else(Vec3::zeros);
                (id, BodyDeriv { dpos: body.velocity, dvel })
            })
            .collect();
        Deriv { bodies }
    }

    /// A copy of this world advanced along `deriv` by `h`.
    pub fn apply(&self, deriv: &Deriv, h: f64) -> World {
        let mut next = self.clone();
        next.apply_in_place(deriv, h);
        next
    }

    pub fn apply_in_place(&mut self, deriv: &Deriv, h: f64) {
        for (id, body) in self.bodies.iter_mut() {
            if let Some(d) = deriv.bodies.get(id) {
                body.position += h * d.dpos;
                body.velocity += h * d.dvel;
            }
        }
    }

    pub fn kinetic_energy(&self) -> f64 {
        self.bodies().map(Body::kinetic_energy).sum()
    }

    /// Central plus pairwise potential, each unordered pair counted once.
    pub fn potential_energy(&self, physics: &Physics) -> f64 {
        let g = physics.gravitational_constant;
        let floor = physics.softening_floor;

        let central: f64 = self
            .bodies()
            .map(|b| -g * self.central_mass * b.mass / b.position.safe_norm_with(floor))
            .sum();
        let pairwise: f64 = self
            .bodies
            .values()
            .tuple_combinations()
            .map(|(a, b)| -g * a.mass * b.mass / (a.position - b.position).safe_norm_with(floor))
            .sum();
        central + pairwise
    }

    pub fn total_energy(&self, physics: &Physics) -> f64 {
        self.kinetic_energy() + self.potential_energy(physics)
    }

    /// Euclidean norm of the position differences between two snapshots of
    /// the same set of bodies.
    pub fn delta_pos(w1: &World, w2: &World) -> Result<f64> {
        if w1.len() != w2.len() {
            return Err(Error::BodyCountMismatch {
                left: w1.len(),
                right: w2.len(),
            });
        }
        let mut sum_sq_diff = 0.0;
        for (id, b2) in &w2.bodies {
            let b1 = w1.bodies.get(id).ok_or(Error::MissingBody(*id))?;
            sum_sq_diff += (b1.position - b2.position).norm_squared();
        }
        Ok(sum_sq_diff.sqrt())
    }
}

impl fmt::Display for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SunMass={}, Num={}", self.central_mass, self.len())?;
        for body in self.bodies() {
            writeln!(f, "{}", body)?;
        }
        write!(f, "----------")
    }
}
