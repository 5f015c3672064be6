// src/orbit_generator.rs

use crate::body::{Body, BodyId};
use crate::config::Physics;
use crate::error::{Error, Result};
use crate::vector::{Vec3, VectorExt};
use crate::world::World;
use rand::Rng;
use rand_distr::Uniform;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Read};

/// Parameters of the scattered random scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioParams {
    pub count: u32,
    pub central_mass: f64,
    pub body_mass: f64,
    /// Inclusive range of the integer coordinates
    pub min_coordinate: i64,
    pub max_coordinate: i64,
    /// Velocity components are drawn from the same range, then divided by this
    pub velocity_divisor: f64,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            count: 10,
            central_mass: 100.0,
            body_mass: 1.0,
            min_coordinate: 10,
            max_coordinate: 2000,
            velocity_divisor: 500.0,
        }
    }
}

/// Scatters `params.count` bodies with integer coordinates and velocities.
pub fn random_world<R: Rng + ?Sized>(params: &ScenarioParams, rng: &mut R) -> Result<World> {
    let range = Uniform::new_inclusive(params.min_coordinate, params.max_coordinate)
        .map_err(|e| Error::InvalidScenario(e.to_string()))?;
    let mut world = World::new(params.central_mass);
    for _ in 0..params.count {
        let position = Vec3::new(
            rng.sample(&range) as f64,
            rng.sample(&range) as f64,
            rng.sample(&range) as f64,
        );
        let velocity = Vec3::new(
            rng.sample(&range) as f64,
            rng.sample(&range) as f64,
            rng.sample(&range) as f64,
        ) / params.velocity_divisor;
        world.add_body(position, velocity, params.body_mass)?;
    }
    Ok(world)
}

/// Parameters of the bound-orbit scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitParams {
    pub count: u32,
    pub central_mass: f64,
    /// Positions are drawn from the cube `[-extent, extent]^3`
    pub extent: f64,
    /// Minimum distance to the origin and between any two bodies
    pub min_separation: f64,
    /// Eccentricities are drawn from `[0, max_eccentricity)`
    pub max_eccentricity: f64,
    pub placement_attempts: u32,
}

impl Default for OrbitParams {
    fn default() -> Self {
        Self {
            count: 10,
            central_mass: 100.0,
            extent: 2000.0,
            min_separation: 10.0,
            max_eccentricity: 0.5,
            placement_attempts: 200,
        }
    }
}

/// Velocity at periapsis of an orbit about the z-axis with eccentricity `e`.
///
/// Vis-viva at periapsis reduces to `v^2 = mu (1 + e) / r`. The direction is
/// prograde (`z x r`); a position on the z-axis is sent along +x.
pub fn periapsis_velocity(position: Vec3, mu: f64, eccentricity: f64) -> Vec3 {
    let r = position.norm();
    let speed = (mu * (1.0 + eccentricity) / r).sqrt();
    let direction = Vec3::z().cross(&position);
    if direction.is_zero() {
        return speed * Vec3::x();
    }
    speed * direction.normalize()
}

fn free_position<R: Rng + ?Sized>(
    world: &World,
    params: &OrbitParams,
    cube: &Uniform<f64>,
    rng: &mut R,
) -> Option<Vec3> {
    let spaced = |p: &Vec3| {
        p.norm() >= params.min_separation
            && world
                .bodies()
                .all(|b| b.position.metric_distance(p) >= params.min_separation)
    };
    (0..params.placement_attempts)
        .map(|_| Vec3::from_fn(|_, _| rng.sample(cube)))
        .find(spaced)
}

/// Places `params.count` bodies of random mass on bound orbits around the
/// central mass, starting each at periapsis.
pub fn random_orbits<R: Rng + ?Sized>(
    params: &OrbitParams,
    physics: &Physics,
    rng: &mut R,
) -> Result<World> {
    if !(0.0..1.0).contains(&params.max_eccentricity) {
        return Err(Error::InvalidScenario(format!(
            "max eccentricity {} does not give bound orbits",
            params.max_eccentricity
        )));
    }
    let cube = Uniform::new_inclusive(-params.extent, params.extent)
        .map_err(|e| Error::InvalidScenario(e.to_string()))?;
    let mu = physics.gravitational_constant * params.central_mass;

    let mut world = World::new(params.central_mass);
    for _ in 0..params.count {
        let position = free_position(&world, params, &cube, rng).ok_or_else(|| {
            Error::InvalidScenario(format!(
                "no room for body {} at separation {}",
                world.len() + 1,
                params.min_separation
            ))
        })?;
        let eccentricity = rng.random::<f64>() * params.max_eccentricity;
        let velocity = periapsis_velocity(position, mu, eccentricity);
        let mass = rng.random_range(0.1..1.0) * physics.default_mass;
        world.add_body(position, velocity, mass)?;
    }
    Ok(world)
}

/// One row of an orbital catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrbitalRecord {
    pub id: BodyId,
    pub name: String,
    pub mass: f64,
    pub distance: f64,
    pub eccentricity: f64,
    /// Tilt of the initial velocity out of the xy-plane, radians
    pub inclination: f64,
    pub period: f64,
}

impl OrbitalRecord {
    /// Initial body at `(d, 0, 0)` with the two-body starting velocity.
    pub fn to_body(&self, physics: &Physics, central_mass: f64) -> Result<Body> {
        if !(self.mass > 0.0) || !(self.distance > 0.0) {
            return Err(Error::InvalidBody {
                id: self.id,
                reason: format!(
                    "{} needs positive mass and distance (got {}, {})",
                    self.name, self.mass, self.distance
                ),
            });
        }
        let gm = physics.gravitational_constant * central_mass;
        let d = self.distance;
        let e = self.eccentricity;

        let vx = if e > physics.softening_floor {
            (gm / (d * (1.0 + 1.0 / (e * e)))).sqrt()
        } else {
            0.0
        };
        let vy = (gm / (d * (1.0 + e * e))).sqrt();
        let (sin_i, cos_i) = self.inclination.sin_cos();

        Ok(Body::new(
            self.id,
            Vec3::new(d, 0.0, 0.0),
            Vec3::new(vx, vy * cos_i, vy * sin_i),
            self.mass,
        ))
    }
}

/// Reads a headed CSV of orbital records.
pub fn read_orbital_records<R: Read>(reader: R) -> Result<Vec<OrbitalRecord>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut records = Vec::new();
    for record in rdr.deserialize::<OrbitalRecord>() {
        records.push(record?);
    }
    Ok(records)
}

pub fn world_from_records(
    records: &[OrbitalRecord],
    physics: &Physics,
    central_mass: f64,
) -> Result<World> {
    let bodies = records
        .iter()
        .map(|r| r.to_body(physics, central_mass))
        .collect::<Result<Vec<_>>>()?;
    World::from_bodies(central_mass, bodies)
}

/// Parses whitespace separated `x y z vx vy vz mass` groups; ids run 1, 2, ...
pub fn read_plain_bodies<R: BufRead>(reader: R, central_mass: f64) -> Result<World> {
    let mut values = Vec::new();
    for line in reader.lines() {
        let line = line?;
        for token in line.split_whitespace() {
            let value = token
                .parse::<f64>()
                .map_err(|e| Error::Parse(format!("'{}': {}", token, e)))?;
            values.push(value);
        }
    }
    if values.len() % 7 != 0 {
        return Err(Error::Parse(format!(
            "expected groups of 7 numbers (x y z vx vy vz mass), got {} values",
            values.len()
        )));
    }

    let mut world = World::new(central_mass);
    for (i, group) in values.chunks(7).enumerate() {
        let body = Body::new(
            i as BodyId + 1,
            Vec3::new(group[0], group[1], group[2]),
            Vec3::new(group[3], group[4], group[5]),
            group[6],
        );
        world.insert_body(body)?;
    }
    Ok(world)
}
