use crate::config::Physics;
use crate::error::{Error, Result};
use crate::world::{BodyDeriv, Deriv, World};
use itertools::izip;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Everything a single step needs besides the world itself.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub physics: &'a Physics,
    /// Convergence bound for implicit schemes, tied to the controller's
    /// current acceptance threshold
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl<'a> StepContext<'a> {
    pub fn new(physics: &'a Physics, tolerance: f64, max_iterations: usize) -> Self {
        Self {
            physics,
            tolerance,
            max_iterations,
        }
    }
}

/// A single-step integration scheme.
///
/// `advance` returns a new world moved forward by `h`; the source world is
/// never touched.
pub trait Integrator {
    fn name(&self) -> &'static str;

    /// Convergence order of the scheme.
    fn order(&self) -> i32;

    fn advance(&self, world: &World, h: f64, ctx: &StepContext<'_>) -> Result<World>;

    /// Rescales a step-doubling discrepancy into an error estimate: `2^p / (2^p - 1)`.
    fn error_coefficient(&self) -> f64 {
        let p = 2f64.powi(self.order());
        p / (p - 1.0)
    }
}

pub struct ExplicitEuler;
impl Integrator for ExplicitEuler {
    fn name(&self) -> &'static str {
        "ExplicitEuler"
    }
    fn order(&self) -> i32 {
        1
    }
    fn advance(&self, world: &World, h: f64, ctx: &StepContext<'_>) -> Result<World> {
        Ok(world.apply(&world.derivatives(ctx.physics), h))
    }
}

pub struct ImplicitEuler;
impl Integrator for ImplicitEuler {
    fn name(&self) -> &'static str {
        "ImplicitEuler"
    }
    fn order(&self) -> i32 {
        1
    }
    fn advance(&self, world: &World, h: f64, ctx: &StepContext<'_>) -> Result<World> {
        let guess = world.apply(&world.derivatives(ctx.physics), h);
        fixed_point(world, guess, h, ctx, self.name())
    }
}

pub struct Leapfrog;
impl Integrator for Leapfrog {
    fn name(&self) -> &'static str {
        "Leapfrog"
    }
    // kick-drift with one force evaluation is first order
    fn order(&self) -> i32 {
        1
    }
    fn advance(&self, world: &World, h: f64, ctx: &StepContext<'_>) -> Result<World> {
        let accels = world.accelerations(ctx.physics);
        let mut next = world.clone();
        for body in next.bodies_mut() {
            if let Some(acc) = accels.get(&body.id) {
                body.velocity += h * acc;
            }
            // kick first, then drift with the new velocity
            body.position += h * body.velocity;
        }
        Ok(next)
    }
}

pub struct VelocityVerlet;
impl Integrator for VelocityVerlet {
    fn name(&self) -> &'static str {
        "VelocityVerlet"
    }
    fn order(&self) -> i32 {
        2
    }
    fn advance(&self, world: &World, h: f64, ctx: &StepContext<'_>) -> Result<World> {
        let h2_half = 0.5 * h * h;
        let old_accels = world.accelerations(ctx.physics);
        let mut next = world.clone();
        for body in next.bodies_mut() {
            if let Some(acc) = old_accels.get(&body.id) {
                body.position += body.velocity * h + acc * h2_half;
            }
        }
        let new_accels = next.accelerations(ctx.physics);
        for body in next.bodies_mut() {
            if let (Some(old), Some(new)) = (old_accels.get(&body.id), new_accels.get(&body.id)) {
                body.velocity += 0.5 * h * (old + new);
            }
        }
        Ok(next)
    }
}

pub struct ExplicitRk4;
impl Integrator for ExplicitRk4 {
    fn name(&self) -> &'static str {
        "ExplicitRK4"
    }
    fn order(&self) -> i32 {
        4
    }
    fn advance(&self, world: &World, h: f64, ctx: &StepContext<'_>) -> Result<World> {
        let h2 = h / 2.0;
        let k1 = world.derivatives(ctx.physics);
        let k2 = world.apply(&k1, h2).derivatives(ctx.physics);
        let k3 = world.apply(&k2, h2).derivatives(ctx.physics);
        let k4 = world.apply(&k3, h).derivatives(ctx.physics);
        Ok(world.apply(&rk4_combination(&k1, &k2, &k3, &k4), h))
    }
}

/// RK4 whose stage worlds are each solved implicitly.
///
/// Stage `i` satisfies `Y_i = w_0 + c_i h f(Y_i)` with `c = (1/2, 1/2, 1)`;
/// the explicit RK4 stage world is the starting guess.
pub struct ImplicitRk4;
impl Integrator for ImplicitRk4 {
    fn name(&self) -> &'static str {
        "ImplicitRK4"
    }
    fn order(&self) -> i32 {
        4
    }
    fn advance(&self, world: &World, h: f64, ctx: &StepContext<'_>) -> Result<World> {
        let h2 = h / 2.0;
        let k1 = world.derivatives(ctx.physics);

        let y2 = fixed_point(world, world.apply(&k1, h2), h2, ctx, self.name())?;
        let k2 = y2.derivatives(ctx.physics);

        let y3 = fixed_point(world, world.apply(&k2, h2), h2, ctx, self.name())?;
        let k3 = y3.derivatives(ctx.physics);

        let y4 = fixed_point(world, world.apply(&k3, h), h, ctx, self.name())?;
        let k4 = y4.derivatives(ctx.physics);

        Ok(world.apply(&rk4_combination(&k1, &k2, &k3, &k4), h))
    }
}

/// `(k1 + 2 k2 + 2 k3 + k4) / 6`
fn rk4_combination(k1: &Deriv, k2: &Deriv, k3: &Deriv, k4: &Deriv) -> Deriv {
    let bodies = izip!(
        k1.bodies.iter(),
        k2.bodies.values(),
        k3.bodies.values(),
        k4.bodies.values()
    )
    .map(|((&id, a), b, c, d)| {
        let combined = BodyDeriv {
            dpos: (a.dpos + 2.0 * b.dpos + 2.0 * c.dpos + d.dpos) / 6.0,
            dvel: (a.dvel + 2.0 * b.dvel + 2.0 * c.dvel + d.dvel) / 6.0,
        };
        (id, combined)
    })
    .collect();
    Deriv { bodies }
}

/// Iterates `w <- origin + h f(w)` until successive candidates move less than
/// `ctx.tolerance`, or gives up after `ctx.max_iterations`.
fn fixed_point(
    origin: &World,
    guess: World,
    h: f64,
    ctx: &StepContext<'_>,
    method: &'static str,
) -> Result<World> {
    let mut candidate = guess;
    for _ in 0..ctx.max_iterations {
        let next = origin.apply(&candidate.derivatives(ctx.physics), h);
        let change = World::delta_pos(&next, &candidate)?;
        candidate = next;
        if change < ctx.tolerance || change == 0.0 {
            return Ok(candidate);
        }
    }
    Err(Error::ImplicitNotConverged {
        method,
        iterations: ctx.max_iterations,
    })
}

/// The closed set of available schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    #[default]
    ExplicitEuler,
    ImplicitEuler,
    Leapfrog,
    VelocityVerlet,
    ExplicitRk4,
    ImplicitRk4,
}

impl Method {
    pub const ALL: [Method; 6] = [
        Method::ExplicitEuler,
        Method::ImplicitEuler,
        Method::Leapfrog,
        Method::VelocityVerlet,
        Method::ExplicitRk4,
        Method::ImplicitRk4,
    ];

    pub fn integrator(&self) -> &'static dyn Integrator {
        match self {
            Method::ExplicitEuler => &ExplicitEuler,
            Method::ImplicitEuler => &ImplicitEuler,
            Method::Leapfrog => &Leapfrog,
            Method::VelocityVerlet => &VelocityVerlet,
            Method::ExplicitRk4 => &ExplicitRk4,
            Method::ImplicitRk4 => &ImplicitRk4,
        }
    }

    pub fn advance(&self, world: &World, h: f64, ctx: &StepContext<'_>) -> Result<World> {
        self.integrator().advance(world, h, ctx)
    }

    pub fn name(&self) -> &'static str {
        self.integrator().name()
    }

    pub fn error_coefficient(&self) -> f64 {
        self.integrator().error_coefficient()
    }

    pub fn is_implicit(&self) -> bool {
        matches!(self, Method::ImplicitEuler | Method::ImplicitRk4)
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.to_ascii_lowercase().replace('_', "-");
        match key.as_str() {
            "explicit-euler" | "euler" => Ok(Method::ExplicitEuler),
            "implicit-euler" => Ok(Method::ImplicitEuler),
            "leapfrog" => Ok(Method::Leapfrog),
            "velocity-verlet" | "verlet" => Ok(Method::VelocityVerlet),
            "explicit-rk4" | "rk4" => Ok(Method::ExplicitRk4),
            "implicit-rk4" => Ok(Method::ImplicitRk4),
            _ => Err(Error::UnknownMethod(s.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::Vec3;
    use approx::assert_relative_eq;

    fn circular_orbit() -> World {
        let mut world = World::new(1.0);
        world.add_body(Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0), 1e-9).unwrap();
        world
    }

    fn ctx(physics: &Physics) -> StepContext<'_> {
        StepContext::new(physics, 1e-12, 1000)
    }

    /// Position error after integrating the unit circular orbit to t = 1.
    fn orbit_error(method: Method, steps: usize) -> f64 {
        let physics = Physics::scaled();
        let h = 1.0 / steps as f64;
        let mut world = circular_orbit();
        for _ in 0..steps {
            world = method.advance(&world, h, &ctx(&physics)).unwrap();
        }
        let exact = Vec3::new(1.0_f64.cos(), 1.0_f64.sin(), 0.0);
        (world.body(1).unwrap().position - exact).norm()
    }

    #[test]
    fn explicit_euler_uses_pre_step_state() {
        let physics = Physics::scaled();
        let world = circular_orbit();
        let next = Method::ExplicitEuler.advance(&world, 0.1, &ctx(&physics)).unwrap();
        let body = next.body(1).unwrap();
        assert_relative_eq!(body.position, Vec3::new(1.0, 0.1, 0.0), epsilon = 1e-12);
        assert_relative_eq!(body.velocity, Vec3::new(-0.1, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn leapfrog_drifts_with_updated_velocity() {
        let physics = Physics::scaled();
        let world = circular_orbit();
        let next = Method::Leapfrog.advance(&world, 0.1, &ctx(&physics)).unwrap();
        let body = next.body(1).unwrap();
        assert_relative_eq!(body.velocity, Vec3::new(-0.1, 1.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(body.position, Vec3::new(0.99, 0.1, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn verlet_averages_old_and_new_acceleration() {
        let physics = Physics::scaled();
        let world = circular_orbit();
        let h = 0.1;
        let next = Method::VelocityVerlet.advance(&world, h, &ctx(&physics)).unwrap();
        let body = next.body(1).unwrap();

        let pos = Vec3::new(1.0 - 0.5 * h * h, h, 0.0);
        assert_relative_eq!(body.position, pos, epsilon = 1e-12);
        let a_new = -pos / pos.norm().powi(3);
        let vel = Vec3::new(0.0, 1.0, 0.0) + 0.5 * h * (Vec3::new(-1.0, 0.0, 0.0) + a_new);
        assert_relative_eq!(body.velocity, vel, epsilon = 1e-12);
    }

    #[test]
    fn source_world_is_not_mutated() {
        let physics = Physics::scaled();
        let world = circular_orbit();
        let before = world.clone();
        for method in Method::ALL {
            method.advance(&world, 0.05, &ctx(&physics)).unwrap();
            assert_eq!(world, before, "{} mutated its input", method);
        }
    }

    #[test]
    fn convergence_orders_match() {
        let euler = orbit_error(Method::ExplicitEuler, 200) / orbit_error(Method::ExplicitEuler, 400);
        assert!(euler > 1.6 && euler < 2.4, "euler ratio {}", euler);

        let leapfrog = orbit_error(Method::Leapfrog, 200) / orbit_error(Method::Leapfrog, 400);
        assert!(leapfrog > 1.6 && leapfrog < 2.4, "leapfrog ratio {}", leapfrog);

        let verlet = orbit_error(Method::VelocityVerlet, 50) / orbit_error(Method::VelocityVerlet, 100);
        assert!(verlet > 3.0 && verlet < 5.0, "verlet ratio {}", verlet);

        let rk4 = orbit_error(Method::ExplicitRk4, 10) / orbit_error(Method::ExplicitRk4, 20);
        assert!(rk4 > 12.0 && rk4 < 20.0, "rk4 ratio {}", rk4);
    }

    #[test]
    fn implicit_euler_reaches_its_fixed_point() {
        let physics = Physics::scaled();
        let world = circular_orbit();
        let h = 0.01;
        let next = Method::ImplicitEuler.advance(&world, h, &ctx(&physics)).unwrap();

        // residual of w1 = w0 + h f(w1)
        let again = world.apply(&next.derivatives(&physics), h);
        assert!(World::delta_pos(&again, &next).unwrap() < 1e-11);
        // backward Euler spirals inward on a circular orbit
        assert!(next.body(1).unwrap().velocity.norm() < 1.0);
    }

    #[test]
    fn implicit_rk4_tracks_explicit_rk4_for_small_steps() {
        let physics = Physics::scaled();
        let world = circular_orbit();
        let explicit = Method::ExplicitRk4.advance(&world, 1e-3, &ctx(&physics)).unwrap();
        let implicit = Method::ImplicitRk4.advance(&world, 1e-3, &ctx(&physics)).unwrap();
        assert!(World::delta_pos(&explicit, &implicit).unwrap() < 1e-5);
    }

    #[test]
    fn implicit_iteration_is_capped() {
        let physics = Physics::scaled();
        let world = circular_orbit();
        let strict = StepContext::new(&physics, 0.0, 3);
        let err = Method::ImplicitEuler.advance(&world, 0.1, &strict).unwrap_err();
        assert!(matches!(
            err,
            Error::ImplicitNotConverged { iterations: 3, .. }
        ));
    }

    #[test]
    fn error_coefficients_follow_order() {
        assert_relative_eq!(Method::ExplicitEuler.error_coefficient(), 2.0);
        assert_relative_eq!(Method::ImplicitEuler.error_coefficient(), 2.0);
        assert_relative_eq!(Method::Leapfrog.error_coefficient(), 2.0);
        assert_relative_eq!(Method::VelocityVerlet.error_coefficient(), 4.0 / 3.0);
        assert_relative_eq!(Method::ExplicitRk4.error_coefficient(), 16.0 / 15.0);
        assert_relative_eq!(Method::ImplicitRk4.error_coefficient(), 16.0 / 15.0);
    }

    #[test]
    fn only_euler_and_rk4_variants_iterate() {
        let implicit: Vec<Method> = Method::ALL.into_iter().filter(Method::is_implicit).collect();
        assert_eq!(implicit, vec![Method::ImplicitEuler, Method::ImplicitRk4]);
    }

    #[test]
    fn method_names_parse() {
        assert_eq!("rk4".parse::<Method>().unwrap(), Method::ExplicitRk4);
        assert_eq!("Implicit_RK4".parse::<Method>().unwrap(), Method::ImplicitRk4);
        assert_eq!("velocity-verlet".parse::<Method>().unwrap(), Method::VelocityVerlet);
        assert!(matches!(
            "rk2-half".parse::<Method>(),
            Err(Error::UnknownMethod(_))
        ));
    }
}
