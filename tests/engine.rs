use approx::assert_relative_eq;
use planetsim::{
    AdaptiveController, Body, Boundary, BoundaryEvent, Method, Physics, SimConfig, StepLimits,
    Tolerances, Vec3, World,
};

/// Scaled units (G = 1) with the given tolerances and boundary.
fn config(method: Method, absolute: f64, boundary: Boundary, radius: f64) -> SimConfig {
    let mut config = SimConfig {
        method,
        physics: Physics::scaled(),
        tolerances: Tolerances::new(0.0, absolute),
        steps: StepLimits {
            initial: 1e-4,
            max: 0.05,
            ..Default::default()
        },
        ..Default::default()
    };
    config.boundary.policy = boundary;
    config.boundary.radius = radius;
    config
}

/// One unit mass on a circular orbit of radius 1 around a unit central mass.
fn circular_orbit() -> World {
    let mut world = World::new(1.0);
    world.add_body(Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0), 1.0).unwrap();
    world
}

fn three_bodies() -> World {
    World::from_bodies(
        1.0,
        [
            Body::new(1, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0), 1e-3),
            Body::new(4, Vec3::new(0.0, 1.5, 0.1), Vec3::new(-0.8, 0.0, 0.0), 2e-3),
            Body::new(9, Vec3::new(-2.0, 0.0, 0.0), Vec3::new(0.0, -0.7, 0.05), 1e-3),
        ],
    )
    .unwrap()
}

fn assert_energy_conserved(method: Method) {
    let absolute = 1e-9;
    let cfg = config(method, absolute, Boundary::None, 100.0);
    let mut controller = AdaptiveController::from_config(&cfg, circular_orbit());
    assert_relative_eq!(controller.initial_energy(), -0.5, epsilon = 1e-15);

    let mut worst: f64 = 0.0;
    for _ in 0..10_000 {
        controller.step().unwrap();
        worst = worst.max(controller.energy_drift().abs());
    }
    assert_eq!(controller.accepted_steps(), 10_000);
    assert!(worst < 10.0 * absolute, "{} drifted by {}", method, worst);
}

#[test]
fn verlet_conserves_energy_on_circular_orbit() {
    assert_energy_conserved(Method::VelocityVerlet);
}

#[test]
fn rk4_conserves_energy_on_circular_orbit() {
    assert_energy_conserved(Method::ExplicitRk4);
}

#[test]
fn rk4_keeps_circular_orbit_radius() {
    let cfg = config(Method::ExplicitRk4, 1e-8, Boundary::None, 100.0);
    let mut controller = AdaptiveController::from_config(&cfg, circular_orbit());
    for _ in 0..5_000 {
        controller.step().unwrap();
        let r = controller.current_world().body(1).unwrap().distance();
        assert!((r - 1.0).abs() < 1e-4, "radius wandered to {}", r);
    }
    // several revolutions, not a handful of tiny steps
    assert!(controller.elapsed_time() > 20.0);
}

#[test]
fn logical_steps_are_deterministic() {
    for method in Method::ALL {
        let cfg = config(method, 1e-6, Boundary::Box, 10.0);
        let mut a = AdaptiveController::from_config(&cfg, three_bodies());
        a.solve(5).unwrap();
        let mut b = a.clone();

        a.step().unwrap();
        b.step().unwrap();
        assert_eq!(a.step_length().to_bits(), b.step_length().to_bits(), "{}", method);
        assert_eq!(a.last_error().to_bits(), b.last_error().to_bits(), "{}", method);
        assert_eq!(a.current_world(), b.current_world(), "{}", method);
    }
}

#[test]
fn shrink_terminates_for_near_coincident_bodies() {
    let mut world = World::new(1.0);
    world.add_body(Vec3::new(1.0, 0.0, 0.0), Vec3::zeros(), 1.0).unwrap();
    world.add_body(Vec3::new(1.0 + 1e-9, 0.0, 0.0), Vec3::zeros(), 1.0).unwrap();

    let mut cfg = config(Method::ExplicitEuler, 1e-4, Boundary::None, 100.0);
    cfg.steps.initial = 1e-5;
    let mut controller = AdaptiveController::from_config(&cfg, world);

    controller.step().unwrap();
    assert!(controller.step_length() < 1e-5);
    assert!(controller.last_error() < controller.last_threshold());
    assert!(controller.current_world().is_finite());
}

#[test]
fn kill_removes_escaped_body_for_good() {
    let mut world = World::new(1.0);
    world.add_body(Vec3::new(10.0, 0.0, 0.0), Vec3::new(0.0, 0.1f64.sqrt(), 0.0), 1e-3).unwrap();
    world.add_body(Vec3::new(50.0, 0.0, 0.0), Vec3::zeros(), 1e-3).unwrap();
    world.add_body(Vec3::new(0.0, -12.0, 0.0), Vec3::new(12.0f64.recip().sqrt(), 0.0, 0.0), 1e-3).unwrap();

    let cfg = config(Method::ExplicitRk4, 1e-6, Boundary::Kill, 20.0);
    let mut controller = AdaptiveController::from_config(&cfg, world);

    controller.step().unwrap();
    assert_eq!(controller.last_events(), &[BoundaryEvent::Removed(2)]);
    assert!(controller.current_world().body(2).is_none());
    assert_eq!(controller.current_world().len(), 2);

    controller.solve(50).unwrap();
    assert!(controller.current_world().body(2).is_none());
    assert_eq!(controller.current_world().ids().collect::<Vec<_>>(), vec![1, 3]);
    assert_eq!(controller.initial_world().len(), 3);
}

#[test]
fn box_reflects_radial_velocity_once() {
    let mut world = World::new(1e-9);
    world.add_body(Vec3::new(25.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), 1e-9).unwrap();

    let cfg = config(Method::ExplicitRk4, 1e-6, Boundary::Box, 20.0);
    let mut controller = AdaptiveController::from_config(&cfg, world);

    controller.step().unwrap();
    assert_eq!(controller.last_events(), &[BoundaryEvent::Reflected(1)]);
    let body = *controller.current_world().body(1).unwrap();
    assert!(!body.in_bound);
    assert_relative_eq!(body.velocity.x, -1.0, epsilon = 1e-6);

    controller.step().unwrap();
    assert!(controller.last_events().is_empty());
    let body = *controller.current_world().body(1).unwrap();
    assert!(body.distance() > 20.0);
    assert!(!body.in_bound);
    assert_relative_eq!(body.velocity.x, -1.0, epsilon = 1e-6);
}

#[test]
fn method_swap_keeps_energy_bookkeeping() {
    let cfg = config(Method::ExplicitRk4, 1e-8, Boundary::Kill, 100.0);
    let mut controller = AdaptiveController::from_config(&cfg, three_bodies());
    let e0 = controller.initial_energy();

    controller.solve(100).unwrap();
    controller.change_method(Method::VelocityVerlet);
    controller.solve(100).unwrap();
    controller.change_method(Method::ImplicitRk4);
    controller.solve(20).unwrap();

    assert_eq!(controller.initial_energy(), e0);
    assert_eq!(controller.accepted_steps(), 220);
    assert!(controller.energy_drift().abs() < 1e-4 * e0.abs().max(1e-3));
}

#[test]
fn world_copy_survives_dropping_original() {
    let original = three_bodies();
    let copy = original.clone();
    let expected: Vec<(u32, [u64; 3], [u64; 3])> = original
        .bodies()
        .map(|b| {
            (
                b.id,
                [b.position.x.to_bits(), b.position.y.to_bits(), b.position.z.to_bits()],
                [b.velocity.x.to_bits(), b.velocity.y.to_bits(), b.velocity.z.to_bits()],
            )
        })
        .collect();
    drop(original);

    let actual: Vec<(u32, [u64; 3], [u64; 3])> = copy
        .bodies()
        .map(|b| {
            (
                b.id,
                [b.position.x.to_bits(), b.position.y.to_bits(), b.position.z.to_bits()],
                [b.velocity.x.to_bits(), b.velocity.y.to_bits(), b.velocity.z.to_bits()],
            )
        })
        .collect();
    assert_eq!(actual, expected);
}
