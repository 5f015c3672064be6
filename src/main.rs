use anyhow::{Context, Result};
use clap::Parser;
use planetsim::experiment::{append_run_summary, export_positions, RunSummary, TrajectoryRecorder};
use planetsim::observer::{EnergyMonitor, ProgressObserver, TimingObserver};
use planetsim::orbit_generator::{
    random_orbits, random_world, read_orbital_records, read_plain_bodies, world_from_records,
    OrbitParams, ScenarioParams,
};
use planetsim::{AdaptiveController, Boundary, Method, SimConfig, World};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(about = "Adaptive-step N-body orbit simulation")]
struct Args {
    /// JSON run configuration; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Integration method (explicit-euler, implicit-euler, leapfrog, velocity-verlet, explicit-rk4, implicit-rk4)
    #[arg(short, long)]
    method: Option<Method>,

    /// Boundary policy (none, kill, box)
    #[arg(short, long)]
    boundary: Option<Boundary>,

    #[arg(long)]
    radius: Option<f64>,

    #[arg(long)]
    rel_tol: Option<f64>,

    #[arg(long)]
    abs_tol: Option<f64>,

    /// Number of logical steps
    #[arg(short = 'n', long, default_value_t = 2000)]
    steps: usize,

    #[arg(long, default_value_t = 100.0)]
    central_mass: f64,

    /// CSV of orbital records (id,name,mass,distance,eccentricity,inclination,period)
    #[arg(long, conflicts_with = "bodies")]
    records: Option<PathBuf>,

    /// Plain text bodies, groups of `x y z vx vy vz mass`
    #[arg(long)]
    bodies: Option<PathBuf>,

    /// Generate bound orbits at periapsis instead of scattered bodies
    #[arg(long, conflicts_with_all = ["records", "bodies"])]
    orbits: bool,

    /// Number of generated bodies when no input file is given
    #[arg(long, default_value_t = 10)]
    count: u32,

    /// Seed for the random scenario used when no input file is given
    #[arg(long)]
    seed: Option<u64>,

    #[arg(short, long, default_value = "output.csv")]
    output: PathBuf,

    /// Record every n-th step only
    #[arg(long, default_value_t = 1)]
    every: usize,

    /// Append a run summary line to this CSV log
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(short, long)]
    quiet: bool,
}

fn load_config(args: &Args) -> Result<SimConfig> {
    let mut config = match &args.config {
        Some(path) => SimConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => SimConfig::default(),
    };
    if let Some(method) = args.method {
        config.method = method;
    }
    if let Some(boundary) = args.boundary {
        config.boundary.policy = boundary;
    }
    if let Some(radius) = args.radius {
        config.boundary.radius = radius;
    }
    if let Some(rel) = args.rel_tol {
        config.tolerances.relative = rel;
    }
    if let Some(abs) = args.abs_tol {
        config.tolerances.absolute = abs;
    }
    Ok(config)
}

fn load_world(args: &Args, config: &SimConfig) -> Result<World> {
    if let Some(path) = &args.records {
        let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
        let records = read_orbital_records(file)?;
        return Ok(world_from_records(&records, &config.physics, args.central_mass)?);
    }
    if let Some(path) = &args.bodies {
        let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
        return Ok(read_plain_bodies(BufReader::new(file), args.central_mass)?);
    }
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    if args.orbits {
        let params = OrbitParams {
            count: args.count,
            central_mass: args.central_mass,
            ..Default::default()
        };
        return Ok(random_orbits(&params, &config.physics, &mut rng)?);
    }
    let params = ScenarioParams {
        count: args.count,
        central_mass: args.central_mass,
        body_mass: config.physics.default_mass,
        ..Default::default()
    };
    Ok(random_world(&params, &mut rng)?)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    let world = load_world(&args, &config)?;

    println!("{}", world);

    let mut controller = AdaptiveController::from_config(&config, world);
    if controller.method().is_implicit() {
        println!(
            "{}: at most {} fixed-point iterations per solve",
            controller.method(),
            config.steps.max_implicit_iterations
        );
    }
    let mut progress = if args.quiet {
        ProgressObserver::hidden()
    } else {
        ProgressObserver::new(args.steps as u64, controller.method().name())
    };
    let mut monitor = EnergyMonitor::new(controller.initial_energy());
    let mut recorder = TrajectoryRecorder::every(args.every);
    let mut timing = TimingObserver::default();

    let start = Instant::now();
    let taken = controller
        .solve_with(
            args.steps,
            &mut (&mut progress, (&mut monitor, (&mut recorder, &mut timing))),
        )
        .context("simulation aborted")?;
    progress.finish();
    let execution_duration = start.elapsed().as_secs_f64();

    println!("{}", controller);
    println!("{}", controller.current_world());
    println!(
        "steps={} bodies={} energy={} drift={} stepping={:.3}s",
        taken,
        controller.current_world().len(),
        controller.total_energy(),
        controller.energy_drift(),
        timing.total().as_secs_f64()
    );

    export_positions(&args.output, &recorder)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    if let Some(path) = &args.summary {
        let summary = RunSummary::from_run(&controller, &monitor, execution_duration, "")?;
        append_run_summary(path, &summary)
            .with_context(|| format!("failed to append to {}", path.display()))?;
    }

    Ok(())
}
