use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ion_space_charge::boundary::BoundaryActions;
use ion_space_charge::config::{self, SimulationConfig};
use ion_space_charge::integration::{self, ParallelVerletIntegrator};
use ion_space_charge::ion_cloud;
use ion_space_charge::random::RandomGeneratorPool;
use ion_space_charge::space_charge;
use ion_space_charge::tracker::ParticleStartSplatTracker;
use ion_space_charge::trajectory::{RunHeader, TrajectoryWriter};

#[derive(Parser, Debug)]
#[command(about = "Ion trajectories with Barnes-Hut space charge")]
struct Args {
    /// TOML configuration; the built-in scenario is used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the trajectory output path.
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(short = 'j', long)]
    threads: Option<usize>,

    #[arg(short, long)]
    seed: Option<u64>,

    /// Print the built-in configuration as TOML and exit.
    #[arg(long)]
    print_default_config: bool,
}

fn init_thread_pool(requested: Option<usize>) -> Result<()> {
    let threads = match requested {
        Some(n) => n,
        None => std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
    };
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .context("failed to build the global thread pool")?;
    info!(threads, "thread pool ready");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    if args.print_default_config {
        let text = toml::to_string_pretty(&SimulationConfig::default())
            .context("failed to serialize the default configuration")?;
        println!("{text}");
        return Ok(());
    }

    let mut cfg = match &args.config {
        Some(path) => SimulationConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => {
            warn!("no configuration given, running the built-in scenario");
            SimulationConfig::default()
        }
    };
    if let Some(threads) = args.threads {
        cfg.threads = Some(threads);
    }
    if let Some(seed) = args.seed {
        cfg.random_seed = Some(seed);
    }
    if let Some(output) = &args.output {
        cfg.trajectory.enabled = true;
        cfg.trajectory.path = output.display().to_string();
    }
    cfg.validate().context("invalid configuration")?;

    init_thread_pool(cfg.threads)?;

    let random = Arc::new(match cfg.random_seed {
        Some(seed) => RandomGeneratorPool::seeded(seed),
        None => RandomGeneratorPool::new(),
    });

    let particles = ion_cloud::initial_particles(&cfg, &random).context("reading the ion cloud")?;
    info!(
        particles = particles.len(),
        groups = cfg.groups.len(),
        solver = %cfg.space_charge.solver,
        "particles generated"
    );

    let tracker = Arc::new(ParticleStartSplatTracker::new());
    let boundary = BoundaryActions::from_config(&cfg, Arc::clone(&tracker), Arc::clone(&random)).map(Arc::new);

    let writer = if cfg.trajectory.enabled {
        let mut w = TrajectoryWriter::create(&cfg.trajectory.path, cfg.trajectory.gzip, cfg.trajectory.velocities)
            .with_context(|| format!("creating {}", cfg.trajectory.path))?;
        w.write_header(&RunHeader {
            particles: particles.len(),
            dt_s: cfg.dt_s,
            steps: cfg.steps,
            space_charge_factor: cfg.space_charge_factor,
            solver: cfg.space_charge.solver.to_string(),
        })?;
        Some(w)
    } else {
        None
    };
    let writer = Arc::new(Mutex::new(writer));

    let e_external = config::to_dvec3(cfg.electric_field_v_per_m);
    let sc_factor = cfg.space_charge_factor;
    let calculator = space_charge::from_config(&cfg.space_charge);
    let field_domain = boundary.clone();
    let mut builder = ParallelVerletIntegrator::builder(calculator, move |p, _index, field, _time, _timestep| {
        let e_sc = field.e_field_from_space_charge(p)?;
        let in_domain = field_domain.as_ref().map_or(true, |b| b.check_field_domain(p));
        let e = if in_domain { e_external + e_sc * sc_factor } else { e_sc * sc_factor };
        Ok(e * (p.charge / p.mass))
    })
        .particles(particles)
        .random_pool(Arc::clone(&random));

    {
        let tracker = Arc::clone(&tracker);
        builder = builder.start_monitoring(move |p, time| tracker.particle_start(p, time));
    }

    if let Some(boundary) = boundary {
        builder = builder.other_actions(move |next, p, _index, time, _timestep| boundary.apply(next, p, time));
    }

    {
        let writer = Arc::clone(&writer);
        let interval = cfg.write_interval;
        builder = builder.timestep_write(move |particles, time, timestep, is_last| {
            if timestep % interval != 0 && !is_last {
                return;
            }
            info!("ts:{} time:{:.2e}", timestep, time);
            if let Some(w) = writer.lock().as_mut() {
                if let Err(e) = w.write_frame(particles, time, timestep) {
                    error!("trajectory write failed at ts {timestep}: {e}");
                }
            }
        });
    }

    let mut integrator = builder.build().context("failed to set up the integrator")?;

    integration::terminate_on_signal(integrator.termination_handle())
        .context("failed to install the signal handler")?;

    let started = Instant::now();
    integrator
        .run(cfg.steps, cfg.dt_s)
        .context("integration aborted")?;
    let summary = tracker.summary();
    info!(
        elapsed = ?started.elapsed(),
        timesteps = integrator.timestep(),
        started = summary.started,
        splatted = summary.splatted,
        restarted = summary.restarted,
        "simulation finished"
    );

    if let Some(mut w) = writer.lock().take() {
        w.write_splats(&tracker.records())?;
        let frames = w.frames_written();
        w.finish().context("closing trajectory output")?;
        info!(frames, path = %cfg.trajectory.path, "trajectory written");
    }

    #[cfg(feature = "profiling")]
    ion_space_charge::PROFILER.lock().log_and_clear();

    Ok(())
}
