use anyhow::Result;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use warpkit_core::spatial::{Direction, Point, Spacing};
use warpkit_core::{BSplineTransform, GridGeometry, ReferenceEvaluator};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Developer tasks for the warpkit workspace")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Time the recursive engine against brute-force evaluation on random points
    Compare {
        /// Spatial dimension (2, 3 or 4)
        #[arg(short, long, default_value_t = 3)]
        dimension: usize,

        /// Spline order (0 to 5)
        #[arg(short, long, default_value_t = 3)]
        order: usize,

        /// Control points per axis
        #[arg(short, long, default_value_t = 20)]
        grid_size: usize,

        /// Number of query points
        #[arg(short = 'n', long, default_value_t = 1000)]
        points: usize,

        /// Random seed for coefficients and points
        #[arg(short, long, default_value_t = 140377)]
        seed: u64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compare { dimension, order, grid_size, points, seed } => {
            let options = CompareOptions { order, grid_size, points, seed };
            match dimension {
                2 => compare::<2>(&options)?,
                3 => compare::<3>(&options)?,
                4 => compare::<4>(&options)?,
                _ => anyhow::bail!("Unsupported dimension: {}. Use 2, 3 or 4.", dimension),
            }
        }
    }

    Ok(())
}

struct CompareOptions {
    order: usize,
    grid_size: usize,
    points: usize,
    seed: u64,
}

/// Running sum of squared differences between the two engines.
#[derive(Default)]
struct Discrepancy {
    sum: f64,
    count: usize,
}

impl Discrepancy {
    fn add<'a>(&mut self, fast: impl IntoIterator<Item = &'a f64>, slow: impl IntoIterator<Item = &'a f64>) {
        for (a, b) in fast.into_iter().zip(slow) {
            self.sum += (a - b) * (a - b);
            self.count += 1;
        }
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

fn compare<const D: usize>(options: &CompareOptions) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(options.seed);

    let geometry = GridGeometry::new(
        [options.grid_size; D],
        Point::<D>::from(Spacing::<D>::from_fn(|_, _| rng.gen_range(-200.0..-100.0))),
        Spacing::<D>::from_fn(|_, _| rng.gen_range(8.0..12.0)),
        Direction::<D>::identity(),
    )?;
    let mut transform = BSplineTransform::with_geometry(options.order, geometry)?;
    let params: Vec<f64> = (0..transform.number_of_parameters())
        .map(|_| rng.gen_range(-5.0..5.0))
        .collect();
    transform.set_parameters(&params)?;

    info!(
        "D = {}, order = {}, grid = {}^{}, N = {}",
        D,
        options.order,
        options.grid_size,
        D,
        options.points
    );
    info!(
        "parameters = {}, nonzero Jacobian indices = {}",
        transform.number_of_parameters(),
        transform.number_of_nonzero_jacobian_indices()
    );

    let points = random_points(&mut rng, &transform, options.points)?;
    let reference = ReferenceEvaluator::new(&transform)?;

    // Point mapping
    let (fast, fast_time) = timed(|| points.iter().map(|p| transform.transform_point(p)).collect::<Result<Vec<_>, _>>())?;
    let (batch, batch_time) = timed(|| transform.transform_points(&points))?;
    let (slow, slow_time) = timed(|| points.iter().map(|p| reference.transform_point(p)).collect::<Result<Vec<_>, _>>())?;
    let mut msd = Discrepancy::default();
    for (f, s) in fast.iter().zip(slow.iter()) {
        msd.add(f.point.coords.iter(), s.point.coords.iter());
    }
    if fast != batch {
        warn!("batch and serial point mappings differ");
    }
    report("transform_point", fast_time, slow_time, msd.mean());
    info!("{:<24} recursive batch {:>10.3?}", "transform_points", batch_time);

    // Parameter Jacobian
    let (fast, fast_time) = timed(|| points.iter().map(|p| transform.jacobian(p)).collect::<Result<Vec<_>, _>>())?;
    let (slow, slow_time) = timed(|| points.iter().map(|p| reference.jacobian(p)).collect::<Result<Vec<_>, _>>())?;
    let mut msd = Discrepancy::default();
    for (f, s) in fast.iter().zip(slow.iter()) {
        if f.support != s.support {
            anyhow::bail!("support indices differ between engines");
        }
        msd.add(f.values.iter(), s.values.iter());
    }
    report("jacobian", fast_time, slow_time, msd.mean());

    // Spatial Jacobian
    let (fast, fast_time) = timed(|| points.iter().map(|p| transform.spatial_jacobian(p)).collect::<Result<Vec<_>, _>>())?;
    let (slow, slow_time) = timed(|| points.iter().map(|p| reference.spatial_jacobian(p)).collect::<Result<Vec<_>, _>>())?;
    let mut msd = Discrepancy::default();
    for (f, s) in fast.iter().zip(slow.iter()) {
        msd.add(f.iter(), s.iter());
    }
    report("spatial_jacobian", fast_time, slow_time, msd.mean());

    // Spatial Hessian
    let (fast, fast_time) = timed(|| points.iter().map(|p| transform.spatial_hessian(p)).collect::<Result<Vec<_>, _>>())?;
    let (slow, slow_time) = timed(|| points.iter().map(|p| reference.spatial_hessian(p)).collect::<Result<Vec<_>, _>>())?;
    let mut msd = Discrepancy::default();
    for (f, s) in fast.iter().zip(slow.iter()) {
        for d in 0..D {
            msd.add(f[d].iter(), s[d].iter());
        }
    }
    report("spatial_hessian", fast_time, slow_time, msd.mean());

    // Parameter derivatives of the spatial derivatives have no brute-force
    // counterpart; time them alone.
    let (_, jsj_time) = timed(|| points.iter().map(|p| transform.jacobian_of_spatial_jacobian(p)).collect::<Result<Vec<_>, _>>())?;
    let (_, jsh_time) = timed(|| points.iter().map(|p| transform.jacobian_of_spatial_hessian(p)).collect::<Result<Vec<_>, _>>())?;
    info!("{:<24} recursive {:>10.3?}", "jacobian_of_spatial_jacobian", jsj_time);
    info!("{:<24} recursive {:>10.3?}", "jacobian_of_spatial_hessian", jsh_time);

    Ok(())
}

/// Points whose continuous index lies strictly inside the valid support range.
fn random_points<const D: usize>(
    rng: &mut StdRng,
    transform: &BSplineTransform<D>,
    count: usize,
) -> Result<Vec<Point<D>>> {
    let geometry = transform.geometry()?;
    let shift = transform.kernel().window_offset();
    let order = transform.spline_order() as f64;
    let size = geometry.size();
    for (axis, &n) in size.iter().enumerate() {
        if (n as f64) - order <= 0.02 {
            anyhow::bail!("grid axis {} with {} points has no interior for order {}", axis, n, order);
        }
    }

    Ok((0..count)
        .map(|_| {
            let index = Point::<D>::from(Spacing::<D>::from_fn(|a, _| {
                rng.gen_range(shift + 0.01..size[a] as f64 - order + shift - 0.01)
            }));
            geometry.continuous_index_to_physical(&index)
        })
        .collect())
}

fn timed<T, E>(f: impl FnOnce() -> Result<T, E>) -> Result<(T, Duration)>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let start = Instant::now();
    let value = f()?;
    Ok((value, start.elapsed()))
}

fn report(name: &str, fast: Duration, slow: Duration, msd: f64) {
    let speedup = slow.as_secs_f64() / fast.as_secs_f64().max(f64::EPSILON);
    info!(
        "{:<24} recursive {:>10.3?}  brute force {:>10.3?}  speedup {:>6.1}x  MSD {:.3e}",
        name, fast, slow, speedup, msd
    );
}
