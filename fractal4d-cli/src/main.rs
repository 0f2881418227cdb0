//! Offline renderer: animates a Nebulabrot along a recorded camera track,
//! or renders a single escape-time cross-section.

mod colormap;
mod viewpoint;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use fractal4d_compute::{
    escape_counts, spawn_nebula, IterationTiers, MaskedPlaneSpace, RenderOptions, SampleSpace,
    SamplingMethod,
};
use fractal4d_core::{CountGrid, EscapeFunction, Plane4};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

/// Iteration budget for the importance mask built before animating.
const MASK_ITERATIONS: u32 = 400;
/// Quality tiers of the animated nebula frames.
const FRAME_TIERS: IterationTiers = IterationTiers {
    t1: 50,
    t2: 500,
    t3: 5_000,
};

#[derive(Parser)]
#[command(name = "fractal4d", version, about = "4D escape-time fractal renderer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a nebula animation along a CSV camera track.
    Animate(AnimateArgs),
    /// Render one escape-time cross-section to a PNG.
    Section(SectionArgs),
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum FunctionChoice {
    Mandelbrot,
    Multibrot3,
    Tricorn,
    Burningship,
    Buffalo,
}

impl From<FunctionChoice> for EscapeFunction {
    fn from(choice: FunctionChoice) -> Self {
        match choice {
            FunctionChoice::Mandelbrot => EscapeFunction::Mandelbrot,
            FunctionChoice::Multibrot3 => EscapeFunction::Multibrot3,
            FunctionChoice::Tricorn => EscapeFunction::Tricorn,
            FunctionChoice::Burningship => EscapeFunction::BurningShip,
            FunctionChoice::Buffalo => EscapeFunction::Buffalo,
        }
    }
}

#[derive(Args)]
struct AnimateArgs {
    /// Camera track CSV (15 fields per row).
    input: PathBuf,
    /// Directory receiving the numbered frame PNGs.
    output_dir: PathBuf,
    #[arg(long, value_enum, default_value_t = FunctionChoice::Mandelbrot)]
    function: FunctionChoice,
    #[arg(long, default_value_t = 128.0)]
    bailout: f64,
    /// Accepted samples per frame.
    #[arg(long, default_value_t = 50_000_000)]
    samples: u64,
    #[arg(long, default_value_t = 1000)]
    width: u32,
    #[arg(long, default_value_t = 1000)]
    height: u32,
    /// Keep only trajectories that escape.
    #[arg(long, conflicts_with_all = ["exterior", "all"])]
    interior: bool,
    /// Keep only trajectories that never escape (the default).
    #[arg(long, conflicts_with = "all")]
    exterior: bool,
    /// Keep every trajectory.
    #[arg(long)]
    all: bool,
    /// Base RNG seed for reproducible frames.
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = 1.0)]
    brightness: f64,
}

impl AnimateArgs {
    fn sampling_method(&self) -> SamplingMethod {
        if self.interior {
            SamplingMethod::Interior
        } else if self.all {
            SamplingMethod::All
        } else {
            SamplingMethod::Exterior
        }
    }
}

#[derive(Args)]
struct SectionArgs {
    /// Output PNG path.
    output: PathBuf,
    #[arg(long, value_enum, default_value_t = FunctionChoice::Mandelbrot)]
    function: FunctionChoice,
    #[arg(long, default_value_t = 128.0)]
    bailout: f64,
    #[arg(long, default_value_t = 1000)]
    width: u32,
    #[arg(long, default_value_t = 1000)]
    height: u32,
    #[arg(long, default_value_t = 1000)]
    max_iter: u32,
}

fn main() -> Result<()> {
    env_logger::init();
    match Cli::parse().command {
        Command::Animate(args) => animate(&args),
        Command::Section(args) => section(&args),
    }
}

fn animate(args: &AnimateArgs) -> Result<()> {
    let input = File::open(&args.input)
        .with_context(|| format!("opening camera track {}", args.input.display()))?;
    let track = viewpoint::read_track(input)?;
    if track.len() < 2 {
        bail!("camera track needs at least two snapshots, got {}", track.len());
    }
    for (i, snapshot) in track.iter().enumerate().skip(1) {
        if snapshot.factor <= 0.0 {
            bail!("snapshot {} has non-positive step factor {}", i + 1, snapshot.factor);
        }
    }
    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;

    let function = EscapeFunction::from(args.function);
    let method = args.sampling_method();

    log::info!("building {}x{} importance mask", args.width, args.height);
    let space = MaskedPlaneSpace::new(
        method,
        function,
        Plane4::front_facing(args.width, args.height),
        args.width,
        args.height,
        MASK_ITERATIONS,
        args.bailout,
    )
    .context("building importance mask")?;
    let space = Arc::new(SampleSpace::Plane(space));

    let options = RenderOptions {
        bailout: args.bailout,
        samples: args.samples,
        seed: args.seed,
        ..RenderOptions::default()
    };

    let mut frame = 0u32;
    for i in 1..track.len() {
        let (from, to) = (&track[i - 1].camera, &track[i].camera);
        let step = track[i].factor;

        let mut progress = 0.0;
        while progress < 1.0 {
            let camera = Plane4::slerp(from, to, progress);
            let grids = [
                Arc::new(CountGrid::new(args.width, args.height)),
                Arc::new(CountGrid::new(args.width, args.height)),
                Arc::new(CountGrid::new(args.width, args.height)),
            ];
            spawn_nebula(
                function,
                Arc::clone(&space),
                &camera,
                grids.clone(),
                FRAME_TIERS,
                &options,
            )?
            .join();

            let image = colormap::color_nebula(&grids[0], &grids[1], &grids[2], args.brightness);
            let path = args.output_dir.join(format!("{frame}.png"));
            image
                .save(&path)
                .with_context(|| format!("writing {}", path.display()))?;
            log::info!("frame {frame} written to {}", path.display());

            frame += 1;
            progress += step;
        }
    }
    log::info!("animation complete: {frame} frame(s)");
    Ok(())
}

fn section(args: &SectionArgs) -> Result<()> {
    let function = EscapeFunction::from(args.function);
    let camera = Plane4::front_facing(args.width, args.height);

    log::info!(
        "rendering {}x{} cross-section at {} iterations",
        args.width,
        args.height,
        args.max_iter
    );
    let counts = escape_counts(
        function,
        &camera,
        args.width,
        args.height,
        args.max_iter,
        args.bailout,
    );
    let image = colormap::color_escape(&counts, args.width, args.height, args.max_iter);
    image
        .save(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    Ok(())
}
