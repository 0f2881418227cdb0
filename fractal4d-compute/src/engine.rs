//! Worker-pool front end of the Monte Carlo passes.
//!
//! Each `spawn_*` call compiles the camera once, validates the request,
//! splits the sample budget across OS threads and returns a
//! [`RenderHandle`] the caller joins or cancels. Workers share the count
//! grids through atomics and own everything else; the only coordination
//! point after spawn is the cancellation flag.

use crate::accumulate::{
    accumulate_hologram, accumulate_single, accumulate_tiered, IterationTiers, TraceBuf,
};
use crate::cancel::CancelFlag;
use crate::sample_space::{CubeSpace, SampleSpace};
use fractal4d_core::{CountGrid, EscapeFunction, Plane4};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("iteration tiers must be strictly ascending, got {0} / {1} / {2}")]
    NonAscendingTiers(u32, u32, u32),
    #[error("accumulation grids must share one raster size")]
    GridSizeMismatch,
    #[error("at least one worker thread is required")]
    NoWorkers,
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Knobs common to every pass.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Escape radius; iteration stops once |z|^2 reaches its square.
    pub bailout: f64,
    /// Total accepted samples, split across the workers.
    pub samples: u64,
    pub workers: usize,
    /// Fixed seed for reproducible runs; fresh entropy when absent.
    pub seed: Option<u64>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            bailout: 128.0,
            samples: 1_000_000,
            workers: std::thread::available_parallelism().map_or(1, |n| n.get()),
            seed: None,
        }
    }
}

impl RenderOptions {
    fn rng_for_worker(&self, index: usize) -> SmallRng {
        match self.seed {
            Some(seed) => SmallRng::seed_from_u64(seed.wrapping_add(index as u64)),
            None => SmallRng::from_entropy(),
        }
    }

    /// Budget share of worker `index`; the division remainder goes to the
    /// lowest-indexed workers.
    fn samples_for_worker(&self, index: usize) -> u64 {
        let base = self.samples / self.workers as u64;
        let extra = u64::from((index as u64) < self.samples % self.workers as u64);
        base + extra
    }
}

/// A running pass: the cancellation flag plus the worker threads.
pub struct RenderHandle {
    cancel: CancelFlag,
    workers: Vec<JoinHandle<()>>,
}

impl RenderHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Blocks until every worker has drained its budget.
    pub fn join(self) {
        for handle in self.workers {
            if handle.join().is_err() {
                log::error!("render worker panicked");
            }
        }
    }

    /// Cancels and waits up to `timeout` for the workers to notice. Workers
    /// poll between samples, so a straggler mid-trajectory can outlive the
    /// deadline; such threads are abandoned (they still exit on their own)
    /// and `false` is returned.
    pub fn cancel_and_join(self, timeout: Duration) -> bool {
        self.cancel.cancel();
        let deadline = Instant::now() + timeout;

        let mut pending = self.workers;
        loop {
            let (done, still_running): (Vec<_>, Vec<_>) =
                pending.into_iter().partition(|h| h.is_finished());
            for handle in done {
                if handle.join().is_err() {
                    log::error!("render worker panicked");
                }
            }
            if still_running.is_empty() {
                return true;
            }
            if Instant::now() >= deadline {
                log::warn!(
                    "abandoning {} render worker(s) still running after cancellation",
                    still_running.len()
                );
                return false;
            }
            pending = still_running;
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

fn check_grid_sizes(grids: &[Arc<CountGrid>; 3]) -> Result<(), EngineError> {
    let (w, h) = (grids[0].width(), grids[0].height());
    if grids.iter().any(|g| g.width() != w || g.height() != h) {
        return Err(EngineError::GridSizeMismatch);
    }
    Ok(())
}

fn spawn_worker<F>(index: usize, body: F) -> Result<JoinHandle<()>, EngineError>
where
    F: FnOnce() + Send + 'static,
{
    Ok(std::thread::Builder::new()
        .name(format!("fractal4d-worker-{index}"))
        .spawn(body)?)
}

/// Spawns the three-tier nebula pass: `options.samples` accepted draws from
/// `space`, traced through `f` and accumulated into the tier grids under
/// the space's sampling method. Draws rejected by the importance mask do
/// not consume the budget.
pub fn spawn_nebula(
    f: EscapeFunction,
    space: Arc<SampleSpace>,
    camera: &Plane4,
    grids: [Arc<CountGrid>; 3],
    tiers: IterationTiers,
    options: &RenderOptions,
) -> Result<RenderHandle, EngineError> {
    if !tiers.is_ascending() {
        return Err(EngineError::NonAscendingTiers(tiers.t1, tiers.t2, tiers.t3));
    }
    if options.workers == 0 {
        return Err(EngineError::NoWorkers);
    }
    check_grid_sizes(&grids)?;

    let proj = Arc::new(camera.compile());
    let method = space.method();
    let sqr_bailout = options.bailout * options.bailout;
    let cancel = CancelFlag::new();
    log::info!(
        "nebula pass: {} samples on {} worker(s), tiers {}/{}/{}",
        options.samples,
        options.workers,
        tiers.t1,
        tiers.t2,
        tiers.t3
    );

    let workers = (0..options.workers)
        .map(|k| {
            let space = Arc::clone(&space);
            let proj = Arc::clone(&proj);
            let grids = grids.clone();
            let cancel = cancel.clone();
            let mut rng = options.rng_for_worker(k);
            let budget = options.samples_for_worker(k);

            spawn_worker(k, move || {
                let mut trace = TraceBuf::new(tiers.t3);
                let mut done = 0u64;
                while done < budget {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let Some(point) = space.draw(&mut rng) else {
                        continue;
                    };
                    accumulate_tiered(
                        f,
                        &proj,
                        [&grids[0], &grids[1], &grids[2]],
                        tiers,
                        sqr_bailout,
                        method,
                        point,
                        &mut trace,
                    );
                    done += 1;
                }
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RenderHandle { cancel, workers })
}

/// Single-grid variant of [`spawn_nebula`] with one iteration threshold.
pub fn spawn_projection(
    f: EscapeFunction,
    space: Arc<SampleSpace>,
    camera: &Plane4,
    grid: Arc<CountGrid>,
    max_iter: u32,
    options: &RenderOptions,
) -> Result<RenderHandle, EngineError> {
    if options.workers == 0 {
        return Err(EngineError::NoWorkers);
    }

    let proj = Arc::new(camera.compile());
    let method = space.method();
    let sqr_bailout = options.bailout * options.bailout;
    let cancel = CancelFlag::new();
    log::info!(
        "projection pass: {} samples on {} worker(s), {} iterations",
        options.samples,
        options.workers,
        max_iter
    );

    let workers = (0..options.workers)
        .map(|k| {
            let space = Arc::clone(&space);
            let proj = Arc::clone(&proj);
            let grid = Arc::clone(&grid);
            let cancel = cancel.clone();
            let mut rng = options.rng_for_worker(k);
            let budget = options.samples_for_worker(k);

            spawn_worker(k, move || {
                let mut trace = TraceBuf::new(max_iter);
                let mut done = 0u64;
                while done < budget {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let Some(point) = space.draw(&mut rng) else {
                        continue;
                    };
                    accumulate_single(
                        f, &proj, &grid, max_iter, sqr_bailout, method, point, &mut trace,
                    );
                    done += 1;
                }
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RenderHandle { cancel, workers })
}

/// Spawns the holographic pass: full-4D cube draws classified by escape
/// depth, each counted at the single pixel the sample itself projects to.
/// Draws projecting off the raster consume their budget slot; a badly
/// framed cube would otherwise never drain.
pub fn spawn_hologram(
    f: EscapeFunction,
    space: Arc<CubeSpace>,
    camera: &Plane4,
    grids: [Arc<CountGrid>; 3],
    tiers: IterationTiers,
    options: &RenderOptions,
) -> Result<RenderHandle, EngineError> {
    if !tiers.is_ascending() {
        return Err(EngineError::NonAscendingTiers(tiers.t1, tiers.t2, tiers.t3));
    }
    if options.workers == 0 {
        return Err(EngineError::NoWorkers);
    }
    check_grid_sizes(&grids)?;

    let proj = Arc::new(camera.compile());
    let sqr_bailout = options.bailout * options.bailout;
    let cancel = CancelFlag::new();
    log::info!(
        "hologram pass: {} samples on {} worker(s), tiers {}/{}/{}",
        options.samples,
        options.workers,
        tiers.t1,
        tiers.t2,
        tiers.t3
    );

    let workers = (0..options.workers)
        .map(|k| {
            let space = Arc::clone(&space);
            let proj = Arc::clone(&proj);
            let grids = grids.clone();
            let cancel = cancel.clone();
            let mut rng = options.rng_for_worker(k);
            let budget = options.samples_for_worker(k);

            spawn_worker(k, move || {
                for _ in 0..budget {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let point = space.draw(&mut rng);
                    accumulate_hologram(
                        f,
                        &proj,
                        [&grids[0], &grids[1], &grids[2]],
                        tiers,
                        sqr_bailout,
                        point,
                    );
                }
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RenderHandle { cancel, workers })
}
