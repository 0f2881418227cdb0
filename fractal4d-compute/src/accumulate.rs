//! Per-sample accumulation, extracted from the worker loop so tests can
//! drive the exact production code path one trajectory at a time.
//!
//! Each routine takes one candidate 4D point, splits it into parameter
//! coordinates (q0, q1) and state coordinates (q2, q3), iterates the escape
//! function, projects every intermediate iterate through the compiled
//! camera matrix, and counts hits into the shared grids. The traced
//! variants keep a per-iteration record of where they counted so the
//! mode-dependent rollback can undo exactly the contributions the finished
//! trajectory turned out not to qualify for. One random walk thereby
//! yields exact interior-only or exterior-only density without a second
//! pass.

use crate::sample_space::SamplingMethod;
use fractal4d_core::{CountGrid, EscapeFunction, ProjectionMatrix, Quat};
use serde::{Deserialize, Serialize};

/// The three ascending iteration thresholds of a tiered pass. Grid n
/// accumulates iterates seen before `tn`, so the tiers render the same
/// walk at three escalating quality levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationTiers {
    pub t1: u32,
    pub t2: u32,
    pub t3: u32,
}

impl IterationTiers {
    pub fn new(t1: u32, t2: u32, t3: u32) -> Self {
        Self { t1, t2, t3 }
    }

    pub fn is_ascending(&self) -> bool {
        self.t1 < self.t2 && self.t2 < self.t3
    }
}

/// Reusable per-worker trace of one trajectory: the pixel each iterate
/// landed on and whether it was on the raster at all.
#[derive(Debug)]
pub struct TraceBuf {
    px: Vec<u32>,
    py: Vec<u32>,
    hit: Vec<bool>,
}

impl TraceBuf {
    pub fn new(depth: u32) -> Self {
        let depth = depth as usize;
        Self {
            px: vec![0; depth],
            py: vec![0; depth],
            hit: vec![false; depth],
        }
    }
}

/// Three-grid traced accumulation. Returns the escape iteration count
/// (`tiers.t3` means the trajectory never escaped).
///
/// Rollback policy:
/// - `Exterior`: trajectories surviving the full `t3` budget keep
///   everything; one escaping at `i` is stripped from every grid whose
///   tier it failed to reach (below `t1`: all three; below `t2`: grids 2
///   and 3; below `t3`: grid 3). Escaping at exactly `i == t1` therefore
///   keeps its grid-1 hits.
/// - `Interior`: the exact complement: survivors are stripped from all
///   three grids, early escapees keep the tiers their depth stayed under.
/// - `All`: nothing is traced or undone.
pub fn accumulate_tiered(
    f: EscapeFunction,
    proj: &ProjectionMatrix,
    grids: [&CountGrid; 3],
    tiers: IterationTiers,
    sqr_bailout: f64,
    method: SamplingMethod,
    point: Quat,
    trace: &mut TraceBuf,
) -> u32 {
    let (width, height) = (grids[0].width(), grids[0].height());
    let (cx, cy) = (point.q0, point.q1);
    let (mut zx, mut zy) = (point.q2, point.q3);

    if method == SamplingMethod::All {
        let mut i = 0;
        while zx * zx + zy * zy < sqr_bailout && i < tiers.t3 {
            if let Some((x, y)) = proj.project_pixel(Quat::new(cx, cy, zx, zy), width, height) {
                if i < tiers.t1 {
                    grids[0].increment(x, y);
                }
                if i < tiers.t2 {
                    grids[1].increment(x, y);
                }
                grids[2].increment(x, y);
            }
            (zx, zy) = f.apply(cx, cy, zx, zy);
            i += 1;
        }
        return i;
    }

    let mut i = 0;
    while zx * zx + zy * zy < sqr_bailout && i < tiers.t3 {
        let slot = i as usize;
        trace.hit[slot] = false;
        if let Some((x, y)) = proj.project_pixel(Quat::new(cx, cy, zx, zy), width, height) {
            if i < tiers.t1 {
                grids[0].increment(x, y);
            }
            if i < tiers.t2 {
                grids[1].increment(x, y);
            }
            grids[2].increment(x, y);

            trace.px[slot] = x;
            trace.py[slot] = y;
            trace.hit[slot] = true;
        }
        (zx, zy) = f.apply(cx, cy, zx, zy);
        i += 1;
    }

    match method {
        SamplingMethod::Exterior => {
            if i < tiers.t1 {
                for k in 0..i as usize {
                    if trace.hit[k] {
                        grids[0].decrement(trace.px[k], trace.py[k]);
                        grids[1].decrement(trace.px[k], trace.py[k]);
                        grids[2].decrement(trace.px[k], trace.py[k]);
                    }
                }
            } else if i < tiers.t2 {
                for k in 0..i as usize {
                    if trace.hit[k] {
                        grids[1].decrement(trace.px[k], trace.py[k]);
                        grids[2].decrement(trace.px[k], trace.py[k]);
                    }
                }
            } else if i != tiers.t3 {
                for k in 0..i as usize {
                    if trace.hit[k] {
                        grids[2].decrement(trace.px[k], trace.py[k]);
                    }
                }
            }
        }
        SamplingMethod::Interior => {
            if i == tiers.t3 {
                for k in 0..tiers.t3 as usize {
                    if trace.hit[k] {
                        if (k as u32) < tiers.t1 {
                            grids[0].decrement(trace.px[k], trace.py[k]);
                        }
                        if (k as u32) < tiers.t2 {
                            grids[1].decrement(trace.px[k], trace.py[k]);
                        }
                        grids[2].decrement(trace.px[k], trace.py[k]);
                    }
                }
            } else if i >= tiers.t2 {
                for k in 0..tiers.t2 as usize {
                    if trace.hit[k] {
                        if (k as u32) < tiers.t1 {
                            grids[0].decrement(trace.px[k], trace.py[k]);
                        }
                        grids[1].decrement(trace.px[k], trace.py[k]);
                    }
                }
            } else if i >= tiers.t1 {
                for k in 0..tiers.t1 as usize {
                    if trace.hit[k] {
                        grids[0].decrement(trace.px[k], trace.py[k]);
                    }
                }
            }
        }
        SamplingMethod::All => unreachable!("handled above"),
    }

    i
}

/// Single-grid, single-threshold traced accumulation with the same
/// rollback directions as [`accumulate_tiered`].
pub fn accumulate_single(
    f: EscapeFunction,
    proj: &ProjectionMatrix,
    grid: &CountGrid,
    max_iter: u32,
    sqr_bailout: f64,
    method: SamplingMethod,
    point: Quat,
    trace: &mut TraceBuf,
) -> u32 {
    let (width, height) = (grid.width(), grid.height());
    let (cx, cy) = (point.q0, point.q1);
    let (mut zx, mut zy) = (point.q2, point.q3);

    let mut i = 0;
    while zx * zx + zy * zy < sqr_bailout && i < max_iter {
        let slot = i as usize;
        trace.hit[slot] = false;
        if let Some((x, y)) = proj.project_pixel(Quat::new(cx, cy, zx, zy), width, height) {
            grid.increment(x, y);
            trace.px[slot] = x;
            trace.py[slot] = y;
            trace.hit[slot] = true;
        }
        (zx, zy) = f.apply(cx, cy, zx, zy);
        i += 1;
    }

    let undo = match method {
        SamplingMethod::All => false,
        SamplingMethod::Exterior => i < max_iter,
        SamplingMethod::Interior => i == max_iter,
    };
    if undo {
        for k in 0..i as usize {
            if trace.hit[k] {
                grid.decrement(trace.px[k], trace.py[k]);
            }
        }
    }

    i
}

/// Holographic accumulation over a full 4D sample: the candidate point is
/// projected once, classified by its final escape depth, and counted into
/// the grids whose tier it reached. No trace, no rollback, monotone
/// increments only. Returns `None` when the point misses the raster.
pub fn accumulate_hologram(
    f: EscapeFunction,
    proj: &ProjectionMatrix,
    grids: [&CountGrid; 3],
    tiers: IterationTiers,
    sqr_bailout: f64,
    point: Quat,
) -> Option<u32> {
    let (width, height) = (grids[0].width(), grids[0].height());
    let (x, y) = proj.project_pixel(point, width, height)?;

    let i = f.escape_iterations(point.q0, point.q1, point.q2, point.q3, tiers.t3, sqr_bailout);
    if i == tiers.t3 {
        grids[0].increment(x, y);
        grids[1].increment(x, y);
        grids[2].increment(x, y);
    } else if i >= tiers.t2 {
        grids[0].increment(x, y);
        grids[1].increment(x, y);
    } else if i >= tiers.t1 {
        grids[0].increment(x, y);
    }
    Some(i)
}
