use fractal4d_core::{EscapeFunction, Plane4};
use rayon::prelude::*;

/// Escape-time render of the cross-section a camera plane cuts through 4D
/// space: for every pixel, the exact iteration count the viewed point
/// survives before bailing out. Row-major, one count per pixel.
///
/// This is the cheap, deterministic sibling of the Monte Carlo projections:
/// it is what the importance mask is built from and what the still-image
/// output renders. Rows are independent, so they run data-parallel.
pub fn escape_counts(
    f: EscapeFunction,
    plane: &Plane4,
    width: u32,
    height: u32,
    max_iter: u32,
    bailout: f64,
) -> Vec<u32> {
    let sqr_bailout = bailout * bailout;
    let mut counts = vec![0u32; (width * height) as usize];

    counts
        .par_chunks_mut(width as usize)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, cell) in row.iter_mut().enumerate() {
                let p = plane.point_at_pixel(x as f64, y as f64, width, height);
                *cell = f.escape_iterations(p.q0, p.q1, p.q2, p.q3, max_iter, sqr_bailout);
            }
        });

    counts
}

/// Boolean form of [`escape_counts`]: true where the point survived the
/// full `max_iter` budget (the interior estimate at that budget).
pub fn escape_map(
    f: EscapeFunction,
    plane: &Plane4,
    width: u32,
    height: u32,
    max_iter: u32,
    bailout: f64,
) -> Vec<bool> {
    escape_counts(f, plane, width, height, max_iter, bailout)
        .into_iter()
        .map(|i| i == max_iter)
        .collect()
}
