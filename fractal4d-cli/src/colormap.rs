//! Tone mapping from count grids to RGB images.
//!
//! Raw hit counts have a huge dynamic range, so everything here normalizes
//! against the 99th-percentile count rather than the true maximum; the top
//! percent of pixels saturates instead of crushing the rest to black.

use fractal4d_core::CountGrid;
use image::{Rgb, RgbImage};

/// Composite nebula coloring: the deepest tier drives red, the middle tier
/// green, the shallowest blue. Each channel is normalized independently,
/// then every pixel is darkened by the fraction of the image at most as
/// bright as itself (a cumulative-luminance curve), scaled by `brightness`.
/// Dim haze fades while bright filaments keep their color.
pub fn color_nebula(
    grid1: &CountGrid,
    grid2: &CountGrid,
    grid3: &CountGrid,
    brightness: f64,
) -> RgbImage {
    let (width, height) = (grid1.width(), grid1.height());
    let pixels = (width * height) as usize;

    let blue = grid1.to_vec();
    let green = grid2.to_vec();
    let red = grid3.to_vec();
    let max_b = percentile_99(&blue);
    let max_g = percentile_99(&green);
    let max_r = percentile_99(&red);

    let luminance = |i: usize| {
        let r = (red[i] as f64 / max_r).min(1.0);
        let g = (green[i] as f64 / max_g).min(1.0);
        let b = (blue[i] as f64 / max_b).min(1.0);
        (r, g, b, r * 0.299 + g * 0.587 + b * 0.114)
    };

    let mut histogram = [0u64; 256];
    for i in 0..pixels {
        let (_, _, _, gray) = luminance(i);
        histogram[((gray * 255.0) as usize).min(255)] += 1;
    }
    for i in 1..histogram.len() {
        histogram[i] += histogram[i - 1];
    }

    let mut image = RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let (r, g, b, gray) = luminance((x + y * width) as usize);
            let rank = histogram[((gray * 255.0) as usize).min(255)];
            let factor = brightness * rank as f64 / pixels as f64;
            image.put_pixel(
                x,
                y,
                Rgb([
                    quantize(r * factor),
                    quantize(g * factor),
                    quantize(b * factor),
                ]),
            );
        }
    }
    image
}

/// Escape-depth coloring of a cross-section render: the hue cycles every 36
/// iterations at full saturation, points surviving `max_iter` stay black.
pub fn color_escape(counts: &[u32], width: u32, height: u32, max_iter: u32) -> RgbImage {
    let mut image = RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let i = counts[(x + y * width) as usize];
            let pixel = if i < max_iter {
                hsv_to_rgb(i as f64 / 36.0, 1.0, 1.0)
            } else {
                Rgb([0, 0, 0])
            };
            image.put_pixel(x, y, pixel);
        }
    }
    image
}

/// Gamma-darkened grayscale of a single count grid.
pub fn color_grayscale(grid: &CountGrid) -> RgbImage {
    let (width, height) = (grid.width(), grid.height());
    let counts = grid.to_vec();
    let max = percentile_99(&counts);

    let mut image = RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let v = (counts[(x + y * width) as usize] as f64 / max).min(1.0);
            let level = quantize(v.powf(2.2));
            image.put_pixel(x, y, Rgb([level, level, level]));
        }
    }
    image
}

/// 99th-percentile count, floored at 1 so empty grids normalize to black
/// instead of dividing by zero.
fn percentile_99(counts: &[u32]) -> f64 {
    let mut sorted = counts.to_vec();
    sorted.sort_unstable();
    let value = sorted[(0.99 * sorted.len() as f64) as usize];
    f64::from(value.max(1))
}

fn quantize(channel: f64) -> u8 {
    ((channel * 255.0) as i64).clamp(0, 255) as u8
}

/// Hue wraps on its fractional part; saturation and value in [0, 1].
fn hsv_to_rgb(hue: f64, saturation: f64, value: f64) -> Rgb<u8> {
    let h = (hue.fract() + 1.0).fract() * 6.0;
    let sector = h as u32 % 6;
    let f = h - h.floor();

    let p = value * (1.0 - saturation);
    let q = value * (1.0 - saturation * f);
    let t = value * (1.0 - saturation * (1.0 - f));

    let (r, g, b) = match sector {
        0 => (value, t, p),
        1 => (q, value, p),
        2 => (p, value, t),
        3 => (p, q, value),
        4 => (t, p, value),
        _ => (value, p, q),
    };
    Rgb([quantize(r), quantize(g), quantize(b)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsv_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), Rgb([255, 0, 0]));
        assert_eq!(hsv_to_rgb(1.0 / 3.0, 1.0, 1.0), Rgb([0, 255, 0]));
        assert_eq!(hsv_to_rgb(2.0 / 3.0, 1.0, 1.0), Rgb([0, 0, 255]));
        // Hue one full turn later is red again.
        assert_eq!(hsv_to_rgb(1.0, 1.0, 1.0), Rgb([255, 0, 0]));
        assert_eq!(hsv_to_rgb(0.5, 0.0, 1.0), Rgb([255, 255, 255]));
    }

    #[test]
    fn empty_grids_render_black() {
        let g = CountGrid::new(8, 8);
        let image = color_nebula(&g, &g, &g, 1.0);
        assert!(image.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn nebula_channels_follow_their_grids() {
        let grid1 = CountGrid::new(16, 16);
        let grid2 = CountGrid::new(16, 16);
        let grid3 = CountGrid::new(16, 16);
        // A bright spot in the deep-tier grid only.
        grid3.set(4, 4, 1000);

        let image = color_nebula(&grid1, &grid2, &grid3, 1.0);
        let Rgb([r, g, b]) = *image.get_pixel(4, 4);
        assert!(r > 0, "deep tier should light the red channel");
        assert_eq!((g, b), (0, 0));
    }

    #[test]
    fn escape_coloring_blacks_out_survivors() {
        let counts = vec![0, 5, 100, 100];
        let image = color_escape(&counts, 2, 2, 100);
        assert_ne!(*image.get_pixel(0, 0), Rgb([0, 0, 0]));
        assert_ne!(*image.get_pixel(1, 0), Rgb([0, 0, 0]));
        assert_eq!(*image.get_pixel(0, 1), Rgb([0, 0, 0]));
        assert_eq!(*image.get_pixel(1, 1), Rgb([0, 0, 0]));
    }

    #[test]
    fn grayscale_is_monotone_in_the_count() {
        let grid = CountGrid::new(4, 1);
        grid.set(1, 0, 10);
        grid.set(2, 0, 100);
        grid.set(3, 0, 1000);
        let image = color_grayscale(&grid);
        let level = |x: u32| image.get_pixel(x, 0).0[0];
        assert!(level(0) <= level(1));
        assert!(level(1) <= level(2));
        assert!(level(2) <= level(3));
    }
}
