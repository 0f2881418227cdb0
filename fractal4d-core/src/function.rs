use serde::{Deserialize, Serialize};

/// Escaped-denominator sentinel for the negative-power variants: a division
/// by zero maps the iterate far outside any sensible bailout instead of
/// producing NaN.
const DIV_BLOWUP: (f64, f64) = (1_000_000.0, 1_000_000.0);

/// The escape functions: each maps the parameter coordinates (cx, cy) and
/// the current state (zx, zy) to the next state. The set is closed and
/// data-driven; all variants are stateless and safe to call from any
/// thread.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EscapeFunction {
    /// z -> z^2 + c
    Mandelbrot,
    /// z -> c*z*(1-z)
    Logistic,
    /// z -> z^2 + 1/c
    MandelbrotInv,
    /// z -> conj(z)^2 + c
    Tricorn,
    /// z -> (|Re z| + i|Im z|)^2 + c
    BurningShip,
    /// z -> z^3 + c
    Multibrot3,
    /// z -> z^-1 + c
    MultibrotNeg1,
    /// z -> z^-2 + c
    MultibrotNeg2,
    /// z -> |Re(z^2)| + i|Im(z^2)| + c
    Buffalo,
    /// z -> z^d + c for arbitrary real d
    Multibrot { d: f64 },
    /// z -> r*z^2 + 2rz + c
    Aquarius { r: f64 },
    /// z -> r*z^3 + 0.5z + c
    Vajra { r: f64 },
    /// z -> r*(z^3 + 0.97z) + c
    Keyura { r: f64 },
    /// z -> r*(conj(z)^3 + z) + c
    Shrivatsa { r: f64 },
}

impl EscapeFunction {
    /// One iteration step: next (zx, zy).
    #[inline]
    pub fn apply(&self, cx: f64, cy: f64, zx: f64, zy: f64) -> (f64, f64) {
        match *self {
            Self::Mandelbrot => (zx * zx - zy * zy + cx, 2.0 * zx * zy + cy),
            Self::Logistic => {
                let a = zx - zx * zx + zy * zy;
                let b = zy - 2.0 * zx * zy;
                (cx * a - cy * b, cx * b + cy * a)
            }
            Self::MandelbrotInv => {
                let d = cx * cx + cy * cy;
                (zx * zx - zy * zy + cx / d, 2.0 * zx * zy - cy / d)
            }
            Self::Tricorn => (zx * zx - zy * zy + cx, -2.0 * zx * zy + cy),
            Self::BurningShip => (zx * zx - zy * zy + cx, 2.0 * (zx * zy).abs() + cy),
            Self::Multibrot3 => (
                zx * zx * zx - 3.0 * zx * zy * zy + cx,
                3.0 * zx * zx * zy - zy * zy * zy + cy,
            ),
            Self::MultibrotNeg1 => {
                let d = zx * zx + zy * zy;
                if d == 0.0 {
                    DIV_BLOWUP
                } else {
                    (zx / d + cx, -zy / d + cy)
                }
            }
            Self::MultibrotNeg2 => {
                let x_sqr = zx * zx;
                let y_sqr = zy * zy;
                let d = x_sqr * x_sqr + 2.0 * x_sqr * y_sqr + y_sqr * y_sqr;
                if d == 0.0 {
                    DIV_BLOWUP
                } else {
                    ((x_sqr - y_sqr) / d + cx, -2.0 * zx * zy / d + cy)
                }
            }
            Self::Buffalo => (
                (zx * zx - zy * zy).abs() + cx,
                (2.0 * zx * zy).abs() + cy,
            ),
            Self::Multibrot { d } => {
                let r_pow = zx.hypot(zy).powf(d);
                let theta = d * zy.atan2(zx);
                (r_pow * theta.cos() + cx, r_pow * theta.sin() + cy)
            }
            Self::Aquarius { r } => (
                r * (zx * zx - zy * zy + 2.0 * zx) + cx,
                r * (2.0 * zx * zy + 2.0 * zy) + cy,
            ),
            Self::Vajra { r } => (
                r * (zx * zx * zx - 3.0 * zx * zy * zy) + 0.5 * zx + cx,
                r * (3.0 * zx * zx * zy - zy * zy * zy) + 0.5 * zy + cy,
            ),
            Self::Keyura { r } => (
                r * (zx * zx * zx - 3.0 * zx * zy * zy + 0.97 * zx) + cx,
                r * (3.0 * zx * zx * zy - zy * zy * zy + 0.97 * zy) + cy,
            ),
            Self::Shrivatsa { r } => (
                r * (zx * zx * zx - 3.0 * zx * zy * zy + zx) + cx,
                r * (-3.0 * zx * zx * zy + zy * zy * zy + zy) + cy,
            ),
        }
    }

    /// Iterates the state until its squared magnitude reaches
    /// `sqr_bailout` or `max_iter` iterations have run, and returns the
    /// exact iteration count. `max_iter` means the point never escaped.
    pub fn escape_iterations(
        &self,
        cx: f64,
        cy: f64,
        mut zx: f64,
        mut zy: f64,
        max_iter: u32,
        sqr_bailout: f64,
    ) -> u32 {
        let mut i = 0;
        while zx * zx + zy * zy < sqr_bailout && i < max_iter {
            (zx, zy) = self.apply(cx, cy, zx, zy);
            i += 1;
        }
        i
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mandelbrot_step() {
        let f = EscapeFunction::Mandelbrot;
        // (1 + 2i)^2 + (0.5 - i) = -3 + 4i + 0.5 - i
        let (zx, zy) = f.apply(0.5, -1.0, 1.0, 2.0);
        assert_eq!((zx, zy), (-2.5, 3.0));
    }

    #[test]
    fn tricorn_conjugates_before_squaring() {
        let m = EscapeFunction::Mandelbrot.apply(0.0, 0.0, 1.0, 2.0);
        let t = EscapeFunction::Tricorn.apply(0.0, 0.0, 1.0, 2.0);
        assert_eq!(t.0, m.0);
        assert_eq!(t.1, -m.1);
    }

    #[test]
    fn burning_ship_folds_the_cross_term() {
        let (_, zy) = EscapeFunction::BurningShip.apply(0.0, 0.0, -1.0, 2.0);
        assert_eq!(zy, 4.0);
    }

    #[test]
    fn multibrot_matches_cubic_at_degree_three() {
        let cubic = EscapeFunction::Multibrot3.apply(0.1, -0.2, 0.7, -0.3);
        let general = EscapeFunction::Multibrot { d: 3.0 }.apply(0.1, -0.2, 0.7, -0.3);
        assert!((cubic.0 - general.0).abs() < 1e-12);
        assert!((cubic.1 - general.1).abs() < 1e-12);
    }

    #[test]
    fn negative_powers_blow_up_at_origin_instead_of_nan() {
        for f in [EscapeFunction::MultibrotNeg1, EscapeFunction::MultibrotNeg2] {
            let (zx, zy) = f.apply(0.0, 0.0, 0.0, 0.0);
            assert!(zx.is_finite() && zy.is_finite());
            assert!(zx * zx + zy * zy > 1e6);
        }
    }

    #[test]
    fn origin_never_escapes_mandelbrot() {
        let i = EscapeFunction::Mandelbrot.escape_iterations(0.0, 0.0, 0.0, 0.0, 1000, 4.0);
        assert_eq!(i, 1000);
    }

    #[test]
    fn far_parameter_escapes_quickly() {
        let i = EscapeFunction::Mandelbrot.escape_iterations(2.0, 2.0, 0.0, 0.0, 1000, 4.0);
        assert!(i < 5);
    }

    #[test]
    fn already_escaped_state_counts_zero_iterations() {
        let i = EscapeFunction::Mandelbrot.escape_iterations(0.0, 0.0, 10.0, 0.0, 1000, 4.0);
        assert_eq!(i, 0);
    }
}
