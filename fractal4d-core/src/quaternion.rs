use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

/// A quaternion `q0 + q1*i + q2*j + q3*k` over f64.
///
/// Doubles as a plain 4D point: the camera treats (q0, q1) as the
/// plane axes and (q2, q3) as depth, and the escape functions treat
/// (q0, q1) as parameter coordinates and (q2, q3) as state coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub q0: f64,
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
}

pub const ONE: Quat = Quat::new(1.0, 0.0, 0.0, 0.0);
pub const ZERO: Quat = Quat::new(0.0, 0.0, 0.0, 0.0);

/// Dot products above this are treated as "nearly parallel" by slerp,
/// which then falls back to normalized lerp to avoid dividing by a
/// vanishing sin(omega).
const SLERP_LERP_THRESHOLD: f64 = 0.9995;

impl Quat {
    pub const fn new(q0: f64, q1: f64, q2: f64, q3: f64) -> Self {
        Self { q0, q1, q2, q3 }
    }

    pub fn conjugate(self) -> Self {
        Self::new(self.q0, -self.q1, -self.q2, -self.q3)
    }

    pub fn norm_sqr(self) -> f64 {
        self.q0 * self.q0 + self.q1 * self.q1 + self.q2 * self.q2 + self.q3 * self.q3
    }

    pub fn norm(self) -> f64 {
        self.norm_sqr().sqrt()
    }

    pub fn dot(self, other: Self) -> f64 {
        self.q0 * other.q0 + self.q1 * other.q1 + self.q2 * other.q2 + self.q3 * other.q3
    }

    /// Scales to unit norm. The zero quaternion has no direction and is
    /// returned unchanged rather than producing NaNs.
    pub fn normalize(self) -> Self {
        let n = self.norm();
        if n == 0.0 {
            return self;
        }
        self * (1.0 / n)
    }

    /// Multiplicative inverse: conjugate / |q|^2.
    pub fn inverse(self) -> Self {
        let n2 = self.norm_sqr();
        self.conjugate() * (1.0 / n2)
    }

    /// Raises the quaternion to a real power via the polar form
    /// `q = r * (cos(phi) + n * sin(phi))`, so
    /// `q^p = r^p * (cos(p*phi) + n * sin(p*phi))`.
    ///
    /// `0^p = 0`, and a quaternion with zero vector part degenerates to a
    /// real power of its scalar part.
    pub fn powf(self, power: f64) -> Self {
        let r = self.norm();
        if r == 0.0 {
            return ZERO;
        }
        let v = Self::new(0.0, self.q1, self.q2, self.q3);
        let v_norm = v.norm();
        if v_norm == 0.0 {
            return Self::new(self.q0.powf(power), 0.0, 0.0, 0.0);
        }
        let n_hat = v * (1.0 / v_norm);
        let phi = (self.q0 / r).acos();

        let r_pow = r.powf(power);
        let (sin_p_phi, cos_p_phi) = (power * phi).sin_cos();
        Self::new(
            r_pow * cos_p_phi,
            r_pow * n_hat.q1 * sin_p_phi,
            r_pow * n_hat.q2 * sin_p_phi,
            r_pow * n_hat.q3 * sin_p_phi,
        )
    }

    /// Spherical interpolation along the shortest arc, flipping `b`'s sign
    /// if the two quaternions are more than 90 degrees apart.
    pub fn slerp(a: Self, b: Self, t: f64) -> Self {
        let dot = a.dot(b);
        if dot < 0.0 {
            Self::slerp_aligned(a, -b, t)
        } else {
            Self::slerp_aligned(a, b, t)
        }
    }

    /// Spherical interpolation without sign correction. Callers that manage
    /// the double-cover sign jointly across two quaternions (the camera's
    /// isoclinic pair) use this directly.
    pub fn slerp_aligned(a: Self, b: Self, t: f64) -> Self {
        let dot = a.dot(b).clamp(-1.0, 1.0);
        if dot > SLERP_LERP_THRESHOLD {
            return (a * (1.0 - t) + b * t).normalize();
        }
        let omega = dot.acos();
        let sin_omega = omega.sin();
        (a * (((1.0 - t) * omega).sin() / sin_omega) + b * ((t * omega).sin() / sin_omega))
            .normalize()
    }
}

impl Add for Quat {
    type Output = Quat;

    fn add(self, rhs: Quat) -> Quat {
        Quat::new(
            self.q0 + rhs.q0,
            self.q1 + rhs.q1,
            self.q2 + rhs.q2,
            self.q3 + rhs.q3,
        )
    }
}

impl Sub for Quat {
    type Output = Quat;

    fn sub(self, rhs: Quat) -> Quat {
        Quat::new(
            self.q0 - rhs.q0,
            self.q1 - rhs.q1,
            self.q2 - rhs.q2,
            self.q3 - rhs.q3,
        )
    }
}

impl Neg for Quat {
    type Output = Quat;

    fn neg(self) -> Quat {
        Quat::new(-self.q0, -self.q1, -self.q2, -self.q3)
    }
}

impl Mul<f64> for Quat {
    type Output = Quat;

    fn mul(self, rhs: f64) -> Quat {
        Quat::new(self.q0 * rhs, self.q1 * rhs, self.q2 * rhs, self.q3 * rhs)
    }
}

/// Hamilton product.
impl Mul for Quat {
    type Output = Quat;

    fn mul(self, rhs: Quat) -> Quat {
        Quat::new(
            self.q0 * rhs.q0 - self.q1 * rhs.q1 - self.q2 * rhs.q2 - self.q3 * rhs.q3,
            self.q0 * rhs.q1 + self.q1 * rhs.q0 + self.q2 * rhs.q3 - self.q3 * rhs.q2,
            self.q0 * rhs.q2 - self.q1 * rhs.q3 + self.q2 * rhs.q0 + self.q3 * rhs.q1,
            self.q0 * rhs.q3 + self.q1 * rhs.q2 - self.q2 * rhs.q1 + self.q3 * rhs.q0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-12;

    fn assert_quat_close(a: Quat, b: Quat, tol: f64) {
        assert!(
            (a.q0 - b.q0).abs() < tol
                && (a.q1 - b.q1).abs() < tol
                && (a.q2 - b.q2).abs() < tol
                && (a.q3 - b.q3).abs() < tol,
            "{a:?} != {b:?}"
        );
    }

    #[test]
    fn hamilton_product_of_basis_elements() {
        let i = Quat::new(0.0, 1.0, 0.0, 0.0);
        let j = Quat::new(0.0, 0.0, 1.0, 0.0);
        let k = Quat::new(0.0, 0.0, 0.0, 1.0);

        assert_quat_close(i * j, k, TOL);
        assert_quat_close(j * i, -k, TOL);
        assert_quat_close(i * i, -ONE, TOL);
        assert_quat_close(j * j, -ONE, TOL);
        assert_quat_close(k * k, -ONE, TOL);
    }

    #[test]
    fn inverse_times_self_is_identity() {
        let q = Quat::new(0.3, -1.2, 0.8, 2.5);
        assert_quat_close(q * q.inverse(), ONE, TOL);
        assert_quat_close(q.inverse() * q, ONE, TOL);
    }

    #[test]
    fn pow_one_is_identity_map() {
        let q = Quat::new(0.7, -0.2, 1.1, 0.4);
        assert_quat_close(q.powf(1.0), q, 1e-9);
    }

    #[test]
    fn pow_zero_is_one() {
        let q = Quat::new(0.7, -0.2, 1.1, 0.4);
        assert_quat_close(q.powf(0.0), ONE, TOL);
    }

    #[test]
    fn pow_of_zero_is_zero() {
        assert_quat_close(ZERO.powf(3.5), ZERO, TOL);
    }

    #[test]
    fn pow_of_all_ones_squared() {
        let q = Quat::new(1.0, 1.0, 1.0, 1.0);
        assert_quat_close(q.powf(2.0), Quat::new(-2.0, 2.0, 2.0, 2.0), TOL);
    }

    #[test]
    fn pow_of_all_ones_inverted() {
        let q = Quat::new(1.0, 1.0, 1.0, 1.0);
        assert_quat_close(q.powf(-1.0), Quat::new(0.25, -0.25, -0.25, -0.25), TOL);
    }

    #[test]
    fn pow_of_pure_real_degenerates_to_real_power() {
        let q = Quat::new(3.0, 0.0, 0.0, 0.0);
        assert_quat_close(q.powf(2.0), Quat::new(9.0, 0.0, 0.0, 0.0), TOL);
    }

    #[test]
    fn pow_matches_repeated_multiplication() {
        let q = Quat::new(0.5, 0.5, -0.25, 0.1);
        assert_quat_close(q.powf(3.0), q * q * q, 1e-9);
    }

    #[test]
    fn normalize_produces_unit_norm() {
        let q = Quat::new(2.0, -3.0, 4.0, -5.0).normalize();
        assert!((q.norm() - 1.0).abs() < TOL);
    }

    #[test]
    fn normalize_of_zero_stays_zero() {
        assert_quat_close(ZERO.normalize(), ZERO, TOL);
    }

    #[test]
    fn slerp_endpoints() {
        let a = Quat::new(1.0, 0.0, 0.0, 0.0);
        let b = Quat::new(0.0, 1.0, 0.0, 0.0);
        assert_quat_close(Quat::slerp(a, b, 0.0), a, 1e-9);
        assert_quat_close(Quat::slerp(a, b, 1.0), b, 1e-9);
    }

    #[test]
    fn slerp_midpoint_is_unit_and_symmetric() {
        let a = Quat::new(1.0, 0.0, 0.0, 0.0);
        let b = Quat::new(0.0, 0.0, 1.0, 0.0);
        let mid = Quat::slerp(a, b, 0.5);
        assert!((mid.norm() - 1.0).abs() < TOL);
        assert!((mid.q0 - mid.q2).abs() < TOL);
    }

    #[test]
    fn slerp_takes_shortest_arc() {
        let a = Quat::new(1.0, 0.0, 0.0, 0.0);
        let b = -Quat::new(0.999, 0.01, 0.0, 0.0).normalize();
        let mid = Quat::slerp(a, b, 0.5);
        // Interpolating toward -b's double-cover twin stays near a.
        assert!(mid.q0 > 0.9);
    }
}
