use crate::quaternion::{Quat, ONE, ZERO};
use serde::{Deserialize, Serialize};

/// An oriented 2D plane embedded in 4D space, acting as the camera.
///
/// Any 4D rotation decomposes (up to a global sign) into a left- and a
/// right-isoclinic rotation applied as `p -> L * p * R`. The plane stores
/// that pair together with its center position and pixel-per-unit scales.
///
/// Projection through the plane is hot (the sampling engine projects on the
/// order of 10^7..10^9 points per pass), so the orientation is first
/// compiled into a [`ProjectionMatrix`]: one 4x4 matrix-vector product per
/// point instead of several quaternion multiplications. The compiled value
/// is a snapshot: mutate the plane, compile again. Workers share it
/// read-only for the duration of a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plane4 {
    pub position: Quat,
    pub left_iso: Quat,
    pub right_iso: Quat,
    pub scale_x: f64,
    pub scale_y: f64,
}

/// Perspective settings for [`ProjectionMatrix::project_pixel_perspective`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Perspective {
    pub focal_length: f64,
    /// Upper bound on the magnification applied to near points. Zero or
    /// negative disables the clamp.
    pub max_scaling: f64,
    /// Keep points with negative depth components instead of rejecting them.
    pub allow_behind: bool,
}

/// Depths below this are rejected by the perspective projection to avoid
/// dividing by a vanishing distance.
const MIN_PERSPECTIVE_DEPTH: f64 = 1e-5;

impl Plane4 {
    pub fn new(position: Quat, left_iso: Quat, right_iso: Quat, scale_x: f64, scale_y: f64) -> Self {
        Self {
            position,
            left_iso,
            right_iso,
            scale_x,
            scale_y,
        }
    }

    /// Axis-aligned plane through the origin sized so a width x height
    /// image spans four units per axis.
    pub fn front_facing(width: u32, height: u32) -> Self {
        Self::new(ZERO, ONE, ONE, width as f64 / 4.0, height as f64 / 4.0)
    }

    /// Projects a point to plane-local coordinates without the compiled
    /// matrix: translate by -position, then apply `L^-1 * p * R^-1`.
    /// (q0, q1) of the result are the plane coordinates, (q2, q3) depth.
    pub fn project(&self, point: Quat) -> Quat {
        let p = point - self.position;
        self.left_iso.inverse().normalize() * p * self.right_iso.inverse().normalize()
    }

    /// Compiles the orientation into the 4x4 matrix equivalent to
    /// left/right multiplication by the normalized inverses of the
    /// isoclinic pair, expanded from the biquaternion product.
    pub fn compile(&self) -> ProjectionMatrix {
        let l = self.left_iso.inverse().normalize();
        let r = self.right_iso.inverse().normalize();
        let (a, b, c, d) = (l.q0, l.q1, l.q2, l.q3);
        let (p, q, rr, s) = (r.q0, r.q1, r.q2, r.q3);

        #[rustfmt::skip]
        let m = [
            [a*p - b*q - c*rr - d*s, -a*q - b*p + c*s - d*rr, -a*rr - b*s - c*p + d*q, -a*s + b*rr - c*q - d*p],
            [b*p + a*q - d*rr + c*s, -b*q + a*p + d*s + c*rr, -b*rr + a*s - d*p - c*q, -b*s - a*rr - d*q + c*p],
            [c*p + d*q + a*rr - b*s, -c*q + d*p - a*s - b*rr, -c*rr + d*s + a*p + b*q, -c*s - d*rr + a*q - b*p],
            [d*p - c*q + b*rr + a*s, -d*q - c*p - b*s + a*rr, -d*rr - c*s + b*p - a*q, -d*s + c*rr + b*q + a*p],
        ];

        ProjectionMatrix {
            m,
            position: self.position,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
        }
    }

    /// Maps a (possibly fractional) pixel position back to the 4D point it
    /// views: scale to plane-local coordinates, orient with `L * p * R`,
    /// translate by the position. Inverse of [`Plane4::project`].
    pub fn point_at_pixel(&self, x: f64, y: f64, width: u32, height: u32) -> Quat {
        let local = Quat::new(
            (x - width as f64 / 2.0) / self.scale_x,
            (y - height as f64 / 2.0) / self.scale_y,
            0.0,
            0.0,
        );
        self.left_iso * local * self.right_iso + self.position
    }

    /// Rotates about the xy-plane.
    pub fn rotate_xy(&mut self, angle: f64) {
        let (sin, cos) = (angle / 2.0).sin_cos();
        let rotor = Quat::new(cos, sin, 0.0, 0.0);
        self.left_iso = self.left_iso * rotor;
        self.right_iso = rotor * self.right_iso;
    }

    /// Rotates about the zw-plane: same rotor as xy on the left, opposing
    /// sign on the right. The matched/opposed sign split across the six
    /// generators is what makes them independent and span SO(4).
    pub fn rotate_zw(&mut self, angle: f64) {
        let (sin, cos) = (angle / 2.0).sin_cos();
        self.left_iso = self.left_iso * Quat::new(cos, sin, 0.0, 0.0);
        self.right_iso = Quat::new(cos, -sin, 0.0, 0.0) * self.right_iso;
    }

    /// Rotates about the xz-plane.
    pub fn rotate_xz(&mut self, angle: f64) {
        let (sin, cos) = (angle / 2.0).sin_cos();
        let rotor = Quat::new(cos, 0.0, sin, 0.0);
        self.left_iso = self.left_iso * rotor;
        self.right_iso = rotor * self.right_iso;
    }

    /// Rotates about the yw-plane.
    pub fn rotate_yw(&mut self, angle: f64) {
        let (sin, cos) = (angle / 2.0).sin_cos();
        self.left_iso = self.left_iso * Quat::new(cos, 0.0, sin, 0.0);
        self.right_iso = Quat::new(cos, 0.0, -sin, 0.0) * self.right_iso;
    }

    /// Rotates about the xw-plane.
    pub fn rotate_xw(&mut self, angle: f64) {
        let (sin, cos) = (angle / 2.0).sin_cos();
        let rotor = Quat::new(cos, 0.0, 0.0, sin);
        self.left_iso = self.left_iso * rotor;
        self.right_iso = rotor * self.right_iso;
    }

    /// Rotates about the yz-plane.
    pub fn rotate_yz(&mut self, angle: f64) {
        let (sin, cos) = (angle / 2.0).sin_cos();
        self.left_iso = self.left_iso * Quat::new(cos, 0.0, 0.0, sin);
        self.right_iso = Quat::new(cos, 0.0, 0.0, -sin) * self.right_iso;
    }

    /// Moves the plane along the world axes.
    pub fn move_absolute(&mut self, delta: Quat) {
        self.position = self.position + delta;
    }

    /// Moves the plane along its own (rotated) axes: the delta is carried
    /// through the orientation before being added.
    pub fn move_relative(&mut self, delta: Quat) {
        self.position = self.position + self.left_iso * delta * self.right_iso;
    }

    pub fn scale_by(&mut self, factor_x: f64, factor_y: f64) {
        self.scale_x *= factor_x;
        self.scale_y *= factor_y;
    }

    /// Component-wise linear blend. Cheap, not norm-preserving along the
    /// way; the orientation quaternions are re-normalized after blending.
    /// Good enough for interactive dragging, not for constant-velocity
    /// camera paths.
    pub fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        Self {
            position: a.position * (1.0 - t) + b.position * t,
            left_iso: (a.left_iso * (1.0 - t) + b.left_iso * t).normalize(),
            right_iso: (a.right_iso * (1.0 - t) + b.right_iso * t).normalize(),
            scale_x: a.scale_x * (1.0 - t) + b.scale_x * t,
            scale_y: a.scale_y * (1.0 - t) + b.scale_y * t,
        }
    }

    /// True spherical interpolation on both isoclinic components, linear on
    /// position and scale. Constant angular velocity, used for animation
    /// paths. The double-cover sign is corrected jointly: both components
    /// flip or neither does, since `(L, R)` and `(-L, -R)` encode the same
    /// rotation but mixed signs do not.
    pub fn slerp(a: &Self, b: &Self, t: f64) -> Self {
        let mut l2 = b.left_iso;
        let mut r2 = b.right_iso;
        if a.left_iso.dot(l2) < 0.0 && a.right_iso.dot(r2) < 0.0 {
            l2 = -l2;
            r2 = -r2;
        }
        Self {
            position: a.position * (1.0 - t) + b.position * t,
            left_iso: Quat::slerp_aligned(a.left_iso, l2, t),
            right_iso: Quat::slerp_aligned(a.right_iso, r2, t),
            scale_x: a.scale_x * (1.0 - t) + b.scale_x * t,
            scale_y: a.scale_y * (1.0 - t) + b.scale_y * t,
        }
    }

    /// The 14 scalar fields in persistence order:
    /// position, left_iso, right_iso (4 each), then the two scales.
    pub fn to_fields(&self) -> [f64; 14] {
        [
            self.position.q0,
            self.position.q1,
            self.position.q2,
            self.position.q3,
            self.left_iso.q0,
            self.left_iso.q1,
            self.left_iso.q2,
            self.left_iso.q3,
            self.right_iso.q0,
            self.right_iso.q1,
            self.right_iso.q2,
            self.right_iso.q3,
            self.scale_x,
            self.scale_y,
        ]
    }

    pub fn from_fields(v: [f64; 14]) -> Self {
        Self::new(
            Quat::new(v[0], v[1], v[2], v[3]),
            Quat::new(v[4], v[5], v[6], v[7]),
            Quat::new(v[8], v[9], v[10], v[11]),
            v[12],
            v[13],
        )
    }
}

/// A compiled snapshot of a [`Plane4`]'s projection: the 4x4 orientation
/// matrix plus the position and scales it was derived from.
#[derive(Debug, Clone)]
pub struct ProjectionMatrix {
    m: [[f64; 4]; 4],
    position: Quat,
    scale_x: f64,
    scale_y: f64,
}

impl ProjectionMatrix {
    /// Plane-local coordinates of a point; equivalent to
    /// [`Plane4::project`] for the orientation this was compiled from.
    pub fn project(&self, point: Quat) -> Quat {
        let a = point.q0 - self.position.q0;
        let b = point.q1 - self.position.q1;
        let c = point.q2 - self.position.q2;
        let d = point.q3 - self.position.q3;
        let m = &self.m;
        Quat::new(
            m[0][0] * a + m[0][1] * b + m[0][2] * c + m[0][3] * d,
            m[1][0] * a + m[1][1] * b + m[1][2] * c + m[1][3] * d,
            m[2][0] * a + m[2][1] * b + m[2][2] * c + m[2][3] * d,
            m[3][0] * a + m[3][1] * b + m[3][2] * c + m[3][3] * d,
        )
    }

    /// Orthographic pixel projection: (q2, q3) depth is discarded, (q0, q1)
    /// are scaled and centered. Returns `None` when the pixel falls outside
    /// the width x height raster.
    pub fn project_pixel(&self, point: Quat, width: u32, height: u32) -> Option<(u32, u32)> {
        let projected = self.project(point);
        let px = (projected.q0 * self.scale_x + width as f64 / 2.0) as i64;
        let py = (projected.q1 * self.scale_y + height as f64 / 2.0) as i64;
        if px >= 0 && px < width as i64 && py >= 0 && py < height as i64 {
            Some((px as u32, py as u32))
        } else {
            None
        }
    }

    /// Perspective pixel projection: x and y are divided by the depth
    /// magnitude `sqrt(q2^2 + q3^2)` scaled by the focal length. Points
    /// behind the camera are rejected unless allowed, as is near-zero
    /// depth.
    pub fn project_pixel_perspective(
        &self,
        point: Quat,
        width: u32,
        height: u32,
        persp: &Perspective,
    ) -> Option<(u32, u32)> {
        let projected = self.project(point);
        if !persp.allow_behind && (projected.q2 < 0.0 || projected.q3 < 0.0) {
            return None;
        }
        let distance = (projected.q2 * projected.q2 + projected.q3 * projected.q3).sqrt();
        if distance < MIN_PERSPECTIVE_DEPTH {
            return None;
        }

        let divisor = if persp.max_scaling > 0.0 {
            distance.max(persp.focal_length / persp.max_scaling)
        } else {
            distance
        };
        let proj_x = projected.q0 * persp.focal_length / divisor;
        let proj_y = projected.q1 * persp.focal_length / divisor;

        let px = (proj_x * self.scale_x + width as f64 / 2.0) as i64;
        let py = (proj_y * self.scale_y + height as f64 / 2.0) as i64;
        if px >= 0 && px < width as i64 && py >= 0 && py < height as i64 {
            Some((px as u32, py as u32))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-9;

    fn assert_quat_close(a: Quat, b: Quat, tol: f64) {
        assert!(
            (a.q0 - b.q0).abs() < tol
                && (a.q1 - b.q1).abs() < tol
                && (a.q2 - b.q2).abs() < tol
                && (a.q3 - b.q3).abs() < tol,
            "{a:?} != {b:?}"
        );
    }

    fn twisted_plane() -> Plane4 {
        let mut plane = Plane4::front_facing(200, 200);
        plane.rotate_xy(0.37);
        plane.rotate_xz(-0.81);
        plane.rotate_yw(1.13);
        plane.rotate_zw(0.25);
        plane.rotate_xw(-0.59);
        plane.rotate_yz(2.02);
        plane.move_absolute(Quat::new(0.3, -0.2, 0.7, -1.1));
        plane
    }

    #[test]
    fn compiled_projection_matches_direct() {
        let plane = twisted_plane();
        let compiled = plane.compile();

        let points = [
            Quat::new(0.0, 0.0, 0.0, 0.0),
            Quat::new(1.0, 0.0, 0.0, 0.0),
            Quat::new(-0.5, 0.25, 1.5, -2.0),
            Quat::new(3.0, -1.0, 0.125, 0.75),
        ];
        for p in points {
            assert_quat_close(compiled.project(p), plane.project(p), TOL);
        }
    }

    #[test]
    fn compiled_projection_matches_direct_for_identity_orientation() {
        let plane = Plane4::front_facing(100, 100);
        let compiled = plane.compile();
        let p = Quat::new(0.5, -0.25, 1.0, 2.0);
        assert_quat_close(compiled.project(p), p, TOL);
        assert_quat_close(plane.project(p), p, TOL);
    }

    #[test]
    fn point_at_pixel_round_trips_through_projection() {
        let plane = twisted_plane();
        let compiled = plane.compile();

        let point = plane.point_at_pixel(37.0, 151.0, 200, 200);
        let local = compiled.project(point);

        assert!((local.q0 * plane.scale_x + 100.0 - 37.0).abs() < 1e-6);
        assert!((local.q1 * plane.scale_y + 100.0 - 151.0).abs() < 1e-6);
        // The pixel lies on the plane, so depth vanishes.
        assert!(local.q2.abs() < 1e-6 && local.q3.abs() < 1e-6);
    }

    #[test]
    fn project_pixel_rejects_out_of_range() {
        let plane = Plane4::front_facing(100, 100);
        let compiled = plane.compile();
        // scale is 25 px/unit, so q0 = 4 maps to x = 150.
        assert_eq!(compiled.project_pixel(Quat::new(4.0, 0.0, 0.0, 0.0), 100, 100), None);
        assert_eq!(
            compiled.project_pixel(Quat::new(0.0, 0.0, 0.0, 0.0), 100, 100),
            Some((50, 50))
        );
    }

    #[test]
    fn project_pixel_ignores_depth_orthographically() {
        let plane = Plane4::front_facing(100, 100);
        let compiled = plane.compile();
        let shallow = compiled.project_pixel(Quat::new(1.0, 1.0, 0.0, 0.0), 100, 100);
        let deep = compiled.project_pixel(Quat::new(1.0, 1.0, 57.0, -3.0), 100, 100);
        assert_eq!(shallow, deep);
    }

    #[test]
    fn perspective_rejects_behind_camera_and_near_zero_depth() {
        let plane = Plane4::front_facing(100, 100);
        let compiled = plane.compile();
        let persp = Perspective {
            focal_length: 1.0,
            max_scaling: 0.0,
            allow_behind: false,
        };
        assert_eq!(
            compiled.project_pixel_perspective(Quat::new(0.0, 0.0, -1.0, 1.0), 100, 100, &persp),
            None
        );
        assert_eq!(
            compiled.project_pixel_perspective(Quat::new(0.0, 0.0, 1e-7, 1e-7), 100, 100, &persp),
            None
        );
    }

    #[test]
    fn perspective_shrinks_distant_points() {
        let plane = Plane4::front_facing(100, 100);
        let compiled = plane.compile();
        let persp = Perspective {
            focal_length: 1.0,
            max_scaling: 0.0,
            allow_behind: false,
        };
        let near = compiled
            .project_pixel_perspective(Quat::new(1.0, 0.0, 1.0, 0.0), 100, 100, &persp)
            .unwrap();
        let far = compiled
            .project_pixel_perspective(Quat::new(1.0, 0.0, 3.0, 0.0), 100, 100, &persp)
            .unwrap();
        assert!(far.0 < near.0);
        assert!(far.0 >= 50);
    }

    #[test]
    fn rotations_keep_isoclinic_pair_unit() {
        let plane = twisted_plane();
        assert!((plane.left_iso.norm() - 1.0).abs() < TOL);
        assert!((plane.right_iso.norm() - 1.0).abs() < TOL);
    }

    #[test]
    fn opposite_rotations_cancel() {
        let mut plane = Plane4::front_facing(100, 100);
        plane.rotate_yw(0.7);
        plane.rotate_yw(-0.7);
        assert_quat_close(plane.left_iso, ONE, TOL);
        assert_quat_close(plane.right_iso, ONE, TOL);
    }

    #[test]
    fn relative_move_matches_absolute_when_unrotated() {
        let mut a = Plane4::front_facing(100, 100);
        let mut b = Plane4::front_facing(100, 100);
        a.move_absolute(Quat::new(0.0, 0.0, 1.5, 0.0));
        b.move_relative(Quat::new(0.0, 0.0, 1.5, 0.0));
        assert_quat_close(a.position, b.position, TOL);
    }

    #[test]
    fn relative_move_follows_orientation() {
        let mut plane = Plane4::front_facing(100, 100);
        plane.rotate_xy(std::f64::consts::FRAC_PI_2);
        plane.move_relative(Quat::new(1.0, 0.0, 0.0, 0.0));
        // The plane's x axis now points along world y.
        assert_quat_close(plane.position, Quat::new(0.0, 1.0, 0.0, 0.0), TOL);
    }

    #[test]
    fn lerp_and_slerp_hit_endpoints() {
        let a = Plane4::front_facing(100, 100);
        let b = twisted_plane();
        for (f, name) in [(Plane4::lerp as fn(&_, &_, f64) -> _, "lerp"), (Plane4::slerp, "slerp")] {
            let start = f(&a, &b, 0.0);
            let end = f(&a, &b, 1.0);
            assert_quat_close(start.position, a.position, TOL);
            assert_quat_close(end.position, b.position, TOL);
            assert!((end.scale_x - b.scale_x).abs() < TOL, "{name} end scale");
            assert_quat_close(end.left_iso, b.left_iso, 1e-6);
            assert_quat_close(end.right_iso, b.right_iso, 1e-6);
        }
    }

    #[test]
    fn slerp_keeps_orientation_unit_midway() {
        let a = Plane4::front_facing(100, 100);
        let b = twisted_plane();
        let mid = Plane4::slerp(&a, &b, 0.5);
        assert!((mid.left_iso.norm() - 1.0).abs() < TOL);
        assert!((mid.right_iso.norm() - 1.0).abs() < TOL);
    }

    #[test]
    fn field_round_trip() {
        let plane = twisted_plane();
        let restored = Plane4::from_fields(plane.to_fields());
        assert_eq!(plane, restored);
    }

    #[test]
    fn json_round_trip() {
        let plane = twisted_plane();
        let json = serde_json::to_string(&plane).unwrap();
        let restored: Plane4 = serde_json::from_str(&json).unwrap();
        assert_eq!(plane, restored);
    }
}
