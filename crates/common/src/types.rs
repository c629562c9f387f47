use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in world units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub mins: Vec3,
    pub maxs: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self {
            mins: Vec3::ZERO,
            maxs: Vec3::ZERO,
        }
    }
}

impl Aabb {
    /// Empty box: any union with it yields the other operand.
    pub const INVERTED: Self = Self {
        mins: Vec3::splat(f32::MAX),
        maxs: Vec3::splat(-f32::MAX),
    };

    pub const fn new(mins: Vec3, maxs: Vec3) -> Self {
        Self { mins, maxs }
    }

    pub fn from_center_half_extents(center: Vec3, half: Vec3) -> Self {
        Self::new(center - half, center + half)
    }

    pub fn is_valid(&self) -> bool {
        self.mins.cmple(self.maxs).all()
    }

    pub fn union(&self, other: &Aabb) -> Self {
        Self::new(self.mins.min(other.mins), self.maxs.max(other.maxs))
    }

    pub fn center(&self) -> Vec3 {
        (self.mins + self.maxs) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.maxs - self.mins
    }

    /// Largest edge length.
    pub fn max_extent(&self) -> f32 {
        self.size().abs().max_element()
    }

    pub fn volume(&self) -> f32 {
        let s = self.size();
        s.x * s.y * s.z
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.mins.cmple(other.maxs).all() && other.mins.cmple(self.maxs).all()
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        self.mins.cmple(p).all() && p.cmple(self.maxs).all()
    }

    /// Squared distance from `p` to the nearest point of the box; zero inside.
    pub fn dist_sq_to_point(&self, p: Vec3) -> f32 {
        let nearest = p.max(self.mins).min(self.maxs);
        (p - nearest).length_squared()
    }

    pub fn translated(&self, offset: Vec3) -> Self {
        Self::new(self.mins + offset, self.maxs + offset)
    }

    /// Box expanded outward onto a grid of `granularity` units.
    pub fn snapped(&self, granularity: f32) -> Self {
        Self::new(
            (self.mins / granularity).floor() * granularity,
            (self.maxs / granularity).ceil() * granularity,
        )
    }

    /// World-space box enclosing this local box rotated by `angles` and moved to `origin`.
    pub fn transformed(&self, origin: Vec3, angles: Vec3) -> Self {
        if angles == Vec3::ZERO {
            return self.translated(origin);
        }
        let basis = CameraBasis::from_angles(angles);
        let rot = Mat3::from_cols(basis.forward, -basis.right, basis.up);
        let abs_rot = Mat3::from_cols(rot.x_axis.abs(), rot.y_axis.abs(), rot.z_axis.abs());
        let center = rot * self.center() + origin;
        let extents = abs_rot * (self.size() * 0.5);
        Self::new(center - extents, center + extents)
    }
}

/// Plane in `normal . p = dist` form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub normal: Vec3,
    pub dist: f32,
}

impl Plane {
    pub const fn new(normal: Vec3, dist: f32) -> Self {
        Self { normal, dist }
    }

    /// Signed distance; positive on the side the normal points to.
    pub fn distance_to(&self, p: Vec3) -> f32 {
        self.normal.dot(p) - self.dist
    }

    pub fn reflect_point(&self, p: Vec3) -> Vec3 {
        p - self.normal * (2.0 * self.distance_to(p))
    }

    pub fn reflect_vector(&self, v: Vec3) -> Vec3 {
        v - self.normal * (2.0 * v.dot(self.normal))
    }

    pub fn flipped(&self) -> Self {
        Self::new(-self.normal, -self.dist)
    }
}

/// Orthonormal camera axes. World is x forward, y left, z up; angles are
/// (pitch, yaw, roll) in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraBasis {
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
}

impl CameraBasis {
    pub fn from_angles(angles: Vec3) -> Self {
        let (sp, cp) = angles.x.to_radians().sin_cos();
        let (sy, cy) = angles.y.to_radians().sin_cos();
        let (sr, cr) = angles.z.to_radians().sin_cos();
        Self {
            forward: Vec3::new(cp * cy, cp * sy, -sp),
            right: Vec3::new(
                -sr * sp * cy + cr * sy,
                -sr * sp * sy - cr * cy,
                -sr * cp,
            ),
            up: Vec3::new(cr * sp * cy + sr * sy, cr * sp * sy - sr * cy, cr * cp),
        }
    }
}

/// Inverse of [`CameraBasis::from_angles`] given a forward and an up vector.
pub fn vector_angles(forward: Vec3, up: Vec3) -> Vec3 {
    let left = up.cross(forward).normalize_or_zero();
    let xy_dist = (forward.x * forward.x + forward.y * forward.y).sqrt();
    if xy_dist > 0.001 {
        let yaw = forward.y.atan2(forward.x).to_degrees();
        let pitch = (-forward.z).atan2(xy_dist).to_degrees();
        let up_z = left.y * forward.x - left.x * forward.y;
        let roll = left.z.atan2(up_z).to_degrees();
        Vec3::new(pitch, yaw, roll)
    } else {
        let yaw = (-left.x).atan2(left.y).to_degrees();
        let pitch = (-forward.z).atan2(xy_dist).to_degrees();
        Vec3::new(pitch, yaw, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn inverted_box_is_union_identity() {
        let b = Aabb::new(Vec3::splat(-1.0), Vec3::splat(2.0));
        assert!(!Aabb::INVERTED.is_valid());
        assert_eq!(Aabb::INVERTED.union(&b), b);
    }

    #[test]
    fn dist_sq_is_zero_inside_and_squared_outside() {
        let b = Aabb::new(Vec3::ZERO, Vec3::splat(10.0));
        assert_eq!(b.dist_sq_to_point(Vec3::splat(5.0)), 0.0);
        assert_eq!(b.dist_sq_to_point(Vec3::new(13.0, 5.0, 14.0)), 9.0 + 16.0);
    }

    #[test]
    fn snapped_grows_to_grid() {
        let b = Aabb::new(Vec3::new(1.0, -1.0, 0.0), Vec3::new(33.0, 5.0, 32.0));
        let s = b.snapped(32.0);
        assert_eq!(s.mins, Vec3::new(0.0, -32.0, 0.0));
        assert_eq!(s.maxs, Vec3::new(64.0, 32.0, 32.0));
    }

    #[test]
    fn yaw_ninety_rotates_box_extents() {
        let local = Aabb::new(Vec3::new(-10.0, -2.0, 0.0), Vec3::new(10.0, 2.0, 4.0));
        let world = local.transformed(Vec3::new(100.0, 0.0, 0.0), Vec3::new(0.0, 90.0, 0.0));
        assert_abs_diff_eq!(world.mins.x, 98.0, epsilon = 1e-4);
        assert_abs_diff_eq!(world.maxs.y, 10.0, epsilon = 1e-4);
        assert_abs_diff_eq!(world.maxs.z, 4.0, epsilon = 1e-4);
    }

    #[test]
    fn basis_at_zero_angles() {
        let b = CameraBasis::from_angles(Vec3::ZERO);
        assert!(b.forward.abs_diff_eq(Vec3::X, 1e-6));
        assert!(b.right.abs_diff_eq(Vec3::NEG_Y, 1e-6));
        assert!(b.up.abs_diff_eq(Vec3::Z, 1e-6));
    }

    #[test]
    fn vector_angles_inverts_basis() {
        let angles = Vec3::new(10.0, 30.0, 5.0);
        let b = CameraBasis::from_angles(angles);
        let back = vector_angles(b.forward, b.up);
        assert_abs_diff_eq!(back.x, angles.x, epsilon = 1e-3);
        assert_abs_diff_eq!(back.y, angles.y, epsilon = 1e-3);
        assert_abs_diff_eq!(back.z, angles.z, epsilon = 1e-3);
    }

    #[test]
    fn plane_reflection() {
        let floor = Plane::new(Vec3::Z, 10.0);
        assert_eq!(floor.reflect_point(Vec3::new(1.0, 2.0, 15.0)), Vec3::new(1.0, 2.0, 5.0));
        assert_eq!(floor.reflect_vector(Vec3::new(1.0, 0.0, -1.0)), Vec3::new(1.0, 0.0, 1.0));
        assert_eq!(floor.flipped().distance_to(Vec3::new(0.0, 0.0, 4.0)), 6.0);
    }
}
