use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::types::{Aabb, CameraBasis, Plane};

/// Orthographic extents in view units around the camera origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrthoRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

/// Sub-rectangle of the full projection, as fractions of the view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OffCenterRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

/// Camera parameters for one view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewSetup {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub origin: Vec3,
    /// (pitch, yaw, roll) in degrees.
    pub angles: Vec3,
    /// Horizontal field of view in degrees.
    pub fov: f32,
    pub fov_viewmodel: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub z_near_viewmodel: f32,
    pub z_far_viewmodel: f32,
    /// Width over height; zero derives it from the pixel rect.
    pub aspect_ratio: f32,
    pub ortho: Option<OrthoRect>,
    pub off_center: Option<OffCenterRect>,
    pub do_bloom_and_tone_mapping: bool,
    pub do_depth_of_field: bool,
}

impl Default for ViewSetup {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 1280,
            height: 720,
            origin: Vec3::ZERO,
            angles: Vec3::ZERO,
            fov: 75.0,
            fov_viewmodel: 54.0,
            z_near: 7.0,
            z_far: 28377.9,
            z_near_viewmodel: 1.0,
            z_far_viewmodel: 1000.0,
            aspect_ratio: 0.0,
            ortho: None,
            off_center: None,
            do_bloom_and_tone_mapping: true,
            do_depth_of_field: false,
        }
    }
}

impl ViewSetup {
    pub fn basis(&self) -> CameraBasis {
        CameraBasis::from_angles(self.angles)
    }

    pub fn aspect(&self) -> f32 {
        if self.aspect_ratio > 0.0 {
            self.aspect_ratio
        } else if self.height > 0 {
            self.width as f32 / self.height as f32
        } else {
            1.0
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        let basis = self.basis();
        Mat4::look_to_rh(self.origin, basis.forward, basis.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        match self.ortho {
            Some(r) => Mat4::orthographic_rh(r.left, r.right, r.bottom, r.top, self.z_near, self.z_far),
            None => {
                let aspect = self.aspect();
                let fov_y = vertical_fov(self.fov, aspect);
                Mat4::perspective_rh(fov_y.to_radians(), aspect, self.z_near, self.z_far)
            }
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn frustum(&self) -> Frustum {
        Frustum::from_view(self)
    }
}

/// Vertical fov in degrees for a horizontal fov and aspect ratio.
pub fn vertical_fov(fov_x: f32, aspect: f32) -> f32 {
    let half = (fov_x.to_radians() * 0.5).tan() / aspect.max(f32::EPSILON);
    2.0 * half.atan().to_degrees()
}

/// Six inward-facing planes bounding a view volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [Plane; 6],
}

impl Frustum {
    pub fn from_view(view: &ViewSetup) -> Self {
        let CameraBasis { forward, right, up } = view.basis();
        let o = view.origin;
        let side = |n: Vec3| {
            let n = n.normalize_or_zero();
            Plane::new(n, n.dot(o))
        };
        let near = Plane::new(forward, forward.dot(o) + view.z_near);
        let far = Plane::new(-forward, -(forward.dot(o) + view.z_far));

        let planes = match view.ortho {
            Some(r) => [
                Plane::new(right, right.dot(o) + r.left),
                Plane::new(-right, -(right.dot(o) + r.right)),
                Plane::new(up, up.dot(o) + r.bottom),
                Plane::new(-up, -(up.dot(o) + r.top)),
                near,
                far,
            ],
            None => {
                let tan_x = (view.fov.to_radians() * 0.5).tan();
                let tan_y = tan_x / view.aspect();
                [
                    side(forward * tan_x + right),
                    side(forward * tan_x - right),
                    side(forward * tan_y + up),
                    side(forward * tan_y - up),
                    near,
                    far,
                ]
            }
        };
        Self { planes }
    }

    pub fn planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    /// True when the box lies entirely outside any plane.
    pub fn cull_box(&self, bounds: &Aabb) -> bool {
        self.planes.iter().any(|p| {
            let positive = Vec3::select(p.normal.cmpge(Vec3::ZERO), bounds.maxs, bounds.mins);
            p.distance_to(positive) < 0.0
        })
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|p| p.distance_to(point) >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn square_view() -> ViewSetup {
        ViewSetup {
            width: 720,
            height: 720,
            fov: 90.0,
            ..ViewSetup::default()
        }
    }

    #[test]
    fn vertical_fov_matches_horizontal_at_square_aspect() {
        assert_abs_diff_eq!(vertical_fov(90.0, 1.0), 90.0, epsilon = 1e-4);
        assert!(vertical_fov(90.0, 16.0 / 9.0) < 90.0);
    }

    #[test]
    fn frustum_culls_box_behind_camera() {
        let f = square_view().frustum();
        let ahead = Aabb::from_center_half_extents(Vec3::new(100.0, 0.0, 0.0), Vec3::splat(5.0));
        let behind = Aabb::from_center_half_extents(Vec3::new(-100.0, 0.0, 0.0), Vec3::splat(5.0));
        assert!(!f.cull_box(&ahead));
        assert!(f.cull_box(&behind));
    }

    #[test]
    fn frustum_culls_box_outside_side_plane() {
        let f = square_view().frustum();
        // 45 degree half-angle: y = 150 at x = 100 is outside
        let left = Aabb::from_center_half_extents(Vec3::new(100.0, 150.0, 0.0), Vec3::splat(5.0));
        assert!(f.cull_box(&left));
        assert!(f.contains_point(Vec3::new(100.0, 90.0, 0.0)));
    }

    #[test]
    fn frustum_respects_far_plane() {
        let view = ViewSetup {
            z_far: 500.0,
            ..square_view()
        };
        let f = view.frustum();
        let far = Aabb::from_center_half_extents(Vec3::new(800.0, 0.0, 0.0), Vec3::splat(5.0));
        assert!(f.cull_box(&far));
    }

    #[test]
    fn ortho_frustum_is_a_box() {
        let view = ViewSetup {
            ortho: Some(OrthoRect {
                left: -50.0,
                top: 50.0,
                right: 50.0,
                bottom: -50.0,
            }),
            ..square_view()
        };
        let f = view.frustum();
        assert!(f.contains_point(Vec3::new(1000.0, 40.0, -40.0)));
        assert!(!f.contains_point(Vec3::new(1000.0, 60.0, 0.0)));
    }

    #[test]
    fn view_projection_maps_forward_point_to_screen_center() {
        let view = square_view();
        let clip = view.view_projection() * Vec3::new(100.0, 0.0, 0.0).extend(1.0);
        assert_abs_diff_eq!(clip.x / clip.w, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(clip.y / clip.w, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(clip.w, 100.0, epsilon = 1e-3);
    }
}
