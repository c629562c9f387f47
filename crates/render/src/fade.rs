//! Distance and screen-size fade.

use glam::{Mat4, Vec3};
use leafview_alpha::{AlphaProperty, DistanceFadeMode};
use leafview_common::Aabb;

/// Squared distance from `viewer` used for distance fading.
pub fn fade_distance_sq(prop: &AlphaProperty, bounds: &Aabb, viewer: Vec3) -> f32 {
    match prop.distance_fade_mode() {
        DistanceFadeMode::Center => (bounds.center() - viewer).length_squared(),
        DistanceFadeMode::Nearest => bounds.dist_sq_to_point(viewer),
    }
}

/// Distance fade factor in `0..=1`. `distance_scale` is the viewer's zoom
/// adjustment; distances are multiplied by it before comparison.
///
/// Both thresholds are tested on squared distances; between them the factor
/// ramps linearly in distance.
pub fn distance_fade_factor(prop: &AlphaProperty, bounds: &Aabb, viewer: Vec3, distance_scale: f32) -> f32 {
    let end = f32::from(prop.dist_fade_end());
    if end <= 0.0 {
        return 1.0;
    }
    let start = f32::from(prop.dist_fade_start());
    let dist_sq = fade_distance_sq(prop, bounds, viewer) * distance_scale * distance_scale;
    if dist_sq <= start * start {
        return 1.0;
    }
    if dist_sq >= end * end {
        return 0.0;
    }
    (end - dist_sq.sqrt()) / (end - start)
}

/// True when the renderable lies past its own fade-end distance.
pub fn is_beyond_fade_end(prop: &AlphaProperty, bounds: &Aabb, viewer: Vec3, distance_scale: f32) -> bool {
    let end = f32::from(prop.dist_fade_end());
    if end <= 0.0 {
        return false;
    }
    end * end < fade_distance_sq(prop, bounds, viewer) * distance_scale * distance_scale
}

/// Pixel-size fade range; a non-positive minimum disables it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScreenFadeRange {
    pub min_size: f32,
    pub max_size: f32,
}

impl ScreenFadeRange {
    pub fn new(min_size: f32, max_size: f32) -> Self {
        Self { min_size, max_size }
    }

    pub fn is_enabled(&self) -> bool {
        self.min_size > 0.0
    }
}

/// Correction applied to projected sizes so pixel thresholds authored for
/// level data keep their meaning.
pub const SCREEN_SIZE_SCALE: f32 = 2.0;

/// Projection data for screen-size estimates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenSizeInfo {
    pub view_projection: Mat4,
    pub view_up: Vec3,
    pub viewport_height: f32,
}

/// Projected pixel height of a sphere, using only the Y and W rows of the
/// view-projection matrix on two points along the view up axis.
pub fn screen_size(center: Vec3, radius: f32, info: &ScreenSizeInfo) -> f32 {
    let row_y = info.view_projection.row(1);
    let row_w = info.view_projection.row(3);
    let project = |p: Vec3| {
        let p = p.extend(1.0);
        let (y, w) = (row_y.dot(p), row_w.dot(p));
        if w >= 0.001 { y / w } else { y * 1000.0 }
    };
    let top = project(center + info.view_up * radius);
    let bottom = project(center - info.view_up * radius);
    info.viewport_height * (top - bottom).abs() * 0.5
}

/// Screen-size fade factor in `0..=1` for one range. `fade_scale` shrinks the
/// apparent size; zero or less opts the renderable out of screen fading.
///
/// A maximum at or below the minimum turns the ramp into a hard cut.
pub fn screen_fade_factor(bounds: &Aabb, fade_scale: f32, range: ScreenFadeRange, info: &ScreenSizeInfo) -> f32 {
    if !range.is_enabled() || fade_scale <= 0.0 {
        return 1.0;
    }
    let max_size = range.max_size.max(range.min_size);
    let radius = bounds.size().length() * 0.5;
    let pixels = screen_size(bounds.center(), radius, info) / fade_scale * SCREEN_SIZE_SCALE;
    if pixels <= range.min_size {
        return 0.0;
    }
    if pixels < max_size {
        return (pixels - range.min_size) / (max_size - range.min_size);
    }
    1.0
}

/// Product of an effect alpha and the fade factors, truncated to a byte.
pub fn combine_alpha(base: u8, distance_factor: f32, screen_factor: f32) -> u8 {
    let factor = distance_factor.clamp(0.0, 1.0) * screen_factor.clamp(0.0, 1.0);
    (f32::from(base) * factor).clamp(0.0, 255.0) as u8
}
