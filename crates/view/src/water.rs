//! Water level-of-detail policy and the geometry helpers water views share.

use glam::Vec3;
use leafview_common::{Aabb, SpatialQuery, ViewSetup, VisibleFogVolume};

use crate::config::ViewConfig;

/// Slack applied to the near-plane corners when testing them against water.
pub const WATER_PLANE_FUDGE: f32 = 7.0;

/// How the visible water body is drawn this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaterRenderInfo {
    pub cheap_water: bool,
    pub refract: bool,
    pub reflect: bool,
    pub reflect_entities: bool,
    pub draw_water_surface: bool,
    pub opaque_water: bool,
}

impl Default for WaterRenderInfo {
    fn default() -> Self {
        Self {
            cheap_water: true,
            refract: false,
            reflect: false,
            reflect_entities: false,
            draw_water_surface: false,
            opaque_water: true,
        }
    }
}

/// Picks cheap or expensive water for the fog volume the camera sees.
///
/// Cheap water never reflects or refracts. Past the cheap-water distance the
/// water goes cheap unless a forced-expensive local reflection is available.
pub fn determine_water_render_info(fog: &VisibleFogVolume, config: &ViewConfig) -> WaterRenderInfo {
    let mut info = WaterRenderInfo::default();
    let Some(material) = fog.material.filter(|_| fog.fog_volume != -1) else {
        return info;
    };

    info.draw_water_surface = config.draw_water_surface;
    if !info.draw_water_surface {
        info.opaque_water = false;
        return info;
    }
    info.opaque_water = !material.translucent;

    let force_cheap = material.force_cheap;
    let force_expensive = !force_cheap && (config.water_force_expensive || material.force_expensive);

    let local_reflection = force_expensive && config.water_draw_reflection && material.has_reflect_texture;
    if (fog.distance_to_water >= config.cheap_water_end_distance && !local_reflection) || force_cheap {
        return info;
    }

    info.refract = config.water_draw_refraction && material.has_refract_texture;
    if info.refract {
        info.opaque_water = false;
    }
    info.reflect = local_reflection;
    if info.reflect {
        info.reflect_entities = config.water_force_reflect_entities || material.reflect_entities;
    }
    info.cheap_water = !info.reflect && !info.refract;
    tracing::trace!(?info, distance = fog.distance_to_water, "water render info");
    info
}

/// True when the view's near plane straddles the surface of `fog_volume`.
pub fn does_view_plane_intersect_water(
    view: &ViewSetup,
    water_height: f32,
    fog_volume: i32,
    spatial: &dyn SpatialQuery,
) -> bool {
    if fog_volume == -1 {
        return false;
    }
    let inverse = view.view_projection().inverse();
    let mut mins = Vec3::splat(f32::MAX);
    let mut maxs = Vec3::splat(f32::MIN);
    let (mut above, mut below) = (false, false);
    for (x, y) in [(-1.0, -1.0), (-1.0, 1.0), (1.0, -1.0), (1.0, 1.0)] {
        let corner = inverse.project_point3(Vec3::new(x, y, 0.0));
        mins = mins.min(corner);
        maxs = maxs.max(corner);
        above |= corner.z + WATER_PLANE_FUDGE > water_height;
        below |= corner.z - WATER_PLANE_FUDGE < water_height;
    }
    if !(above && below) {
        return false;
    }
    let fudge = Vec3::splat(WATER_PLANE_FUDGE);
    spatial.box_intersects_water_volume(&Aabb::new(mins - fudge, maxs + fudge), fog_volume)
}

/// Clip height for water views and how far it moved off the real surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterEyeAdjust {
    pub water_height: f32,
    pub z_adjust: f32,
}

/// With a software clip plane, keeps the clip height at least `epsilon` away
/// from the eye so the plane never passes through the near plane.
pub fn calc_water_eye_adjustments(eye_z: f32, water_height: f32, software_clip: bool, epsilon: f32) -> WaterEyeAdjust {
    let mut adjust = WaterEyeAdjust {
        water_height,
        z_adjust: 0.0,
    };
    if !software_clip {
        return adjust;
    }
    let delta = eye_z - water_height;
    if delta.abs() < epsilon {
        adjust.water_height = if delta > 0.0 { eye_z - epsilon } else { eye_z + epsilon };
        adjust.z_adjust = adjust.water_height - water_height;
    }
    adjust
}
