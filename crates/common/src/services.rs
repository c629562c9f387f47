//! Contracts of the collaborators the pipeline consumes but does not own.

use std::sync::Weak;

use glam::Vec3;

use crate::handles::{LeafIndex, MaterialId, RenderHandle, ShadowId, TextureId};
use crate::kinds::{DrawModelFlags, ShadowFlags, ShadowReceiver, TranslucencyType};
use crate::types::Aabb;
use crate::view::{Frustum, ViewSetup};

/// A drawable game object. Owned by the game-object system; the renderer only
/// holds [`Weak`] references to it.
pub trait Renderable: Send + Sync {
    fn render_origin(&self) -> Vec3;

    fn render_angles(&self) -> Vec3 {
        Vec3::ZERO
    }

    /// Bounds relative to the render origin.
    fn render_bounds(&self) -> Aabb;

    fn world_space_bounds(&self) -> Aabb {
        self.render_bounds()
            .transformed(self.render_origin(), self.render_angles())
    }

    fn should_draw(&self) -> bool {
        true
    }

    /// Returns false when nothing was drawn.
    fn draw_model(&self, flags: DrawModelFlags, alpha: u8) -> bool {
        let _ = (flags, alpha);
        true
    }

    fn compute_translucency_type(&self) -> TranslucencyType {
        TranslucencyType::Opaque
    }

    fn model_name(&self) -> Option<&str> {
        None
    }

    /// Attachment origin and angles by index.
    fn attachment(&self, index: usize) -> Option<(Vec3, Vec3)> {
        let _ = index;
        None
    }

    fn should_receive_projected_textures(&self, flags: ShadowFlags) -> bool {
        let _ = flags;
        true
    }

    /// Attached to a parent whose motion invalidates cached bounds every frame.
    fn has_move_parent(&self) -> bool {
        false
    }

    fn is_npc(&self) -> bool {
        false
    }

    /// Final say over the computed alpha when the override flag is set.
    fn override_alpha_modulation(&self, alpha: u8) -> u8 {
        alpha
    }

    fn override_shadow_alpha_modulation(&self, alpha: u8) -> u8 {
        alpha
    }
}

/// Extra knobs for a world-list build.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WorldListRequest {
    pub force_view_leaf: Option<LeafIndex>,
    pub shadow_depth: bool,
    pub reflection_water_height: Option<f32>,
}

/// Opaque world geometry list owned by the spatial service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorldListId(pub u32);

/// Result of a world-list build: visible leaves front to back with their fog volumes.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltWorldLists {
    pub list: WorldListId,
    pub leaves: Vec<LeafIndex>,
    /// Parallel to `leaves`; -1 for leaves outside any water.
    pub leaf_fog_volumes: Vec<i32>,
    pub has_water: bool,
}

/// Water material parameters relevant to view selection.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WaterMaterial {
    pub id: MaterialId,
    pub translucent: bool,
    pub has_reflect_texture: bool,
    pub has_refract_texture: bool,
    pub force_cheap: bool,
    pub force_expensive: bool,
    pub reflect_entities: bool,
    pub underwater_overlay: Option<MaterialId>,
}

/// Fog volume visible from an eye position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleFogVolume {
    /// -1 when no water is visible.
    pub fog_volume: i32,
    pub fog_volume_leaf: i32,
    pub eye_in_fog: bool,
    pub distance_to_water: f32,
    pub water_height: f32,
    pub material: Option<WaterMaterial>,
}

impl Default for VisibleFogVolume {
    fn default() -> Self {
        Self {
            fog_volume: -1,
            fog_volume_leaf: -1,
            eye_in_fog: false,
            distance_to_water: 0.0,
            water_height: 0.0,
            material: None,
        }
    }
}

/// BSP and world-geometry queries.
pub trait SpatialQuery: Send + Sync {
    fn leaf_count(&self) -> u32;

    fn enumerate_leaves_in_box(&self, bounds: &Aabb, out: &mut dyn FnMut(LeafIndex));

    /// Area shared by every listed leaf, or -1 when they span several.
    fn leaves_area(&self, leaves: &[LeafIndex]) -> i32 {
        let _ = leaves;
        -1
    }

    fn build_world_lists(&self, view: &ViewSetup, request: &WorldListRequest) -> BuiltWorldLists;

    /// True when the box is outside the frustum.
    fn cull_box(&self, frustum: &Frustum, bounds: &Aabb) -> bool {
        frustum.cull_box(bounds)
    }

    fn does_box_touch_area_frustum(&self, frustum: &Frustum, bounds: &Aabb, area: i32) -> bool {
        let _ = area;
        !frustum.cull_box(bounds)
    }

    fn is_occluded(&self, bounds: &Aabb) -> bool {
        let _ = bounds;
        false
    }

    fn box_intersects_water_volume(&self, bounds: &Aabb, fog_volume: i32) -> bool {
        let _ = (bounds, fog_volume);
        false
    }

    fn visible_fog_volume(&self, eye: Vec3) -> VisibleFogVolume {
        let _ = eye;
        VisibleFogVolume::default()
    }

    fn point_in_solid(&self, point: Vec3) -> bool {
        let _ = point;
        false
    }

    /// Brackets parallel sections that read shared model data.
    fn lock_model_cache(&self) {}

    fn unlock_model_cache(&self) {}
}

/// A depth-only view the shadow manager wants rendered this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowDepthRequest {
    pub view: ViewSetup,
    pub depth_target: TextureId,
    pub color_target: Option<TextureId>,
    pub draw_translucents: bool,
    /// Only draw renderables excluded from the depth cache.
    pub non_cached_only: bool,
}

/// External projected-shadow bookkeeping.
pub trait ShadowManager {
    fn add_shadow_to_receiver(&mut self, shadow: ShadowId, receiver: RenderHandle, kind: ShadowReceiver);

    fn remove_all_shadows_from_receiver(&mut self, receiver: RenderHandle, kind: ShadowReceiver);

    fn set_falloff_bias(&mut self, shadow: ShadowId, bias: u8);

    fn compute_shadow_depth_textures(&mut self, view: &ViewSetup) -> Vec<ShadowDepthRequest> {
        let _ = view;
        Vec::new()
    }
}

/// Shadow manager for scenes without projected shadows.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullShadowManager;

impl ShadowManager for NullShadowManager {
    fn add_shadow_to_receiver(&mut self, _: ShadowId, _: RenderHandle, _: ShadowReceiver) {}
    fn remove_all_shadows_from_receiver(&mut self, _: RenderHandle, _: ShadowReceiver) {}
    fn set_falloff_bias(&mut self, _: ShadowId, _: u8) {}
}

/// A detail sprite or prop produced by the detail-object system for one frame.
#[derive(Debug, Clone)]
pub struct DetailRenderable {
    pub renderable: Weak<dyn Renderable>,
    /// Position in the view's world-list leaf order.
    pub leaf_list_index: usize,
    pub alpha: u8,
    pub translucent: bool,
}

/// Grass, rocks and other small per-leaf clutter.
pub trait DetailObjectSystem {
    fn build_rendering_data(&mut self, leaves: &[LeafIndex], view_origin: Vec3) -> Vec<DetailRenderable>;

    fn render_translucent_detail_objects_in_leaf(&mut self, leaf: LeafIndex, view_origin: Vec3);

    fn render_translucent_detail_objects(&mut self, leaves: &[LeafIndex], view_origin: Vec3) {
        for &leaf in leaves {
            self.render_translucent_detail_objects_in_leaf(leaf, view_origin);
        }
    }
}

/// Detail system for levels without detail props.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDetailObjects;

impl DetailObjectSystem for NoDetailObjects {
    fn build_rendering_data(&mut self, _: &[LeafIndex], _: Vec3) -> Vec<DetailRenderable> {
        Vec::new()
    }

    fn render_translucent_detail_objects_in_leaf(&mut self, _: LeafIndex, _: Vec3) {}
}
