//! The level-scoped context a frame renders from.

use glam::Vec3;
use leafview_alpha::{AlphaPropertyPool, ScreenFade};
use leafview_common::{
    DetailObjectSystem, MaterialId, NoDetailObjects, NullShadowManager, Plane, RenderConfig, RenderHandle,
    ShadowManager, SpatialQuery, TextureId,
};
use leafview_leaf::{LeafConfig, LeafSystem, RenderableDesc};
use leafview_render::SceneRefs;

use crate::device::RenderTarget;

/// How much of the sky the camera can see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkyboxVisibility {
    #[default]
    NotVisible,
    Visible3d,
    Visible2d,
}

/// Placement of the miniature 3D skybox.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyParams {
    pub origin: Vec3,
    /// World units per skybox unit; zero or less means unscaled.
    pub scale: f32,
    /// Area of the skybox room; 255 disables the 3D skybox.
    pub area: i32,
    /// Clear color; a non-zero alpha replaces the 2D sky.
    pub color: [u8; 4],
}

impl SkyParams {
    pub fn is_enabled(&self) -> bool {
        self.area != 255
    }

    /// Maps a world-space eye into skybox space.
    pub fn skybox_origin(&self, eye: Vec3) -> Vec3 {
        let scale = if self.scale > 0.0 { 1.0 / self.scale } else { 1.0 };
        eye * scale + self.origin
    }
}

/// A reflective or refractive glass surface in view this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlassSurface {
    pub plane: Plane,
    pub reflect_target: Option<RenderTarget>,
    pub refract_target: Option<RenderTarget>,
}

/// Offscreen targets owned by the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTargets {
    pub water_reflection: RenderTarget,
    pub water_refraction: RenderTarget,
    pub freeze_frame: RenderTarget,
}

impl Default for RenderTargets {
    fn default() -> Self {
        Self {
            water_reflection: RenderTarget::new(TextureId(1), 512, 512),
            water_refraction: RenderTarget::new(TextureId(2), 512, 512),
            freeze_frame: RenderTarget::new(TextureId(3), 1280, 720),
        }
    }
}

/// Registries and collaborators of one loaded level.
///
/// Owns the leaf system and alpha pool for the lifetime of the level; the
/// renderables themselves stay owned by the game.
pub struct Scene {
    pub leaves: LeafSystem,
    pub alpha: AlphaPropertyPool,
    pub spatial: Box<dyn SpatialQuery>,
    pub shadows: Box<dyn ShadowManager>,
    pub details: Box<dyn DetailObjectSystem>,
    pub sky: Option<SkyParams>,
    pub skybox_visibility: SkyboxVisibility,
    pub glass: Vec<GlassSurface>,
    pub targets: RenderTargets,
    pub screen_fade: ScreenFade,
    /// Full-screen material drawn over the 3D scene.
    pub screen_overlay: Option<MaterialId>,
    /// Scene time in seconds.
    pub time: f32,
}

impl Scene {
    pub fn new(spatial: Box<dyn SpatialQuery>) -> Self {
        Self::with_config(&RenderConfig::default(), spatial)
    }

    pub fn with_config(config: &RenderConfig, spatial: Box<dyn SpatialQuery>) -> Self {
        let mut leaves = LeafSystem::new(LeafConfig::from(config));
        leaves.level_init(spatial.leaf_count());
        Self {
            leaves,
            alpha: AlphaPropertyPool::new(),
            spatial,
            shadows: Box::new(NullShadowManager),
            details: Box::new(NoDetailObjects),
            sky: None,
            skybox_visibility: SkyboxVisibility::Visible2d,
            glass: Vec::new(),
            targets: RenderTargets::default(),
            screen_fade: ScreenFade::new(),
            screen_overlay: None,
            time: 0.0,
        }
    }

    pub fn with_shadows(mut self, shadows: Box<dyn ShadowManager>) -> Self {
        self.shadows = shadows;
        self
    }

    pub fn with_details(mut self, details: Box<dyn DetailObjectSystem>) -> Self {
        self.details = details;
        self
    }

    pub fn with_sky(mut self, sky: SkyParams, visibility: SkyboxVisibility) -> Self {
        self.sky = Some(sky);
        self.skybox_visibility = visibility;
        self
    }

    pub fn add_renderable(&mut self, desc: RenderableDesc) -> RenderHandle {
        self.leaves.add_renderable(desc)
    }

    pub fn remove_renderable(&mut self, handle: RenderHandle) {
        self.leaves.remove_renderable(handle, self.shadows.as_mut());
    }

    pub fn recompute_leaves(&mut self) {
        self.leaves.recompute_leaves(self.spatial.as_ref(), self.shadows.as_mut());
    }

    /// Drops every level-scoped table; the scene can be re-initialised with
    /// [`LeafSystem::level_init`].
    pub fn level_shutdown(&mut self) {
        self.leaves.level_shutdown();
        self.alpha.clear();
        self.glass.clear();
        self.screen_fade.clear();
        self.screen_overlay = None;
        tracing::debug!("scene shut down");
    }

    pub(crate) fn refs(&mut self) -> SceneRefs<'_> {
        SceneRefs {
            leaves: &mut self.leaves,
            alpha: &self.alpha,
            spatial: self.spatial.as_ref(),
            shadows: self.shadows.as_mut(),
            details: self.details.as_mut(),
        }
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("renderables", &self.leaves.len())
            .field("leaves", &self.leaves.leaf_count())
            .field("alpha_properties", &self.alpha.len())
            .field("sky", &self.sky)
            .field("glass", &self.glass.len())
            .field("time", &self.time)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use leafview_leaf::GridLeaves;

    #[test]
    fn skybox_origin_scales_then_offsets() {
        let sky = SkyParams {
            origin: Vec3::new(100.0, 0.0, 0.0),
            scale: 16.0,
            area: 1,
            color: [0; 4],
        };
        let origin = sky.skybox_origin(Vec3::new(160.0, 32.0, 0.0));
        assert_abs_diff_eq!(origin.x, 110.0);
        assert_abs_diff_eq!(origin.y, 2.0);

        let unscaled = SkyParams { scale: 0.0, ..sky };
        assert_abs_diff_eq!(unscaled.skybox_origin(Vec3::X).x, 101.0);
    }

    #[test]
    fn area_255_disables_sky() {
        let sky = SkyParams {
            origin: Vec3::ZERO,
            scale: 1.0,
            area: 255,
            color: [0; 4],
        };
        assert!(!sky.is_enabled());
    }

    #[test]
    fn scene_sizes_leaves_from_spatial_service() {
        let grid = GridLeaves::new(Vec3::ZERO, 64.0, [3, 2, 1]);
        let mut scene = Scene::new(Box::new(grid));
        assert_eq!(scene.leaves.leaf_count(), 6);
        scene.level_shutdown();
        assert!(scene.leaves.is_empty());
    }
}
