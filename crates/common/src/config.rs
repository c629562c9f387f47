use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors from loading or validating a [`RenderConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Runtime switches for the render pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Draw static props at all.
    pub draw_static_props: bool,
    /// Ask the occlusion system about static props and studio models.
    pub occlusion_enabled: bool,
    /// Propagate every shadow in a leaf to its renderables, not just flashlights.
    pub shadows_on_renderables: bool,
    /// Debug: put every registered renderable in the first visible leaf.
    pub draw_all_renderables: bool,
    /// Cull renderables against area-portal frustums.
    pub portal_test_entities: bool,
    pub portals_open_all: bool,
    pub draw_detail_props: bool,

    pub draw_opaque_world: bool,
    pub draw_translucent_world: bool,
    pub draw_opaque_renderables: bool,
    pub draw_translucent_renderables: bool,
    pub draw_entities: bool,
    pub draw_view_models: bool,

    /// Draw the 2D skybox.
    pub skybox: bool,
    pub draw_3d_skybox: bool,
    /// Share world lists between views with bit-identical cameras.
    pub world_list_cache: bool,

    pub water_draw_reflection: bool,
    pub water_draw_refraction: bool,
    pub water_force_expensive: bool,
    pub water_force_reflect_entities: bool,
    pub draw_water_surface: bool,
    /// Keep the fog-volume leaf when building lists for water views.
    pub force_water_leaf: bool,
    pub cheap_water_start_distance: f32,
    pub cheap_water_end_distance: f32,
    /// Minimum distance kept between the eye and a water clip plane.
    pub eye_water_epsilon: f32,
    pub software_user_clip_plane: bool,
    pub clip_z: bool,

    /// Per-view screen-size fade range in pixels; 0/0 disables it.
    pub screen_fade_min_size: f32,
    pub screen_fade_max_size: f32,
    /// Level-wide screen-size fade range in pixels.
    pub level_fade_min_size: f32,
    pub level_fade_max_size: f32,
    pub max_renderable_distance: f32,

    pub flashlight_depth_draw_translucents: bool,

    /// Per-group entry cap of a render list.
    pub max_group_entities: usize,
    /// Passes over the dirty list before giving up.
    pub max_dirty_iterations: u32,

    pub threaded_leaf_insert: bool,
    pub threaded_leaf_insert_min: usize,
    pub parallel_alpha: bool,
    pub parallel_alpha_min: usize,

    pub default_fov: f32,
    pub viewmodel_fov: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub skybox_z_near: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            draw_static_props: true,
            occlusion_enabled: true,
            shadows_on_renderables: true,
            draw_all_renderables: false,
            portal_test_entities: false,
            portals_open_all: false,
            draw_detail_props: true,
            draw_opaque_world: true,
            draw_translucent_world: true,
            draw_opaque_renderables: true,
            draw_translucent_renderables: true,
            draw_entities: true,
            draw_view_models: true,
            skybox: true,
            draw_3d_skybox: true,
            world_list_cache: true,
            water_draw_reflection: true,
            water_draw_refraction: true,
            water_force_expensive: false,
            water_force_reflect_entities: false,
            draw_water_surface: true,
            force_water_leaf: true,
            cheap_water_start_distance: 0.0,
            cheap_water_end_distance: 0.1,
            eye_water_epsilon: 10.0,
            software_user_clip_plane: false,
            clip_z: true,
            screen_fade_min_size: 0.0,
            screen_fade_max_size: 0.0,
            level_fade_min_size: 0.0,
            level_fade_max_size: 0.0,
            max_renderable_distance: 3000.0,
            flashlight_depth_draw_translucents: false,
            max_group_entities: 16834,
            max_dirty_iterations: 10,
            threaded_leaf_insert: false,
            threaded_leaf_insert_min: 64,
            parallel_alpha: false,
            parallel_alpha_min: 256,
            default_fov: 75.0,
            viewmodel_fov: 54.0,
            z_near: 7.0,
            z_far: 28377.9,
            skybox_z_near: 2.0,
        }
    }
}

impl RenderConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&text)?;
        tracing::debug!(path = %path.display(), "render config loaded");
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cheap_water_start_distance < 0.0 || self.cheap_water_end_distance < 0.0 {
            return Err(ConfigError::Invalid {
                field: "cheap_water_distance",
                reason: "water LOD distances must not be negative".into(),
            });
        }
        for (field, min, max) in [
            ("screen_fade", self.screen_fade_min_size, self.screen_fade_max_size),
            ("level_fade", self.level_fade_min_size, self.level_fade_max_size),
        ] {
            if min > 0.0 && max > 0.0 && max < min {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("max size {max} is below min size {min}"),
                });
            }
        }
        if self.max_group_entities == 0 {
            return Err(ConfigError::Invalid {
                field: "max_group_entities",
                reason: "render groups need room for at least one entry".into(),
            });
        }
        if self.max_dirty_iterations == 0 {
            return Err(ConfigError::Invalid {
                field: "max_dirty_iterations",
                reason: "must allow at least one pass".into(),
            });
        }
        if self.z_near <= 0.0 || self.z_far <= self.z_near {
            return Err(ConfigError::Invalid {
                field: "z_near",
                reason: format!("need 0 < z_near < z_far, got {} / {}", self.z_near, self.z_far),
            });
        }
        Ok(())
    }
}
