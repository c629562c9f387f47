use leafview_common::RenderConfig;
use leafview_render::BuilderConfig;

/// Switches read by the composer and the frame driver.
#[derive(Debug, Clone)]
pub struct ViewConfig {
    pub draw_opaque_world: bool,
    pub draw_translucent_world: bool,
    pub draw_opaque_renderables: bool,
    pub draw_translucent_renderables: bool,
    pub draw_entities: bool,
    pub draw_view_models: bool,
    pub skybox: bool,
    pub draw_3d_skybox: bool,
    pub world_list_cache: bool,
    pub water_draw_reflection: bool,
    pub water_draw_refraction: bool,
    pub water_force_expensive: bool,
    pub water_force_reflect_entities: bool,
    pub draw_water_surface: bool,
    /// Keep forcing the water leaf into the world list of non-cheap water views.
    pub force_water_leaf: bool,
    pub cheap_water_start_distance: f32,
    pub cheap_water_end_distance: f32,
    pub eye_water_epsilon: f32,
    /// Clip water views with a software plane instead of the hardware height clip.
    pub software_user_clip_plane: bool,
    pub clip_z: bool,
    pub flashlight_depth_draw_translucents: bool,
    pub default_fov: f32,
    pub viewmodel_fov: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub skybox_z_near: f32,
    pub builder: BuilderConfig,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self::from(&RenderConfig::default())
    }
}

impl From<&RenderConfig> for ViewConfig {
    fn from(config: &RenderConfig) -> Self {
        Self {
            draw_opaque_world: config.draw_opaque_world,
            draw_translucent_world: config.draw_translucent_world,
            draw_opaque_renderables: config.draw_opaque_renderables,
            draw_translucent_renderables: config.draw_translucent_renderables,
            draw_entities: config.draw_entities,
            draw_view_models: config.draw_view_models,
            skybox: config.skybox,
            draw_3d_skybox: config.draw_3d_skybox,
            world_list_cache: config.world_list_cache,
            water_draw_reflection: config.water_draw_reflection,
            water_draw_refraction: config.water_draw_refraction,
            water_force_expensive: config.water_force_expensive,
            water_force_reflect_entities: config.water_force_reflect_entities,
            draw_water_surface: config.draw_water_surface,
            force_water_leaf: config.force_water_leaf,
            cheap_water_start_distance: config.cheap_water_start_distance,
            cheap_water_end_distance: config.cheap_water_end_distance,
            eye_water_epsilon: config.eye_water_epsilon,
            software_user_clip_plane: config.software_user_clip_plane,
            clip_z: config.clip_z,
            flashlight_depth_draw_translucents: config.flashlight_depth_draw_translucents,
            default_fov: config.default_fov,
            viewmodel_fov: config.viewmodel_fov,
            z_near: config.z_near,
            z_far: config.z_far,
            skybox_z_near: config.skybox_z_near,
            builder: BuilderConfig::from(config),
        }
    }
}
