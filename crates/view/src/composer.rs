//! Builds and draws the frame's tree of nested 3D views.
//!
//! Every view runs the same cycle: make it current, build its world and
//! renderable lists, push it on the device, draw, pop, restore the parent.
//! Child views (water reflection and refraction, glass, skybox, shadow depth)
//! complete that cycle before their parent issues further draws.

use std::sync::Arc;

use glam::Vec3;
use leafview_alpha::AlphaContext;
use leafview_common::{
    ClearFlags, DrawFlags, DrawModelFlags, EngineRenderGroup, LeafIndex, MaterialId, SizeBucket, ViewId, ViewSetup,
    VisibleFogVolume, WorldListRequest,
};
use leafview_render::{
    BuildParams, CachedLists, RenderListBuilder, RenderListEntry, RenderablesList, WorldListCache, WorldListInfo,
    WorldListPool, collate_view_model_renderables,
};

use crate::config::ViewConfig;
use crate::current::CurrentViewState;
use crate::device::{HeightClipMode, RenderDevice, RenderTarget};
use crate::scene::{Scene, SkyboxVisibility};
use crate::view::{
    ShadowDepthPass, View3d, ViewKind, glass_reflection_setup, reflective_glass_clip, refractive_glass_clip,
    water_reflection_setup,
};
use crate::water::{WaterRenderInfo, calc_water_eye_adjustments, determine_water_render_info, does_view_plane_intersect_water};

/// One view drawn this frame, in push order.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnView {
    pub kind: ViewKind,
    pub id: ViewId,
    /// Current-view stack depth while the view was drawn.
    pub depth: usize,
    pub draw_flags: DrawFlags,
    pub clear_flags: ClearFlags,
    pub world_leaves: usize,
    pub renderables: usize,
    /// Lists came from the world-list cache.
    pub cached: bool,
}

struct ViewLists {
    world: Arc<WorldListInfo>,
    renderables: Arc<RenderablesList>,
    /// World-list build number the view's detail leaves were stamped with.
    detail_frame: u32,
    cached: bool,
}

/// Draws nested views for one frame at a time.
#[derive(Debug)]
pub struct ViewComposer {
    config: ViewConfig,
    builder: RenderListBuilder,
    cache: WorldListCache,
    pool: WorldListPool,
    current: CurrentViewState,
    drawn: Vec<DrawnView>,
    frame: u32,
    main: ViewSetup,
    distance_scale: f32,
    drew_3d_skybox: bool,
    underwater_overlay: Option<MaterialId>,
}

impl ViewComposer {
    pub fn new(config: ViewConfig) -> Self {
        Self {
            builder: RenderListBuilder::new(config.builder.clone()),
            config,
            cache: WorldListCache::new(),
            pool: WorldListPool::new(),
            current: CurrentViewState::new(),
            drawn: Vec::new(),
            frame: 0,
            main: ViewSetup::default(),
            distance_scale: 1.0,
            drew_3d_skybox: false,
            underwater_overlay: None,
        }
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ViewConfig) {
        self.builder.set_config(config.builder.clone());
        self.config = config;
    }

    pub fn builder(&self) -> &RenderListBuilder {
        &self.builder
    }

    pub fn current(&self) -> &CurrentViewState {
        &self.current
    }

    pub(crate) fn current_mut(&mut self) -> &mut CurrentViewState {
        &mut self.current
    }

    pub fn drawn_views(&self) -> &[DrawnView] {
        &self.drawn
    }

    pub fn cache(&self) -> &WorldListCache {
        &self.cache
    }

    /// Overlay material recorded by an under-water view this frame.
    pub fn underwater_overlay(&self) -> Option<MaterialId> {
        self.underwater_overlay
    }

    pub fn clear_underwater_overlay(&mut self) {
        self.underwater_overlay = None;
    }

    /// Zoom scale applied to fade distances in every list built from now on.
    pub fn set_distance_scale(&mut self, scale: f32) {
        self.distance_scale = scale;
    }

    pub fn distance_scale(&self) -> f32 {
        self.distance_scale
    }

    /// Starts a frame rooted at `main`, which becomes the current view.
    pub fn begin_frame(&mut self, frame: u32, main: &ViewSetup) {
        self.frame = frame;
        self.main = *main;
        self.drawn.clear();
        self.drew_3d_skybox = false;
        self.underwater_overlay = None;
        self.current.setup(main, ViewId::Main);
    }

    /// Drops the frame's cached lists and closes current-view access.
    pub fn end_frame(&mut self) {
        self.cache.flush();
        self.current.finish();
    }

    /// Draws the 3D skybox if the scene has one in view.
    ///
    /// The skybox view takes over `clear`; the caller is left clearing depth only.
    pub fn draw_skybox(
        &mut self,
        scene: &mut Scene,
        device: &mut dyn RenderDevice,
        view: &ViewSetup,
        clear: &mut ClearFlags,
    ) -> bool {
        let Some(sky) = scene.sky.filter(|sky| sky.is_enabled()) else {
            return false;
        };
        if scene.skybox_visibility != SkyboxVisibility::Visible3d || !self.config.draw_3d_skybox {
            return false;
        }

        let mut sky_clear = *clear;
        clear.remove(ClearFlags::COLOR | ClearFlags::DEPTH | ClearFlags::STENCIL | ClearFlags::FULL_TARGET);
        clear.insert(ClearFlags::DEPTH);

        let mut flags = DrawFlags::RENDER_UNDERWATER | DrawFlags::RENDER_ABOVEWATER | DrawFlags::RENDER_WATER;
        if sky.color[3] != 0 {
            sky_clear |= ClearFlags::COLOR | ClearFlags::DEPTH;
            flags |= DrawFlags::CLIP_SKYBOX;
        } else if self.config.skybox {
            flags |= DrawFlags::DRAWSKYBOX;
        }

        let setup = ViewSetup {
            z_near: self.config.skybox_z_near,
            origin: sky.skybox_origin(view.origin),
            ..*view
        };
        let sky_view = View3d::new(ViewKind::Skybox, setup, ViewId::Skybox3d)
            .with_flags(flags)
            .with_clear(sky_clear);
        self.draw_view(scene, device, &sky_view);
        self.drew_3d_skybox = true;
        true
    }

    /// Draws the world and entities seen from `view`, shadow depth first for
    /// the main view.
    pub fn draw_scene(
        &mut self,
        scene: &mut Scene,
        device: &mut dyn RenderDevice,
        view: &ViewSetup,
        clear: ClearFlags,
        id: ViewId,
    ) {
        if id == ViewId::Main {
            self.draw_shadow_depth_views(scene, device, view);
        }
        self.draw_world_and_entities(scene, device, view, clear);
    }

    /// Picks the simple, above-water or under-water path for the camera.
    pub fn draw_world_and_entities(
        &mut self,
        scene: &mut Scene,
        device: &mut dyn RenderDevice,
        view: &ViewSetup,
        clear: ClearFlags,
    ) {
        let draw_skybox =
            self.config.skybox && !self.drew_3d_skybox && scene.skybox_visibility != SkyboxVisibility::NotVisible;
        let mut fog = scene.spatial.visible_fog_volume(view.origin);
        let water = determine_water_render_info(&fog, &self.config);

        if water.cheap_water {
            self.draw_glass_views(scene, device, view, &fog, &water, draw_skybox);
            self.draw_simple_world(scene, device, view, clear, &fog, &water, draw_skybox);
            return;
        }

        if !self.config.force_water_leaf {
            fog.fog_volume_leaf = -1;
        }
        if fog.eye_in_fog {
            self.draw_under_water(scene, device, view, &fog, &water, draw_skybox);
        } else {
            self.draw_above_water(scene, device, view, &fog, &water, draw_skybox);
        }
    }

    fn simple_world_flags(
        &self,
        scene: &Scene,
        view: &ViewSetup,
        fog: &VisibleFogVolume,
        water: &WaterRenderInfo,
        draw_skybox: bool,
    ) -> DrawFlags {
        let mut flags = DrawFlags::DRAW_ENTITIES;
        if !water.opaque_water
            || does_view_plane_intersect_water(view, fog.water_height, fog.fog_volume, scene.spatial.as_ref())
        {
            flags |= DrawFlags::RENDER_UNDERWATER | DrawFlags::RENDER_ABOVEWATER;
        } else if fog.eye_in_fog {
            flags |= DrawFlags::RENDER_UNDERWATER;
        } else {
            flags |= DrawFlags::RENDER_ABOVEWATER;
        }
        if water.draw_water_surface {
            flags |= DrawFlags::RENDER_WATER;
        }
        if !fog.eye_in_fog && draw_skybox {
            flags |= DrawFlags::DRAWSKYBOX;
        }
        flags
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_simple_world(
        &mut self,
        scene: &mut Scene,
        device: &mut dyn RenderDevice,
        view: &ViewSetup,
        clear: ClearFlags,
        fog: &VisibleFogVolume,
        water: &WaterRenderInfo,
        draw_skybox: bool,
    ) {
        let flags = self.simple_world_flags(scene, view, fog, water, draw_skybox);
        let mut clear = clear;
        if fog.eye_in_fog {
            clear |= ClearFlags::COLOR;
        }
        let simple = View3d::new(ViewKind::Simple, *view, ViewId::Main)
            .with_flags(flags)
            .with_clear(clear)
            .with_water(0.0, 0.0, fog.fog_volume);
        self.draw_view(scene, device, &simple);
    }

    /// Reflective and refractive views for every glass surface facing the camera.
    fn draw_glass_views(
        &mut self,
        scene: &mut Scene,
        device: &mut dyn RenderDevice,
        view: &ViewSetup,
        fog: &VisibleFogVolume,
        water: &WaterRenderInfo,
        draw_skybox: bool,
    ) {
        if scene.glass.is_empty() {
            return;
        }
        let flags = self.simple_world_flags(scene, view, fog, water, draw_skybox);
        let clear = ClearFlags::DEPTH | ClearFlags::COLOR;
        let aspect = view.aspect();
        let glass = scene.glass.clone();
        for surface in &glass {
            if surface.plane.distance_to(view.origin) <= 0.0 {
                continue;
            }
            if let Some(target) = surface.reflect_target {
                let reflected = View3d::new(
                    ViewKind::ReflectiveGlass,
                    glass_reflection_setup(view, &surface.plane),
                    ViewId::Reflection,
                )
                .with_flags(flags)
                .with_clear(clear)
                .with_water(0.0, 0.0, fog.fog_volume)
                .with_target(target, aspect)
                .with_clip_plane(reflective_glass_clip(&surface.plane));
                self.draw_view(scene, device, &reflected);
            }
            if let Some(target) = surface.refract_target {
                let refracted = View3d::new(ViewKind::RefractiveGlass, *view, ViewId::Refraction)
                    .with_flags(flags)
                    .with_clear(clear)
                    .with_water(0.0, 0.0, fog.fog_volume)
                    .with_target(target, aspect)
                    .with_clip_plane(refractive_glass_clip(&surface.plane));
                self.draw_view(scene, device, &refracted);
            }
        }
    }

    fn draw_above_water(
        &mut self,
        scene: &mut Scene,
        device: &mut dyn RenderDevice,
        view: &ViewSetup,
        fog: &VisibleFogVolume,
        water: &WaterRenderInfo,
        draw_skybox: bool,
    ) {
        let config = &self.config;
        let adjust = calc_water_eye_adjustments(
            view.origin.z,
            fog.water_height,
            config.software_user_clip_plane,
            config.eye_water_epsilon,
        );
        let software_clip = config.software_user_clip_plane && adjust.z_adjust != 0.0;
        let aspect = view.aspect();
        let targets = scene.targets;

        let mut flags = DrawFlags::RENDER_ABOVEWATER | DrawFlags::DRAW_ENTITIES;
        let mut clear = ClearFlags::DEPTH;
        if draw_skybox {
            flags |= DrawFlags::DRAWSKYBOX;
        }
        if water.draw_water_surface {
            flags |= DrawFlags::RENDER_WATER;
        }
        if !water.refract && !water.opaque_water {
            flags |= DrawFlags::RENDER_UNDERWATER;
        }

        if water.reflect {
            let mut reflect_flags = DrawFlags::RENDER_REFLECTION
                | DrawFlags::CLIP_Z
                | DrawFlags::CLIP_BELOW
                | DrawFlags::RENDER_ABOVEWATER
                | DrawFlags::DRAWSKYBOX;
            if water.reflect_entities {
                reflect_flags |= DrawFlags::DRAW_ENTITIES;
            }
            let mut reflection = View3d::new(
                ViewKind::Reflection,
                water_reflection_setup(view, fog.water_height),
                ViewId::Reflection,
            )
            .with_flags(reflect_flags)
            .with_clear(ClearFlags::DEPTH)
            .with_water(fog.water_height, 0.0, fog.fog_volume)
            .with_target(targets.water_reflection, aspect);
            reflection.software_clip = config.software_user_clip_plane;
            reflection.force_view_leaf = u32::try_from(fog.fog_volume_leaf).ok();
            self.draw_view(scene, device, &reflection);
        }

        let mut intersects = false;
        if water.refract {
            let refraction = View3d::new(ViewKind::Refraction, *view, ViewId::Refraction)
                .with_flags(
                    DrawFlags::RENDER_REFRACTION
                        | DrawFlags::CLIP_Z
                        | DrawFlags::RENDER_UNDERWATER
                        | DrawFlags::FUDGE_UP
                        | DrawFlags::DRAW_ENTITIES,
                )
                .with_clear(ClearFlags::COLOR | ClearFlags::DEPTH)
                .with_water(adjust.water_height, adjust.z_adjust, fog.fog_volume)
                .with_target(targets.water_refraction, aspect);
            self.draw_view(scene, device, &refraction);
            if !software_clip {
                intersects =
                    does_view_plane_intersect_water(view, fog.water_height, fog.fog_volume, scene.spatial.as_ref());
            }
        } else if !flags.contains(DrawFlags::DRAWSKYBOX) {
            clear |= ClearFlags::COLOR;
        }

        if intersects && !self.config.software_user_clip_plane {
            flags |= DrawFlags::CLIP_Z | DrawFlags::CLIP_BELOW;
        }

        let mut above = View3d::new(ViewKind::AboveWater, *view, ViewId::Main)
            .with_flags(flags)
            .with_clear(clear)
            .with_water(adjust.water_height, adjust.z_adjust, fog.fog_volume);
        above.software_clip = software_clip;
        self.draw_view(scene, device, &above);

        if !water.refract {
            return;
        }
        if software_clip {
            let mut boundary = View3d::new(ViewKind::SoftwareIntersection, *view, ViewId::Main)
                .with_flags(DrawFlags::RENDER_UNDERWATER)
                .with_water(adjust.water_height, adjust.z_adjust, fog.fog_volume);
            boundary.software_clip = true;
            self.draw_view(scene, device, &boundary);
        } else if intersects {
            let boundary = View3d::new(ViewKind::Intersection, *view, ViewId::None)
                .with_flags(DrawFlags::RENDER_UNDERWATER | DrawFlags::CLIP_Z | DrawFlags::DRAW_ENTITIES)
                .with_water(fog.water_height, 0.0, fog.fog_volume);
            self.draw_view(scene, device, &boundary);
        }
    }

    fn draw_under_water(
        &mut self,
        scene: &mut Scene,
        device: &mut dyn RenderDevice,
        view: &ViewSetup,
        fog: &VisibleFogVolume,
        water: &WaterRenderInfo,
        draw_skybox: bool,
    ) {
        let config = &self.config;
        let software_clip = config.software_user_clip_plane;
        let adjust =
            calc_water_eye_adjustments(view.origin.z, fog.water_height, software_clip, config.eye_water_epsilon);

        if let Some(overlay) = fog.material.and_then(|material| material.underwater_overlay) {
            self.underwater_overlay = Some(overlay);
        }

        let mut flags = DrawFlags::FUDGE_UP | DrawFlags::RENDER_UNDERWATER | DrawFlags::DRAW_ENTITIES;
        if !software_clip {
            flags |= DrawFlags::CLIP_Z;
        }
        if water.draw_water_surface {
            flags |= DrawFlags::RENDER_WATER;
        }
        if !water.refract && !water.opaque_water {
            flags |= DrawFlags::RENDER_ABOVEWATER;
        }

        if water.refract {
            let mut refract_flags =
                DrawFlags::CLIP_Z | DrawFlags::CLIP_BELOW | DrawFlags::RENDER_ABOVEWATER | DrawFlags::DRAW_ENTITIES;
            let mut refract_clear = ClearFlags::DEPTH;
            if draw_skybox {
                refract_clear |= ClearFlags::COLOR;
                refract_flags |= DrawFlags::DRAWSKYBOX | DrawFlags::CLIP_SKYBOX;
            }
            let refraction = View3d::new(ViewKind::Refraction, *view, ViewId::Refraction)
                .with_flags(refract_flags)
                .with_clear(refract_clear)
                .with_water(adjust.water_height, adjust.z_adjust, fog.fog_volume);
            self.draw_view(scene, device, &refraction);
            device.capture_frame(scene.targets.water_refraction.texture, view);
        }

        let mut under = View3d::new(ViewKind::UnderWater, *view, ViewId::Main)
            .with_flags(flags)
            .with_clear(ClearFlags::DEPTH)
            .with_water(adjust.water_height, adjust.z_adjust, fog.fog_volume);
        under.software_clip = software_clip;
        self.draw_view(scene, device, &under);

        if adjust.z_adjust != 0.0 && software_clip && water.refract {
            let mut boundary = View3d::new(ViewKind::SoftwareIntersection, *view, ViewId::Main)
                .with_flags(DrawFlags::RENDER_ABOVEWATER)
                .with_water(adjust.water_height, adjust.z_adjust, fog.fog_volume);
            boundary.software_clip = true;
            self.draw_view(scene, device, &boundary);
        }
    }

    /// Renders every shadow depth texture the shadow manager asks for.
    pub fn draw_shadow_depth_views(
        &mut self,
        scene: &mut Scene,
        device: &mut dyn RenderDevice,
        main: &ViewSetup,
    ) -> usize {
        let requests = scene.shadows.compute_shadow_depth_textures(main);
        for request in &requests {
            let mut depth = View3d::new(ViewKind::ShadowDepth, request.view, ViewId::ShadowDepthTexture)
                .with_flags(DrawFlags::RENDER_UNDERWATER | DrawFlags::RENDER_ABOVEWATER | DrawFlags::SHADOW_DEPTH_MAP)
                .with_clear(ClearFlags::DEPTH);
            depth.target = Some(RenderTarget::new(request.depth_target, request.view.width, request.view.height));
            depth.shadow_depth = Some(ShadowDepthPass {
                draw_translucents: request.draw_translucents || self.config.flashlight_depth_draw_translucents,
                non_cached_only: request.non_cached_only,
            });
            self.draw_view(scene, device, &depth);
        }
        requests.len()
    }

    /// Draws the renderables attached to the view model with its own fov and
    /// depth range.
    pub fn draw_view_models(&mut self, scene: &mut Scene, device: &mut dyn RenderDevice, view: &ViewSetup) {
        if !self.config.draw_view_models || !self.config.draw_entities {
            return;
        }
        let ctx = AlphaContext {
            time: scene.time,
            view_origin: view.origin,
            view_forward: view.basis().forward,
            jitter_seed: u64::from(self.frame),
        };
        let lists = collate_view_model_renderables(&scene.leaves, &scene.alpha, &ctx);
        if lists.opaque.is_empty() && lists.translucent.is_empty() {
            return;
        }

        let setup = ViewSetup {
            fov: view.fov_viewmodel,
            z_near: view.z_near_viewmodel,
            z_far: view.z_far_viewmodel,
            ..*view
        };
        self.current.push(&setup, ViewId::Main);
        device.push_3d_view(&setup, ViewId::Main, ClearFlags::DEPTH, None);
        self.drawn.push(DrawnView {
            kind: ViewKind::ViewModel,
            id: ViewId::Main,
            depth: self.current.depth(),
            draw_flags: DrawFlags::empty(),
            clear_flags: ClearFlags::DEPTH,
            world_leaves: 0,
            renderables: lists.opaque.len() + lists.translucent.len(),
            cached: false,
        });

        for entry in &lists.opaque {
            draw_entry(device, entry, DrawModelFlags::RENDER | DrawModelFlags::VIEW_MODEL, 255);
        }
        for entry in &lists.translucent {
            if entry.alpha > 0 {
                let flags = DrawModelFlags::RENDER | DrawModelFlags::TRANSLUCENT | DrawModelFlags::VIEW_MODEL;
                draw_entry(device, entry, flags, entry.alpha);
            }
        }

        device.pop_view();
        self.current.pop();
    }

    /// Runs one view through setup, push, draw and pop.
    pub fn draw_view(&mut self, scene: &mut Scene, device: &mut dyn RenderDevice, view: &View3d) {
        let _span = tracing::debug_span!("draw_view", kind = view.kind.name()).entered();
        self.current.push(&view.setup, view.id);
        let lists = self.setup_lists(scene, view);
        self.drawn.push(DrawnView {
            kind: view.kind,
            id: view.id,
            depth: self.current.depth(),
            draw_flags: view.draw_flags,
            clear_flags: view.clear_flags,
            world_leaves: lists.world.leaves.len(),
            renderables: lists.renderables.len(),
            cached: lists.cached,
        });

        let clip = self.push_view(device, view);
        self.draw_execute(scene, device, view, &lists);
        pop_view(device, view, clip);
        self.current.pop();

        drop(lists.renderables);
        self.pool.recycle(lists.world);
    }

    fn setup_lists(&mut self, scene: &mut Scene, view: &View3d) -> ViewLists {
        let cached = if self.config.world_list_cache {
            self.cache.find(&view.setup, view.draw_flags)
        } else {
            None
        };
        let (lists, hit) = match cached {
            Some(lists) => (lists, true),
            None => (self.build_lists(scene, view), false),
        };

        let detail_frame = self.builder.world_list_builds() as u32;
        for &leaf in &lists.world.leaves {
            scene.leaves.draw_detail_objects_in_leaf(leaf, detail_frame);
        }
        ViewLists {
            world: lists.world,
            renderables: lists.renderables,
            detail_frame,
            cached: hit,
        }
    }

    fn build_lists(&mut self, scene: &mut Scene, view: &View3d) -> CachedLists {
        let request = WorldListRequest {
            force_view_leaf: view.force_view_leaf,
            shadow_depth: view.shadow_depth.is_some(),
            reflection_water_height: view
                .draw_flags
                .contains(DrawFlags::RENDER_REFLECTION)
                .then_some(view.water_height),
        };
        let built = self
            .builder
            .build_world_list(scene.spatial.as_ref(), &view.setup, &request, view.fog_volume);
        let world = match built.prune_for_water(view.draw_flags, &mut self.pool) {
            Some(pruned) => pruned,
            None => built,
        };

        let renderables = if draws_entities(view) {
            let mut params = BuildParams::new(&view.setup, view.id, &world);
            params.main_view_origin = self.main.origin;
            params.distance_scale = self.distance_scale;
            params.alpha = AlphaContext {
                time: scene.time,
                jitter_seed: u64::from(self.frame),
                ..AlphaContext::default()
            };
            if let Some(pass) = view.shadow_depth {
                params = params.shadow_depth(pass.draw_translucents, pass.non_cached_only);
            }
            self.builder.build(&mut scene.refs(), &params, self.frame)
        } else {
            RenderablesList::new(0)
        };

        let lists = CachedLists {
            world: Arc::new(world),
            renderables: Arc::new(renderables),
        };
        if self.config.world_list_cache {
            self.cache.add(&view.setup, view.draw_flags, lists.clone());
        }
        lists
    }

    fn push_view(&self, device: &mut dyn RenderDevice, view: &View3d) -> HeightClipMode {
        let flags = view.draw_flags;
        let mode = if flags.contains(DrawFlags::CLIP_Z) && self.config.clip_z {
            if flags.contains(DrawFlags::CLIP_BELOW) {
                HeightClipMode::RenderAbove
            } else {
                HeightClipMode::RenderBelow
            }
        } else {
            HeightClipMode::Disable
        };

        let mut clip_z = view.clip_height();
        let epsilon = self.config.eye_water_epsilon;
        if flags.contains(DrawFlags::RENDER_REFLECTION) && view.software_clip && view.setup.origin.z > clip_z - epsilon {
            clip_z = view.setup.origin.z + epsilon;
        }

        device.push_3d_view(&view.setup, view.id, view.clear_flags, view.target);
        if mode != HeightClipMode::Disable {
            device.set_height_clip(mode, clip_z);
        }
        if let Some(plane) = view.clip_plane {
            device.push_custom_clip_plane(plane);
        }
        mode
    }

    fn draw_execute(&mut self, scene: &mut Scene, device: &mut dyn RenderDevice, view: &View3d, lists: &ViewLists) {
        let flags = view.draw_flags;
        if self.config.draw_opaque_world && !flags.contains(DrawFlags::SKIP_WORLD) {
            device.draw_world_lists(
                &lists.world,
                flags | DrawFlags::SKIP_WORLD_DECALS_AND_OVERLAYS,
                view.water_z_adjust,
            );
        }

        if let Some(pass) = view.shadow_depth {
            self.draw_opaque(device, &lists.renderables, true);
            if pass.draw_translucents {
                self.draw_translucent(scene, device, view, lists, true);
            }
            return;
        }

        if draws_entities(view) {
            self.draw_opaque(device, &lists.renderables, false);
            self.draw_translucent(scene, device, view, lists, false);
            self.draw_no_z_translucent(device, &lists.renderables);
        } else {
            let mut queued = Vec::new();
            let world_flags = flags - DrawFlags::DRAWSKYBOX;
            let origin = view.setup.origin;
            self.draw_translucent_world_leaves(
                scene,
                device,
                lists,
                world_flags,
                0..lists.world.leaves.len(),
                &mut queued,
                origin,
            );
            scene.details.render_translucent_detail_objects(&queued, origin);
        }
    }

    /// Brushes, then static props and entities per size bucket, NPCs last.
    fn draw_opaque(&self, device: &mut dyn RenderDevice, list: &RenderablesList, shadow_depth: bool) {
        if !self.config.draw_opaque_renderables || !self.config.draw_entities {
            return;
        }
        let mut flags = DrawModelFlags::RENDER;
        if shadow_depth {
            flags |= DrawModelFlags::SHADOW_DEPTH;
        }

        for entry in list.brushes() {
            draw_entry(device, entry, flags, 255);
        }
        let mut npcs: Vec<&RenderListEntry> = Vec::new();
        for bucket in SizeBucket::ALL {
            for entry in list.group(EngineRenderGroup::OpaqueStatic(bucket)) {
                draw_entry(device, entry, flags, 255);
            }
            for entry in list.group(EngineRenderGroup::OpaqueEntity(bucket)) {
                if entry.renderable.upgrade().is_some_and(|r| r.is_npc()) {
                    npcs.push(entry);
                } else {
                    draw_entry(device, entry, flags, 255);
                }
            }
        }
        for entry in npcs {
            draw_entry(device, entry, flags, 255);
        }
    }

    /// Translucent world leaves and renderables interleaved back to front.
    fn draw_translucent(
        &self,
        scene: &mut Scene,
        device: &mut dyn RenderDevice,
        view: &View3d,
        lists: &ViewLists,
        shadow_depth: bool,
    ) {
        let mut model_flags = DrawModelFlags::RENDER | DrawModelFlags::TRANSLUCENT;
        if shadow_depth {
            model_flags |= DrawModelFlags::SHADOW_DEPTH;
        }
        let entries = lists.renderables.translucent();
        let draw_renderables = self.config.draw_entities && self.config.draw_translucent_renderables;

        if !self.config.draw_translucent_world {
            if draw_renderables {
                for entry in entries.iter().rev().filter(|e| !e.ignores_z) {
                    draw_translucent_entry(device, entry, model_flags);
                }
            }
            return;
        }

        let world_flags = view.draw_flags - DrawFlags::DRAWSKYBOX;
        let origin = view.setup.origin;
        let mut queued: Vec<LeafIndex> = Vec::new();
        let mut next = lists.world.leaves.len();

        if draw_renderables {
            let mut i = entries.len();
            while i > 0 {
                let this_leaf = entries[i - 1].world_list_leaf;
                if this_leaf < next {
                    self.draw_translucent_world_leaves(
                        scene,
                        device,
                        lists,
                        world_flags,
                        this_leaf..next,
                        &mut queued,
                        origin,
                    );
                    next = this_leaf;
                }

                let leaf = lists.world.leaves.get(this_leaf).copied();
                let with_details =
                    leaf.filter(|&leaf| scene.leaves.should_draw_detail_objects_in_leaf(leaf, lists.detail_frame));
                match with_details {
                    Some(leaf) => {
                        // The leaf's own details were queued last; draw the ones behind it.
                        if queued.last() == Some(&leaf) {
                            queued.pop();
                        }
                        scene.details.render_translucent_detail_objects(&queued, origin);
                        queued.clear();
                        while i > 0 && entries[i - 1].world_list_leaf == this_leaf {
                            let entry = &entries[i - 1];
                            if !entry.ignores_z {
                                draw_translucent_entry(device, entry, model_flags);
                            }
                            i -= 1;
                        }
                        scene.details.render_translucent_detail_objects_in_leaf(leaf, origin);
                    }
                    None => {
                        let entry = &entries[i - 1];
                        if !entry.ignores_z {
                            draw_translucent_entry(device, entry, model_flags);
                        }
                        i -= 1;
                    }
                }
            }
        }

        self.draw_translucent_world_leaves(scene, device, lists, world_flags, 0..next, &mut queued, origin);
        scene.details.render_translucent_detail_objects(&queued, origin);
    }

    /// Draws `range` of the world list back to front, queueing detail leaves
    /// and flushing them before the next leaf's surfaces.
    #[allow(clippy::too_many_arguments)]
    fn draw_translucent_world_leaves(
        &self,
        scene: &mut Scene,
        device: &mut dyn RenderDevice,
        lists: &ViewLists,
        flags: DrawFlags,
        range: std::ops::Range<usize>,
        queued: &mut Vec<LeafIndex>,
        origin: Vec3,
    ) {
        let world = &lists.world;
        for index in range.rev() {
            let actual = world
                .actual_leaf_index
                .as_ref()
                .and_then(|actual| actual.get(index).copied())
                .unwrap_or(index);
            if !queued.is_empty() {
                scene.details.render_translucent_detail_objects(queued, origin);
                queued.clear();
            }
            device.draw_translucent_world_leaf(world, actual, flags);

            let leaf = world.leaves[index];
            if scene.leaves.should_draw_detail_objects_in_leaf(leaf, lists.detail_frame) {
                queued.push(leaf);
            }
        }
    }

    /// Renderables that ignore the depth buffer, after everything else.
    fn draw_no_z_translucent(&self, device: &mut dyn RenderDevice, list: &RenderablesList) {
        if !self.config.draw_entities || !self.config.draw_translucent_renderables {
            return;
        }
        let flags = DrawModelFlags::RENDER | DrawModelFlags::TRANSLUCENT | DrawModelFlags::IGNORE_Z;
        for entry in list.translucent().iter().rev().filter(|e| e.ignores_z) {
            draw_translucent_entry(device, entry, flags);
        }
    }
}

impl Default for ViewComposer {
    fn default() -> Self {
        Self::new(ViewConfig::default())
    }
}

fn pop_view(device: &mut dyn RenderDevice, view: &View3d, clip: HeightClipMode) {
    if view.clip_plane.is_some() {
        device.pop_custom_clip_plane();
    }
    if clip != HeightClipMode::Disable {
        device.set_height_clip(HeightClipMode::Disable, 0.0);
    }
    device.pop_view();
}

/// Skybox and shadow-depth views always draw their renderables.
fn draws_entities(view: &View3d) -> bool {
    view.draw_flags.contains(DrawFlags::DRAW_ENTITIES) || matches!(view.kind, ViewKind::Skybox | ViewKind::ShadowDepth)
}

fn draw_entry(device: &mut dyn RenderDevice, entry: &RenderListEntry, flags: DrawModelFlags, alpha: u8) -> bool {
    let Some(renderable) = entry.renderable.upgrade() else {
        return false;
    };
    let mut flags = flags;
    if entry.two_pass {
        flags |= DrawModelFlags::TWO_PASS;
    }
    device.draw_renderable(entry.handle, renderable.as_ref(), flags, alpha)
}

fn draw_translucent_entry(device: &mut dyn RenderDevice, entry: &RenderListEntry, flags: DrawModelFlags) {
    if entry.alpha == 0 {
        return;
    }
    draw_entry(device, entry, flags, entry.alpha);
}
