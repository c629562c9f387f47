use std::sync::Arc;

use glam::Vec3;
use leafview_alpha::{AlphaContext, AlphaPropertyPool};
use leafview_common::{
    Aabb, AlphaHandle, DetailObjectSystem, EngineRenderGroup, Frustum, ModelType, RenderConfig, Renderable,
    ShadowId, ShadowManager, SizeBucket, SpatialQuery, ViewId, ViewSetup, WorldListRequest,
};
use leafview_leaf::{BuildEntry, BuildItem, LeafSystem, ListItem};

use crate::fade::{
    ScreenFadeRange, ScreenSizeInfo, combine_alpha, distance_fade_factor, is_beyond_fade_end, screen_fade_factor,
};
use crate::list::{GroupHighWater, RenderListEntry, RenderablesList, view_depth};
use crate::world_list::WorldListInfo;

/// Switches of the render-list builder.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    pub draw_static_props: bool,
    pub occlusion_enabled: bool,
    pub draw_all_renderables: bool,
    pub portal_test_entities: bool,
    pub portals_open_all: bool,
    pub draw_detail_props: bool,
    pub max_group_entities: usize,
    pub max_renderable_distance: f32,
    pub level_fade: ScreenFadeRange,
    pub view_fade: ScreenFadeRange,
    pub parallel_alpha: bool,
    pub parallel_alpha_min: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self::from(&RenderConfig::default())
    }
}

impl From<&RenderConfig> for BuilderConfig {
    fn from(config: &RenderConfig) -> Self {
        Self {
            draw_static_props: config.draw_static_props,
            occlusion_enabled: config.occlusion_enabled,
            draw_all_renderables: config.draw_all_renderables,
            portal_test_entities: config.portal_test_entities,
            portals_open_all: config.portals_open_all,
            draw_detail_props: config.draw_detail_props,
            max_group_entities: config.max_group_entities,
            max_renderable_distance: config.max_renderable_distance,
            level_fade: ScreenFadeRange::new(config.level_fade_min_size, config.level_fade_max_size),
            view_fade: ScreenFadeRange::new(config.screen_fade_min_size, config.screen_fade_max_size),
            parallel_alpha: config.parallel_alpha,
            parallel_alpha_min: config.parallel_alpha_min,
        }
    }
}

/// What one list build is for.
#[derive(Debug, Clone, Copy)]
pub struct BuildParams<'a> {
    pub view: &'a ViewSetup,
    pub view_id: ViewId,
    pub world: &'a WorldListInfo,
    /// The pass draws translucent renderables; otherwise only fade-end culling runs.
    pub draw_translucents: bool,
    pub shadow_depth: bool,
    /// Shadow-depth update that only redraws renderables excluded from the cache.
    pub non_cached_shadow_depth: bool,
    /// Distance fading in shadow-depth views is measured from the main camera.
    pub main_view_origin: Vec3,
    /// Zoom adjustment applied to fade distances.
    pub distance_scale: f32,
    /// Scene time and jitter seed; the view axis is filled in from `view`.
    pub alpha: AlphaContext,
}

impl<'a> BuildParams<'a> {
    pub fn new(view: &'a ViewSetup, view_id: ViewId, world: &'a WorldListInfo) -> Self {
        Self {
            view,
            view_id,
            world,
            draw_translucents: true,
            shadow_depth: false,
            non_cached_shadow_depth: false,
            main_view_origin: view.origin,
            distance_scale: 1.0,
            alpha: AlphaContext::default(),
        }
    }

    pub fn shadow_depth(mut self, draw_translucents: bool, non_cached_only: bool) -> Self {
        self.shadow_depth = true;
        self.draw_translucents = draw_translucents;
        self.non_cached_shadow_depth = non_cached_only;
        self
    }

    fn fade_origin(&self) -> Vec3 {
        if self.shadow_depth {
            self.main_view_origin
        } else {
            self.view.origin
        }
    }
}

/// Collaborators and registries a list build reads and updates.
pub struct SceneRefs<'a> {
    pub leaves: &'a mut LeafSystem,
    pub alpha: &'a AlphaPropertyPool,
    pub spatial: &'a dyn SpatialQuery,
    pub shadows: &'a mut dyn ShadowManager,
    pub details: &'a mut dyn DetailObjectSystem,
}

/// Counts from the last list build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub flattened: usize,
    pub after_dedup: usize,
    pub stripped: usize,
    pub culled: usize,
    pub faded: usize,
    pub occluded: usize,
    pub details: usize,
    pub opaque: usize,
    pub translucent: usize,
    pub parallel_alpha: bool,
}

/// Turns a view's visible leaves into sorted draw lists.
#[derive(Debug)]
pub struct RenderListBuilder {
    config: BuilderConfig,
    items: Vec<ListItem>,
    high_water: GroupHighWater,
    world_list_builds: u64,
    renderables_list_builds: u64,
    last_stats: BuildStats,
}

impl Default for RenderListBuilder {
    fn default() -> Self {
        Self::new(BuilderConfig::default())
    }
}

impl RenderListBuilder {
    pub fn new(config: BuilderConfig) -> Self {
        Self {
            config,
            items: Vec::new(),
            high_water: GroupHighWater::default(),
            world_list_builds: 0,
            renderables_list_builds: 0,
            last_stats: BuildStats::default(),
        }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: BuilderConfig) {
        self.config = config;
    }

    pub fn last_stats(&self) -> &BuildStats {
        &self.last_stats
    }

    pub fn high_water(&self) -> &GroupHighWater {
        &self.high_water
    }

    pub fn world_list_builds(&self) -> u64 {
        self.world_list_builds
    }

    pub fn renderables_list_builds(&self) -> u64 {
        self.renderables_list_builds
    }

    /// Asks the spatial service for the view's visible leaves.
    pub fn build_world_list(
        &mut self,
        spatial: &dyn SpatialQuery,
        view: &ViewSetup,
        request: &WorldListRequest,
        view_fog_volume: i32,
    ) -> WorldListInfo {
        self.world_list_builds += 1;
        let built = spatial.build_world_lists(view, request);
        tracing::trace!(build = self.world_list_builds, leaves = built.leaves.len(), "world list built");
        WorldListInfo::from_built(built, view_fog_volume)
    }

    /// Runs the full filter pipeline for one view.
    pub fn build(&mut self, scene: &mut SceneRefs<'_>, params: &BuildParams<'_>, frame: u32) -> RenderablesList {
        let _span = tracing::debug_span!("build_renderables_list", view = ?params.view_id, frame).entered();
        self.renderables_list_builds += 1;
        let mut stats = BuildStats::default();
        let config = &self.config;
        let leaves = &mut *scene.leaves;

        let draw_all = config.draw_all_renderables && params.view_id != ViewId::Skybox3d;
        leaves.collect_leaf_renderables(&params.world.leaves, draw_all, &mut self.items);
        stats.flattened = self.items.len();

        leaves.extract_duplicates(frame, &mut self.items);
        stats.after_dedup = self.items.len();

        if !config.draw_static_props {
            stats.stripped += leaves.extract_static_props(&mut self.items);
        }
        if params.shadow_depth {
            stats.stripped += leaves.extract_disable_shadow_depth(&mut self.items);
            if params.non_cached_shadow_depth {
                stats.stripped += leaves.extract_disable_shadow_depth_cache(&mut self.items);
            }
        }
        if !params.draw_translucents {
            stats.stripped += leaves.extract_translucent(&mut self.items);
        }

        let mut built = leaves.compute_bounds(&self.items);

        let frustum = params.view.frustum();
        stats.culled = extract_culled(config, &mut built, leaves, scene.spatial, params, &frustum);

        if params.draw_translucents {
            let (faded, parallel) = compute_translucency(
                config,
                &mut built,
                leaves,
                scene.alpha,
                scene.spatial,
                &mut *scene.shadows,
                params,
            );
            stats.faded = faded;
            stats.parallel_alpha = parallel;
        } else {
            stats.faded = extract_faded(&mut built, leaves, scene.alpha, params);
        }

        if config.occlusion_enabled {
            let spatial = scene.spatial;
            stats.occluded = retain_entries(&mut built, leaves, |entry| {
                !(entry.perform_occlusion_test && spatial.is_occluded(&entry.bounds))
            });
        }

        let list = self.add_renderables_to_lists(&built, scene, params, &mut stats);
        self.high_water.observe(&list);
        stats.opaque = list.opaque_count();
        stats.translucent = list.translucent().len();
        tracing::trace!(?stats, "renderables list built");
        self.last_stats = stats;
        list
    }

    fn add_renderables_to_lists(
        &self,
        built: &[BuildItem],
        scene: &mut SceneRefs<'_>,
        params: &BuildParams<'_>,
        stats: &mut BuildStats,
    ) -> RenderablesList {
        let mut list = RenderablesList::presized(self.config.max_group_entities, &self.high_water);
        let origin = params.view.origin;
        let forward = params.view.basis().forward;

        let mut details = if self.config.draw_detail_props && params.view_id != ViewId::Skybox3d {
            scene.details.build_rendering_data(&params.world.leaves, origin)
        } else {
            Vec::new()
        };
        details.sort_by_key(|d| d.leaf_list_index);
        let mut next_detail = 0;

        let mut translucent_start = 0;
        let mut current_leaf = 0;
        for item in built {
            match item {
                BuildItem::Leaf { list_index, .. } => {
                    list.sort_translucent_from(translucent_start);
                    translucent_start = list.translucent().len();
                    current_leaf = *list_index;

                    while let Some(detail) = details.get(next_detail) {
                        if detail.leaf_list_index > current_leaf {
                            break;
                        }
                        next_detail += 1;
                        let Some(renderable) = detail.renderable.upgrade() else {
                            continue;
                        };
                        let entry = RenderListEntry {
                            handle: None,
                            renderable: detail.renderable.clone(),
                            world_list_leaf: current_leaf,
                            alpha: if detail.translucent { detail.alpha } else { 255 },
                            two_pass: false,
                            model_type: ModelType::Entity,
                            ignores_z: false,
                            view_depth: sort_depth(renderable.as_ref(), origin, forward),
                        };
                        let group = if detail.translucent {
                            EngineRenderGroup::TranslucentEntity
                        } else {
                            EngineRenderGroup::OpaqueEntity(SizeBucket::Tiny)
                        };
                        list.push(group, entry);
                        stats.details += 1;
                    }
                }
                BuildItem::Renderable(entry) => add_entry(&mut list, entry, current_leaf, origin, forward),
            }
        }
        list.sort_translucent_from(translucent_start);
        list
    }
}

fn sort_depth(renderable: &dyn Renderable, origin: Vec3, forward: Vec3) -> f32 {
    let center = renderable.render_origin() + renderable.render_bounds().center();
    view_depth(center, origin, forward)
}

/// Routes one entry: fully opaque into its opaque group, anything else into
/// the translucent group, two-pass entries additionally opaque at full alpha.
fn add_entry(list: &mut RenderablesList, entry: &BuildEntry, leaf: usize, origin: Vec3, forward: Vec3) {
    let mut slot = RenderListEntry {
        handle: Some(entry.handle),
        renderable: Arc::downgrade(&entry.renderable),
        world_list_leaf: leaf,
        alpha: 255,
        two_pass: entry.two_pass,
        model_type: entry.model_type,
        ignores_z: entry.ignores_z,
        view_depth: sort_depth(entry.renderable.as_ref(), origin, forward),
    };
    if entry.alpha == 255 && entry.is_opaque() {
        list.push(entry.opaque_group, slot);
        return;
    }
    if entry.two_pass {
        list.push(entry.opaque_group, slot.clone());
    }
    slot.alpha = entry.alpha;
    list.push(EngineRenderGroup::TranslucentEntity, slot);
}

/// Drops entries failing `keep`, undoing their drawn stamp.
fn retain_entries(
    items: &mut Vec<BuildItem>,
    leaves: &mut LeafSystem,
    mut keep: impl FnMut(&mut BuildEntry) -> bool,
) -> usize {
    let before = items.len();
    items.retain_mut(|item| match item {
        BuildItem::Leaf { .. } => true,
        BuildItem::Renderable(entry) => {
            if keep(entry) {
                true
            } else {
                leaves.unmark_drawn(entry.handle);
                false
            }
        }
    });
    before - items.len()
}

fn max_render_distance_sq(config: &BuilderConfig, params: &BuildParams<'_>) -> f32 {
    let distance = if params.shadow_depth {
        params.view.z_far.min(config.max_renderable_distance)
    } else {
        config.max_renderable_distance
    };
    distance * distance
}

fn extract_culled(
    config: &BuilderConfig,
    items: &mut Vec<BuildItem>,
    leaves: &mut LeafSystem,
    spatial: &dyn SpatialQuery,
    params: &BuildParams<'_>,
    frustum: &Frustum,
) -> usize {
    let max_dist_sq = max_render_distance_sq(config, params);
    let area_test = config.portal_test_entities && !config.portals_open_all;
    let origin = params.view.origin;
    retain_entries(items, leaves, |entry| {
        if entry.bounds.dist_sq_to_point(origin) > max_dist_sq {
            return false;
        }
        if area_test && entry.area >= 0 {
            spatial.does_box_touch_area_frustum(frustum, &entry.bounds, entry.area)
        } else {
            !spatial.cull_box(frustum, &entry.bounds)
        }
    })
}

/// Fade-end culling for passes that never blend.
fn extract_faded(
    items: &mut Vec<BuildItem>,
    leaves: &mut LeafSystem,
    pool: &AlphaPropertyPool,
    params: &BuildParams<'_>,
) -> usize {
    let origin = params.fade_origin();
    retain_entries(items, leaves, |entry| {
        let Some(prop) = entry.alpha_property.and_then(|h| pool.get(h)) else {
            return true;
        };
        !is_beyond_fade_end(prop, &entry.bounds, origin, params.distance_scale)
    })
}

struct AlphaJob<'e> {
    index: usize,
    handle: AlphaHandle,
    renderable: &'e dyn Renderable,
    bounds: Aabb,
}

#[derive(Debug, Clone, Copy, Default)]
struct AlphaResult {
    alpha: u8,
    ignores_z: bool,
    shadow: Option<(ShadowId, u8)>,
}

struct FadeInputs {
    ctx: AlphaContext,
    origin: Vec3,
    distance_scale: f32,
    apply_fades: bool,
    level_fade: ScreenFadeRange,
    view_fade: ScreenFadeRange,
    screen: ScreenSizeInfo,
}

fn evaluate_alpha(job: &AlphaJob<'_>, pool: &AlphaPropertyPool, inputs: &FadeInputs) -> AlphaResult {
    let Some(prop) = pool.get(job.handle) else {
        return AlphaResult {
            alpha: 255,
            ignores_z: false,
            shadow: None,
        };
    };
    let (distance, screen) = if inputs.apply_fades {
        let level = screen_fade_factor(&job.bounds, prop.fade_scale(), inputs.level_fade, &inputs.screen);
        let view = screen_fade_factor(&job.bounds, prop.fade_scale(), inputs.view_fade, &inputs.screen);
        (
            distance_fade_factor(prop, &job.bounds, inputs.origin, inputs.distance_scale),
            level.min(view),
        )
    } else {
        (1.0, 1.0)
    };
    let base = prop.compute_render_alpha(false, &inputs.ctx, Some(job.renderable));
    // shadows fade through their falloff bias, never through the renderable's fades
    let shadow = prop
        .shadow()
        .map(|id| (id, prop.compute_render_alpha(true, &inputs.ctx, Some(job.renderable))));
    AlphaResult {
        alpha: combine_alpha(base, distance, screen),
        ignores_z: prop.ignores_z_buffer(),
        shadow,
    }
}

/// Final alpha and depth-test mode of every entry with an alpha property;
/// entries that end up fully transparent are dropped. Returns the drop count and whether the
/// evaluation ran in parallel.
fn compute_translucency(
    config: &BuilderConfig,
    items: &mut Vec<BuildItem>,
    leaves: &mut LeafSystem,
    pool: &AlphaPropertyPool,
    spatial: &dyn SpatialQuery,
    shadows: &mut dyn ShadowManager,
    params: &BuildParams<'_>,
) -> (usize, bool) {
    let view = params.view;
    let basis = view.basis();
    let inputs = FadeInputs {
        ctx: AlphaContext {
            view_origin: view.origin,
            view_forward: basis.forward,
            ..params.alpha
        },
        origin: params.fade_origin(),
        distance_scale: params.distance_scale,
        apply_fades: params.view_id != ViewId::Skybox3d,
        level_fade: config.level_fade,
        view_fade: config.view_fade,
        screen: ScreenSizeInfo {
            view_projection: view.view_projection(),
            view_up: basis.up,
            viewport_height: view.height as f32,
        },
    };

    let jobs: Vec<AlphaJob<'_>> = items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let entry = item.entry()?;
            Some(AlphaJob {
                index,
                handle: entry.alpha_property?,
                renderable: entry.renderable.as_ref(),
                bounds: entry.bounds,
            })
        })
        .collect();

    let parallel = config.parallel_alpha && jobs.len() >= config.parallel_alpha_min.max(2);
    let mut results = vec![AlphaResult::default(); jobs.len()];
    if parallel {
        let workers = std::thread::available_parallelism().map_or(4, |n| n.get());
        let chunk = jobs.len().div_ceil(workers).max(1);
        spatial.lock_model_cache();
        std::thread::scope(|scope| {
            let inputs = &inputs;
            for (job_chunk, out_chunk) in jobs.chunks(chunk).zip(results.chunks_mut(chunk)) {
                scope.spawn(move || {
                    for (job, out) in job_chunk.iter().zip(out_chunk) {
                        *out = evaluate_alpha(job, pool, inputs);
                    }
                });
            }
        });
        spatial.unlock_model_cache();
    } else {
        for (job, out) in jobs.iter().zip(results.iter_mut()) {
            *out = evaluate_alpha(job, pool, &inputs);
        }
    }

    let indices: Vec<usize> = jobs.iter().map(|job| job.index).collect();
    drop(jobs);
    for (index, result) in indices.into_iter().zip(results) {
        if let Some((shadow, shadow_alpha)) = result.shadow {
            shadows.set_falloff_bias(shadow, 255 - shadow_alpha);
        }
        if let BuildItem::Renderable(entry) = &mut items[index] {
            entry.alpha = result.alpha;
            entry.ignores_z = result.ignores_z;
        }
    }

    let dropped = retain_entries(items, leaves, |entry| entry.alpha != 0);
    (dropped, parallel)
}

/// View-model draw lists.
#[derive(Debug, Clone, Default)]
pub struct ViewModelLists {
    pub opaque: Vec<RenderListEntry>,
    pub translucent: Vec<RenderListEntry>,
}

/// Splits the renderables drawn with the view model into opaque and
/// translucent lists, newest registration first.
pub fn collate_view_model_renderables(
    leaves: &LeafSystem,
    pool: &AlphaPropertyPool,
    ctx: &AlphaContext,
) -> ViewModelLists {
    let mut lists = ViewModelLists::default();
    for &handle in leaves.view_models().iter().rev() {
        let Some(info) = leaves.info(handle) else {
            continue;
        };
        if info.is_disabled() {
            continue;
        }
        let Some(renderable) = info.renderable() else {
            continue;
        };
        let prop = info.alpha().and_then(|a| pool.get(a));
        let alpha = prop.map_or(255, |p| p.compute_render_alpha(false, ctx, Some(renderable.as_ref())));
        let entry = RenderListEntry {
            handle: Some(handle),
            renderable: Arc::downgrade(&renderable),
            world_list_leaf: 0,
            alpha: 255,
            two_pass: info.is_two_pass(),
            model_type: info.model_type(),
            ignores_z: prop.is_some_and(|p| p.ignores_z_buffer()),
            view_depth: 0.0,
        };
        if alpha != 255 || !info.is_opaque() {
            if info.is_two_pass() {
                lists.opaque.push(entry.clone());
            }
            lists.translucent.push(RenderListEntry { alpha, ..entry });
        } else {
            lists.opaque.push(entry);
        }
    }
    lists
}
