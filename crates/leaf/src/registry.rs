use std::collections::HashMap;
use std::sync::{Arc, Weak};

use leafview_common::{
    Aabb, AlphaHandle, LeafIndex, ModelType, RenderConfig, RenderHandle, Renderable, ShadowHandle,
    ShadowManager, SpatialQuery, TranslucencyType,
};
use slotmap::SlotMap;

use crate::deferred::{DeferredInserts, PendingInsert};
use crate::info::{RenderFlags, RenderableDesc, RenderableInfo};
use crate::links::LinkSet;
use crate::shadow::ShadowInfo;

/// Grid the bloated bounds snap to, in world units.
pub const BLOAT_GRANULARITY: f32 = 32.0;

/// Switches of the leaf registry.
#[derive(Debug, Clone)]
pub struct LeafConfig {
    /// Propagate every shadow in a leaf to its renderables, not just flashlights.
    pub shadows_on_renderables: bool,
    pub draw_detail_props: bool,
    /// Passes over the dirty list before giving up.
    pub max_dirty_iterations: u32,
    pub threaded_leaf_insert: bool,
    /// Dirty batches smaller than this stay on the calling thread.
    pub threaded_leaf_insert_min: usize,
}

impl Default for LeafConfig {
    fn default() -> Self {
        Self::from(&RenderConfig::default())
    }
}

impl From<&RenderConfig> for LeafConfig {
    fn from(config: &RenderConfig) -> Self {
        Self {
            shadows_on_renderables: config.shadows_on_renderables,
            draw_detail_props: config.draw_detail_props,
            max_dirty_iterations: config.max_dirty_iterations,
            threaded_leaf_insert: config.threaded_leaf_insert,
            threaded_leaf_insert_min: config.threaded_leaf_insert_min,
        }
    }
}

/// Per-leaf data owned by other subsystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafSubsystem {
    DetailObjects,
    Particles,
}

impl LeafSubsystem {
    const COUNT: usize = 2;

    fn slot(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LeafData {
    detail_first: u32,
    detail_count: u32,
    detail_frame: u32,
    subsystem: [Option<u32>; LeafSubsystem::COUNT],
}

impl Default for LeafData {
    fn default() -> Self {
        Self {
            detail_first: 0,
            detail_count: 0,
            detail_frame: u32::MAX,
            subsystem: [None; LeafSubsystem::COUNT],
        }
    }
}

/// Outcome of the last [`LeafSystem::recompute_leaves`].
#[derive(Debug, Clone, Default)]
pub struct RecomputeStats {
    pub iterations: u32,
    pub processed: usize,
    pub reinserted: usize,
    pub threaded: bool,
    /// Dirty handles left when the iteration cap was hit.
    pub abandoned: usize,
}

/// Snapshot of registry sizes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeafStats {
    pub renderables: usize,
    pub view_models: usize,
    pub leaves: usize,
    pub shadows: usize,
    pub leaf_links: usize,
    pub shadow_leaf_links: usize,
    pub shadow_receiver_links: usize,
    pub dirty: usize,
}

struct LeafWork {
    handle: RenderHandle,
    renderable: Arc<dyn Renderable>,
    previous: Aabb,
    bloat: bool,
}

/// Many-to-many index of renderables and shadows over spatial leaves.
///
/// Leaf membership is refreshed lazily: [`mark_changed`](Self::mark_changed)
/// queues a handle and [`recompute_leaves`](Self::recompute_leaves) moves every
/// queued handle whose bloated bounds changed.
#[derive(Debug)]
pub struct LeafSystem {
    pub(crate) config: LeafConfig,
    pub(crate) renderables: SlotMap<RenderHandle, RenderableInfo>,
    by_ptr: HashMap<usize, RenderHandle>,
    pub(crate) leaves: Vec<LeafData>,
    pub(crate) leaf_renderables: LinkSet<LeafIndex, RenderHandle>,
    pub(crate) shadows: SlotMap<ShadowHandle, ShadowInfo>,
    pub(crate) leaf_shadows: LinkSet<LeafIndex, ShadowHandle>,
    pub(crate) renderable_shadows: LinkSet<RenderHandle, ShadowHandle>,
    dirty: Vec<RenderHandle>,
    view_models: Vec<RenderHandle>,
    pub(crate) shadow_enum: u32,
    pub(crate) dedup_pass: u32,
    pub(crate) alternate_sort_count: u32,
    pub(crate) disable_shadow_depth_count: u32,
    pub(crate) disable_shadow_depth_cache_count: u32,
    last_recompute: RecomputeStats,
}

fn ptr_key(renderable: &Weak<dyn Renderable>) -> usize {
    renderable.as_ptr() as *const () as usize
}

/// Next generation of a wrapping counter; zero is reserved for "never stamped".
pub(crate) fn next_generation(current: u32) -> u32 {
    match current.wrapping_add(1) {
        0 => 1,
        n => n,
    }
}

impl Default for LeafSystem {
    fn default() -> Self {
        Self::new(LeafConfig::default())
    }
}

impl LeafSystem {
    pub fn new(config: LeafConfig) -> Self {
        Self {
            config,
            renderables: SlotMap::with_key(),
            by_ptr: HashMap::new(),
            leaves: Vec::new(),
            leaf_renderables: LinkSet::new(),
            shadows: SlotMap::with_key(),
            leaf_shadows: LinkSet::new(),
            renderable_shadows: LinkSet::new(),
            dirty: Vec::new(),
            view_models: Vec::new(),
            shadow_enum: 0,
            dedup_pass: 0,
            alternate_sort_count: 0,
            disable_shadow_depth_count: 0,
            disable_shadow_depth_cache_count: 0,
            last_recompute: RecomputeStats::default(),
        }
    }

    pub fn config(&self) -> &LeafConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: LeafConfig) {
        self.config = config;
    }

    /// Starts a level with `leaf_count` empty leaves.
    pub fn level_init(&mut self, leaf_count: u32) {
        self.level_shutdown();
        self.leaves = vec![LeafData::default(); leaf_count as usize];
        tracing::debug!(leaf_count, "leaf system initialized");
    }

    /// Drops every renderable, shadow, link and pending change.
    pub fn level_shutdown(&mut self) {
        self.renderables.clear();
        self.by_ptr.clear();
        self.leaves.clear();
        self.leaf_renderables.clear();
        self.shadows.clear();
        self.leaf_shadows.clear();
        self.renderable_shadows.clear();
        self.dirty.clear();
        self.view_models.clear();
        self.alternate_sort_count = 0;
        self.disable_shadow_depth_count = 0;
        self.disable_shadow_depth_cache_count = 0;
    }

    pub fn leaf_count(&self) -> u32 {
        self.leaves.len() as u32
    }

    /// Registers a renderable without placing it. Registering the same
    /// renderable twice warns and returns the existing handle.
    pub fn create_renderable_handle(&mut self, desc: RenderableDesc) -> RenderHandle {
        let key = ptr_key(&desc.renderable);
        if let Some(&existing) = self.by_ptr.get(&key) {
            let live = self
                .renderables
                .get(existing)
                .is_some_and(|info| info.renderable.strong_count() > 0 && Weak::ptr_eq(&info.renderable, &desc.renderable));
            if live {
                tracing::warn!(?existing, "renderable already registered");
                return existing;
            }
        }

        let mut info = RenderableInfo::new(&desc);
        if desc.render_with_view_models {
            info.flags |= RenderFlags::RENDER_WITH_VIEWMODELS;
        }
        let handle = self.renderables.insert(info);
        self.by_ptr.insert(key, handle);
        if desc.render_with_view_models {
            self.view_models.push(handle);
        }
        tracing::trace!(?handle, model = ?desc.model_type, translucency = ?desc.translucency, "renderable registered");
        handle
    }

    /// Registers and queues for leaf insertion.
    pub fn add_renderable(&mut self, desc: RenderableDesc) -> RenderHandle {
        let handle = self.create_renderable_handle(desc);
        self.mark_changed(handle);
        handle
    }

    pub fn remove_renderable(&mut self, handle: RenderHandle, shadows: &mut dyn ShadowManager) {
        let Some(info) = self.renderables.get(handle) else {
            tracing::warn!(?handle, "removing unknown renderable");
            return;
        };
        let flags = info.flags;
        let key = ptr_key(&info.renderable);

        if flags.contains(RenderFlags::ALTERNATE_SORTING) {
            self.alternate_sort_count = self.alternate_sort_count.saturating_sub(1);
        }
        if flags.contains(RenderFlags::DISABLE_SHADOW_DEPTH) {
            self.disable_shadow_depth_count = self.disable_shadow_depth_count.saturating_sub(1);
        }
        if flags.contains(RenderFlags::DISABLE_SHADOW_DEPTH_CACHING) {
            self.disable_shadow_depth_cache_count = self.disable_shadow_depth_cache_count.saturating_sub(1);
        }
        if flags.contains(RenderFlags::HAS_CHANGED) {
            self.dirty.retain(|h| *h != handle);
        }
        if flags.contains(RenderFlags::RENDER_WITH_VIEWMODELS) {
            self.view_models.retain(|h| *h != handle);
        }

        self.remove_from_tree(handle, shadows);
        self.renderables.remove(handle);
        if self.by_ptr.get(&key) == Some(&handle) {
            self.by_ptr.remove(&key);
        }
        tracing::trace!(?handle, "renderable removed");
    }

    /// Invalidates cached bounds and queues the handle for leaf recomputation.
    pub fn mark_changed(&mut self, handle: RenderHandle) {
        let Some(info) = self.renderables.get_mut(handle) else {
            tracing::warn!(?handle, "marking unknown renderable changed");
            return;
        };
        info.flags.remove(RenderFlags::BOUNDS_VALID);
        if info.flags.contains(RenderFlags::HAS_CHANGED) {
            return;
        }
        info.flags.insert(RenderFlags::HAS_CHANGED);
        self.dirty.push(handle);
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Moves every dirty renderable whose bloated bounds changed into the leaves
    /// those bounds overlap.
    pub fn recompute_leaves(&mut self, spatial: &dyn SpatialQuery, shadows: &mut dyn ShadowManager) {
        let _span = tracing::debug_span!("recompute_leaves", dirty = self.dirty.len()).entered();
        let mut stats = RecomputeStats::default();

        while !self.dirty.is_empty() {
            if stats.iterations >= self.config.max_dirty_iterations {
                stats.abandoned = self.dirty.len();
                tracing::warn!(
                    remaining = self.dirty.len(),
                    iterations = stats.iterations,
                    "too many dirty renderables; leaf recompute stopped"
                );
                break;
            }
            stats.iterations += 1;

            let batch = std::mem::take(&mut self.dirty);
            let mut work = Vec::with_capacity(batch.len());
            for &handle in batch.iter().rev() {
                let Some(info) = self.renderables.get_mut(handle) else {
                    continue;
                };
                info.flags.remove(RenderFlags::HAS_CHANGED);
                if info.is_view_model() {
                    continue;
                }
                let Some(renderable) = info.renderable.upgrade() else {
                    continue;
                };
                work.push(LeafWork {
                    handle,
                    renderable,
                    previous: info.bloated,
                    bloat: info.flags.contains(RenderFlags::BLOAT_BOUNDS),
                });
            }
            stats.processed += work.len();

            let threaded = self.config.threaded_leaf_insert && work.len() >= self.config.threaded_leaf_insert_min.max(2);
            stats.threaded |= threaded;
            let pending = if threaded {
                place_threaded(&work, spatial)
            } else {
                work.iter()
                    .enumerate()
                    .map(|(order, item)| placement(order, item, spatial))
                    .collect()
            };

            for item in pending {
                if self.apply_placement(item, spatial, shadows) {
                    stats.reinserted += 1;
                }
            }
        }

        tracing::trace!(
            iterations = stats.iterations,
            processed = stats.processed,
            reinserted = stats.reinserted,
            "leaf recompute complete"
        );
        self.last_recompute = stats;
    }

    pub fn last_recompute(&self) -> &RecomputeStats {
        &self.last_recompute
    }

    fn apply_placement(
        &mut self,
        item: PendingInsert,
        spatial: &dyn SpatialQuery,
        shadows: &mut dyn ShadowManager,
    ) -> bool {
        let Some(leaves) = item.leaves else {
            return false;
        };
        if !self.renderables.contains_key(item.handle) {
            return false;
        }
        self.remove_from_tree(item.handle, shadows);
        self.insert_into_tree(item.handle, item.bloated, &leaves, shadows);
        let area = spatial.leaves_area(&leaves);
        if let Some(info) = self.renderables.get_mut(item.handle) {
            info.area = area;
        }
        true
    }

    fn insert_into_tree(
        &mut self,
        handle: RenderHandle,
        bloated: Aabb,
        leaves: &[LeafIndex],
        shadows: &mut dyn ShadowManager,
    ) {
        self.shadow_enum = next_generation(self.shadow_enum);
        let Some(info) = self.renderables.get_mut(handle) else {
            return;
        };
        info.bloated = bloated;
        let receive = info.compute_receive_shadows();
        info.flags.set(RenderFlags::RECEIVE_SHADOWS, receive);

        for &leaf in leaves {
            self.add_renderable_to_leaf(leaf, handle, shadows);
        }
        tracing::trace!(?handle, leaves = leaves.len(), "renderable inserted");
    }

    /// Unlinks the renderable from its leaves and from every shadow cast on it.
    pub fn remove_from_tree(&mut self, handle: RenderHandle, shadows: &mut dyn ShadowManager) {
        self.leaf_renderables.remove_b(handle);
        self.renderable_shadows.remove_a(handle);
        let Some(info) = self.renderables.get_mut(handle) else {
            return;
        };
        info.bloated = Aabb::INVERTED;
        info.area = -1;
        if let Some(kind) = info.model_type.shadow_receiver() {
            shadows.remove_all_shadows_from_receiver(handle, kind);
        }
    }

    fn toggle(&mut self, handle: RenderHandle, flag: RenderFlags, on: bool) -> Option<bool> {
        let Some(info) = self.renderables.get_mut(handle) else {
            tracing::warn!(?handle, ?flag, "flag change on unknown renderable");
            return None;
        };
        let changed = info.flags.contains(flag) != on;
        info.flags.set(flag, on);
        Some(changed)
    }

    pub fn set_translucency_type(&mut self, handle: RenderHandle, translucency: TranslucencyType) {
        if let Some(info) = self.renderables.get_mut(handle) {
            info.translucency = translucency;
            info.classify();
        }
    }

    pub fn set_model_type(&mut self, handle: RenderHandle, model_type: ModelType) {
        if let Some(info) = self.renderables.get_mut(handle) {
            info.model_type = model_type;
            info.classify();
        }
    }

    pub fn set_alpha_property(&mut self, handle: RenderHandle, alpha: Option<AlphaHandle>, ignores_z: bool) {
        if let Some(info) = self.renderables.get_mut(handle) {
            info.alpha = alpha;
            info.flags.set(RenderFlags::IGNORES_Z, ignores_z);
            info.classify();
        }
    }

    pub fn disable_shadow_depth_rendering(&mut self, handle: RenderHandle, disable: bool) {
        if self.toggle(handle, RenderFlags::DISABLE_SHADOW_DEPTH, disable) == Some(true) {
            adjust(&mut self.disable_shadow_depth_count, disable);
        }
    }

    pub fn disable_shadow_depth_caching(&mut self, handle: RenderHandle, disable: bool) {
        if self.toggle(handle, RenderFlags::DISABLE_SHADOW_DEPTH_CACHING, disable) == Some(true) {
            adjust(&mut self.disable_shadow_depth_cache_count, disable);
        }
    }

    pub fn enable_alternate_sorting(&mut self, handle: RenderHandle, enable: bool) {
        if self.toggle(handle, RenderFlags::ALTERNATE_SORTING, enable) == Some(true) {
            adjust(&mut self.alternate_sort_count, enable);
        }
    }

    pub fn enable_bloated_bounds(&mut self, handle: RenderHandle, enable: bool) {
        if self.toggle(handle, RenderFlags::BLOAT_BOUNDS, enable) == Some(true) && !enable {
            self.mark_changed(handle);
        }
    }

    /// Forces bounds to be recomputed every time they are read.
    pub fn disable_cached_render_bounds(&mut self, handle: RenderHandle, disable: bool) {
        if self.toggle(handle, RenderFlags::BOUNDS_ALWAYS_RECOMPUTE, disable).is_some() {
            if let Some(info) = self.renderables.get_mut(handle) {
                info.flags.remove(RenderFlags::BOUNDS_VALID);
            }
        }
    }

    pub fn enable_rendering(&mut self, handle: RenderHandle, enable: bool) {
        self.toggle(handle, RenderFlags::DISABLE_RENDERING, !enable);
    }

    /// View-model renderables live outside the leaf tree and are drawn with the view model pass.
    pub fn render_with_view_models(&mut self, handle: RenderHandle, enable: bool, shadows: &mut dyn ShadowManager) {
        if self.toggle(handle, RenderFlags::RENDER_WITH_VIEWMODELS, enable) != Some(true) {
            return;
        }
        if enable {
            self.view_models.push(handle);
            self.remove_from_tree(handle, shadows);
        } else {
            self.view_models.retain(|h| *h != handle);
            self.mark_changed(handle);
        }
    }

    pub fn contains(&self, handle: RenderHandle) -> bool {
        self.renderables.contains_key(handle)
    }

    pub fn info(&self, handle: RenderHandle) -> Option<&RenderableInfo> {
        self.renderables.get(handle)
    }

    pub fn renderable(&self, handle: RenderHandle) -> Option<Arc<dyn Renderable>> {
        self.renderables.get(handle).and_then(RenderableInfo::renderable)
    }

    pub fn handle_of(&self, renderable: &Arc<dyn Renderable>) -> Option<RenderHandle> {
        let key = Arc::as_ptr(renderable) as *const () as usize;
        let handle = *self.by_ptr.get(&key)?;
        self.renderables
            .get(handle)
            .filter(|info| info.renderable.strong_count() > 0)
            .map(|_| handle)
    }

    pub fn len(&self) -> usize {
        self.renderables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RenderHandle, &RenderableInfo)> {
        self.renderables.iter()
    }

    pub fn view_models(&self) -> &[RenderHandle] {
        &self.view_models
    }

    pub fn renderable_leaves(&self, handle: RenderHandle) -> &[LeafIndex] {
        self.leaf_renderables.of_b(handle)
    }

    pub fn renderables_in_leaf(&self, leaf: LeafIndex) -> &[RenderHandle] {
        self.leaf_renderables.of_a(leaf)
    }

    /// Calls `callback` once per renderable indexed in any leaf the box touches.
    pub fn enumerate_renderables_in_box(
        &mut self,
        spatial: &dyn SpatialQuery,
        bounds: &Aabb,
        callback: &mut dyn FnMut(RenderHandle),
    ) {
        let mut leaves = Vec::new();
        spatial.enumerate_leaves_in_box(bounds, &mut |leaf| leaves.push(leaf));
        if leaves.is_empty() {
            return;
        }
        self.shadow_enum = next_generation(self.shadow_enum);
        let generation = self.shadow_enum;
        for leaf in leaves {
            for &handle in self.leaf_renderables.of_a(leaf) {
                let Some(info) = self.renderables.get_mut(handle) else {
                    continue;
                };
                if info.enum_count == generation {
                    continue;
                }
                info.enum_count = generation;
                callback(handle);
            }
        }
    }

    /// Undoes a "drawn this frame" stamp for an entry a filter dropped, so
    /// [`RenderableInfo::drawn_in_frame`] reports it as not drawn.
    pub fn unmark_drawn(&mut self, handle: RenderHandle) {
        if let Some(info) = self.renderables.get_mut(handle) {
            info.last_drawn_frame = info.last_drawn_frame.wrapping_sub(1);
        }
    }

    pub fn alternate_sort_count(&self) -> u32 {
        self.alternate_sort_count
    }

    pub fn disable_shadow_depth_count(&self) -> u32 {
        self.disable_shadow_depth_count
    }

    pub fn disable_shadow_depth_cache_count(&self) -> u32 {
        self.disable_shadow_depth_cache_count
    }

    pub fn set_detail_objects_in_leaf(&mut self, leaf: LeafIndex, first: u32, count: u32) {
        match self.leaves.get_mut(leaf as usize) {
            Some(data) => {
                data.detail_first = first;
                data.detail_count = count;
            }
            None => tracing::warn!(leaf, "detail objects for unknown leaf"),
        }
    }

    /// Stamps the leaf as drawn this frame and returns its detail range.
    pub fn draw_detail_objects_in_leaf(&mut self, leaf: LeafIndex, frame: u32) -> (u32, u32) {
        let Some(data) = self.leaves.get_mut(leaf as usize) else {
            return (0, 0);
        };
        data.detail_frame = frame;
        (data.detail_first, data.detail_count)
    }

    pub fn should_draw_detail_objects_in_leaf(&self, leaf: LeafIndex, frame: u32) -> bool {
        if !self.config.draw_detail_props {
            return false;
        }
        self.leaves.get(leaf as usize).is_some_and(|data| {
            data.detail_frame == frame
                && (data.detail_count != 0 || data.subsystem[LeafSubsystem::DetailObjects.slot()].is_some())
        })
    }

    pub fn set_subsystem_data(&mut self, leaf: LeafIndex, subsystem: LeafSubsystem, data: Option<u32>) {
        if let Some(leaf_data) = self.leaves.get_mut(leaf as usize) {
            leaf_data.subsystem[subsystem.slot()] = data;
        }
    }

    pub fn subsystem_data(&self, leaf: LeafIndex, subsystem: LeafSubsystem) -> Option<u32> {
        self.leaves.get(leaf as usize)?.subsystem[subsystem.slot()]
    }

    pub fn stats(&self) -> LeafStats {
        LeafStats {
            renderables: self.renderables.len(),
            view_models: self.view_models.len(),
            leaves: self.leaves.len(),
            shadows: self.shadows.len(),
            leaf_links: self.leaf_renderables.len(),
            shadow_leaf_links: self.leaf_shadows.len(),
            shadow_receiver_links: self.renderable_shadows.len(),
            dirty: self.dirty.len(),
        }
    }
}

fn adjust(counter: &mut u32, up: bool) {
    *counter = if up {
        counter.saturating_add(1)
    } else {
        counter.saturating_sub(1)
    };
}

/// Bloated bounds of `renderable`, merged with `previous` when the merge stays tight.
pub fn bloated_bounds(renderable: &dyn Renderable, previous: Aabb, bloat: bool) -> Aabb {
    let current = renderable.world_space_bounds().snapped(BLOAT_GRANULARITY);
    if bloat && previous.is_valid() {
        let merged = previous.union(&current);
        let merged_volume = merged.volume();
        if merged_volume <= BLOAT_GRANULARITY.powi(3) || current.volume() * 2.0 >= merged_volume {
            return merged;
        }
    }
    current
}

fn placement(order: usize, work: &LeafWork, spatial: &dyn SpatialQuery) -> PendingInsert {
    let bloated = bloated_bounds(work.renderable.as_ref(), work.previous, work.bloat);
    let leaves = (bloated != work.previous).then(|| {
        let mut leaves = Vec::new();
        spatial.enumerate_leaves_in_box(&bloated, &mut |leaf| leaves.push(leaf));
        leaves
    });
    PendingInsert {
        order,
        handle: work.handle,
        bloated,
        leaves,
    }
}

fn place_threaded(work: &[LeafWork], spatial: &dyn SpatialQuery) -> Vec<PendingInsert> {
    let queue = DeferredInserts::with_capacity(work.len());
    let threads = std::thread::available_parallelism()
        .map_or(4, |n| n.get())
        .clamp(1, work.len().max(1));
    let chunk = work.len().div_ceil(threads).max(1);

    std::thread::scope(|scope| {
        for (index, items) in work.chunks(chunk).enumerate() {
            let queue = &queue;
            scope.spawn(move || {
                let base = index * chunk;
                queue.extend(
                    items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| placement(base + i, item, spatial)),
                );
            });
        }
    });

    tracing::trace!(items = work.len(), threads, "threaded leaf placement");
    queue.drain_sorted()
}
