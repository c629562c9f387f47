//! First half of a view's renderable-list build: flatten visible leaves, drop
//! duplicates and the pass-specific exclusions, then resolve bounds.
//!
//! Every filter that drops an entry steps its last-drawn frame back by one so
//! a later build in the same frame does not see it as drawn.

use std::sync::Arc;

use leafview_common::{
    Aabb, AlphaHandle, EngineRenderGroup, LeafIndex, ModelType, RenderHandle, Renderable, SizeBucket,
    TranslucencyType,
};

use crate::info::{RenderFlags, RenderableInfo};
use crate::registry::LeafSystem;

/// Element of the flattened leaf list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListItem {
    /// Start of a leaf; `list_index` is its position in the view's world list.
    Leaf { leaf: LeafIndex, list_index: usize },
    Renderable(RenderHandle),
}

/// A surviving renderable with its frame-local draw data.
#[derive(Clone)]
pub struct BuildEntry {
    pub handle: RenderHandle,
    pub renderable: Arc<dyn Renderable>,
    pub bounds: Aabb,
    pub area: i32,
    pub alpha: u8,
    pub perform_occlusion_test: bool,
    pub model_type: ModelType,
    pub translucency: TranslucencyType,
    pub two_pass: bool,
    pub opaque_group: EngineRenderGroup,
    pub alpha_property: Option<AlphaHandle>,
    pub ignores_z: bool,
}

impl BuildEntry {
    pub fn is_opaque(&self) -> bool {
        self.translucency == TranslucencyType::Opaque
    }

    pub fn size_bucket(&self) -> SizeBucket {
        match self.opaque_group {
            EngineRenderGroup::OpaqueStatic(b) | EngineRenderGroup::OpaqueEntity(b) => b,
            _ => SizeBucket::Tiny,
        }
    }
}

impl std::fmt::Debug for BuildEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildEntry")
            .field("handle", &self.handle)
            .field("bounds", &self.bounds)
            .field("area", &self.area)
            .field("alpha", &self.alpha)
            .field("model_type", &self.model_type)
            .field("translucency", &self.translucency)
            .field("two_pass", &self.two_pass)
            .field("opaque_group", &self.opaque_group)
            .finish_non_exhaustive()
    }
}

/// Element of the list after bounds resolution.
#[derive(Debug, Clone)]
pub enum BuildItem {
    Leaf { leaf: LeafIndex, list_index: usize },
    Renderable(BuildEntry),
}

impl BuildItem {
    pub fn entry(&self) -> Option<&BuildEntry> {
        match self {
            BuildItem::Renderable(entry) => Some(entry),
            BuildItem::Leaf { .. } => None,
        }
    }
}

impl LeafSystem {
    /// Emits a marker per visible leaf followed by the renderables indexed in
    /// it. With `draw_all`, every tree renderable is attributed to the first leaf.
    pub fn collect_leaf_renderables(&self, leaves: &[LeafIndex], draw_all: bool, out: &mut Vec<ListItem>) {
        out.clear();
        for (list_index, &leaf) in leaves.iter().enumerate() {
            out.push(ListItem::Leaf { leaf, list_index });
            if draw_all {
                if list_index == 0 {
                    out.extend(
                        self.renderables
                            .iter()
                            .filter(|(_, info)| !info.is_view_model())
                            .map(|(handle, _)| ListItem::Renderable(handle)),
                    );
                }
                continue;
            }
            out.extend(
                self.leaf_renderables
                    .of_a(leaf)
                    .iter()
                    .map(|&handle| ListItem::Renderable(handle)),
            );
        }
    }

    fn next_dedup_pass(&mut self) -> u32 {
        self.dedup_pass = self.dedup_pass.wrapping_add(1);
        if self.dedup_pass == 0 {
            // stale stamps from the previous cycle would collide with new pass ids
            for (_, info) in self.renderables.iter_mut() {
                info.seen_pass = 0;
            }
            self.dedup_pass = 1;
            tracing::debug!("dedup pass counter wrapped");
        }
        self.dedup_pass
    }

    /// Keeps the first occurrence of each renderable, or the last one for
    /// alternate-sorted renderables, and stamps survivors as drawn in `frame`.
    /// Disabled and view-model renderables are dropped.
    pub fn extract_duplicates(&mut self, frame: u32, items: &mut Vec<ListItem>) {
        let pass = self.next_dedup_pass();
        let renderables = &mut self.renderables;
        let skip = RenderFlags::DISABLE_RENDERING | RenderFlags::RENDER_WITH_VIEWMODELS;

        let keep_first = |info: &mut RenderableInfo| {
            if info.seen_pass == pass {
                return false;
            }
            info.seen_pass = pass;
            info.last_drawn_frame = frame;
            true
        };

        if self.alternate_sort_count == 0 {
            items.retain(|item| match *item {
                ListItem::Leaf { .. } => true,
                ListItem::Renderable(handle) => match renderables.get_mut(handle) {
                    Some(info) if !info.flags.intersects(skip) => keep_first(info),
                    _ => false,
                },
            });
            return;
        }

        for item in items.iter() {
            let ListItem::Renderable(handle) = *item else {
                continue;
            };
            let Some(info) = renderables.get_mut(handle) else {
                continue;
            };
            if !info.flags.contains(RenderFlags::ALTERNATE_SORTING) {
                continue;
            }
            if info.seen_pass != pass {
                info.seen_pass = pass;
                info.occurrences = 0;
            }
            info.occurrences += 1;
            info.last_drawn_frame = frame;
        }

        items.retain(|item| match *item {
            ListItem::Leaf { .. } => true,
            ListItem::Renderable(handle) => match renderables.get_mut(handle) {
                Some(info) if info.flags.intersects(skip) => false,
                Some(info) if info.flags.contains(RenderFlags::ALTERNATE_SORTING) => {
                    info.occurrences = info.occurrences.saturating_sub(1);
                    info.occurrences == 0
                }
                Some(info) => keep_first(info),
                None => false,
            },
        });
    }

    /// Drops renderables matching `pred`, stepping their drawn frame back.
    ///
    /// Dedup tracks passes through `seen_pass` and never reads the stamp. The
    /// stamp only answers [`RenderableInfo::drawn_in_frame`] and the leaf
    /// inspector's `last_drawn_frame` column: whether the renderable made any
    /// list this frame, for callers outside the list build.
    fn strip(&mut self, items: &mut Vec<ListItem>, pred: impl Fn(&RenderableInfo) -> bool) -> usize {
        let before = items.len();
        let renderables = &mut self.renderables;
        items.retain(|item| match *item {
            ListItem::Leaf { .. } => true,
            ListItem::Renderable(handle) => match renderables.get_mut(handle) {
                Some(info) if pred(info) => {
                    info.last_drawn_frame = info.last_drawn_frame.wrapping_sub(1);
                    false
                }
                Some(_) => true,
                None => false,
            },
        });
        before - items.len()
    }

    pub fn extract_static_props(&mut self, items: &mut Vec<ListItem>) -> usize {
        self.strip(items, |info| info.model_type == ModelType::StaticProp)
    }

    /// Drops renderables excluded from shadow-depth rendering.
    pub fn extract_disable_shadow_depth(&mut self, items: &mut Vec<ListItem>) -> usize {
        if self.disable_shadow_depth_count == 0 {
            return 0;
        }
        self.strip(items, |info| info.flags.contains(RenderFlags::DISABLE_SHADOW_DEPTH))
    }

    /// Keeps only renderables excluded from the shadow-depth cache, for an
    /// incremental depth update that redraws them over cached depth.
    pub fn extract_disable_shadow_depth_cache(&mut self, items: &mut Vec<ListItem>) -> usize {
        self.strip(items, |info| {
            !info.flags.contains(RenderFlags::DISABLE_SHADOW_DEPTH_CACHING)
        })
    }

    /// Drops purely translucent renderables for passes that never draw them.
    pub fn extract_translucent(&mut self, items: &mut Vec<ListItem>) -> usize {
        self.strip(items, |info| info.translucency == TranslucencyType::Translucent)
    }

    /// Resolves world bounds, re-buckets opaque props and entities by size and
    /// snapshots the per-entry draw data. Renderables already dropped by their
    /// owner are skipped.
    pub fn compute_bounds(&mut self, items: &[ListItem]) -> Vec<BuildItem> {
        let mut out = Vec::with_capacity(items.len());
        for &item in items {
            let handle = match item {
                ListItem::Leaf { leaf, list_index } => {
                    out.push(BuildItem::Leaf { leaf, list_index });
                    continue;
                }
                ListItem::Renderable(handle) => handle,
            };
            let Some(info) = self.renderables.get_mut(handle) else {
                continue;
            };
            let Some(renderable) = info.renderable.upgrade() else {
                info.last_drawn_frame = info.last_drawn_frame.wrapping_sub(1);
                continue;
            };

            if !info.flags.contains(RenderFlags::BOUNDS_VALID) {
                info.bounds = renderable.world_space_bounds();
                detect_bucketed_render_group(info);
                let cacheable = !info.flags.contains(RenderFlags::BOUNDS_ALWAYS_RECOMPUTE)
                    && !renderable.has_move_parent();
                info.flags.set(RenderFlags::BOUNDS_VALID, cacheable);
            }

            out.push(BuildItem::Renderable(BuildEntry {
                handle,
                renderable,
                bounds: info.bounds,
                area: info.area,
                alpha: 255,
                perform_occlusion_test: matches!(info.model_type, ModelType::StaticProp | ModelType::StudioModel),
                model_type: info.model_type,
                translucency: info.translucency,
                two_pass: info.is_two_pass(),
                opaque_group: info.opaque_group,
                alpha_property: info.alpha,
                ignores_z: info.flags.contains(RenderFlags::IGNORES_Z),
            }));
        }
        out
    }
}

fn detect_bucketed_render_group(info: &mut RenderableInfo) {
    if info.model_type == ModelType::Brush {
        return;
    }
    let bucket = SizeBucket::from_dimension(info.bounds.max_extent());
    info.opaque_group = info.opaque_group.with_bucket(bucket);
    if info.is_opaque() {
        info.engine_group = info.opaque_group;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridLeaves;
    use crate::test_support::{RecordingShadows, TestProp};
    use glam::Vec3;
    use leafview_common::SpatialQuery;

    struct Scene {
        leaves: LeafSystem,
        grid: GridLeaves,
        shadows: RecordingShadows,
        props: Vec<Arc<TestProp>>,
        handles: Vec<RenderHandle>,
    }

    impl Scene {
        fn new() -> Self {
            let grid = GridLeaves::new(Vec3::ZERO, 64.0, [4, 4, 1]);
            let mut leaves = LeafSystem::default();
            leaves.level_init(grid.leaf_count());
            Self {
                leaves,
                grid,
                shadows: RecordingShadows::default(),
                props: Vec::new(),
                handles: Vec::new(),
            }
        }

        fn add(&mut self, prop: Arc<TestProp>) -> RenderHandle {
            let handle = self.leaves.add_renderable(prop.desc());
            self.props.push(prop);
            self.handles.push(handle);
            self.leaves.recompute_leaves(&self.grid, &mut self.shadows);
            handle
        }

        fn all_leaves(&self) -> Vec<LeafIndex> {
            (0..self.grid.leaf_count()).collect()
        }

        fn flatten(&self) -> Vec<ListItem> {
            let mut out = Vec::new();
            self.leaves.collect_leaf_renderables(&self.all_leaves(), false, &mut out);
            out
        }
    }

    fn renderables(items: &[ListItem]) -> Vec<RenderHandle> {
        items
            .iter()
            .filter_map(|item| match item {
                ListItem::Renderable(h) => Some(*h),
                ListItem::Leaf { .. } => None,
            })
            .collect()
    }

    /// Index of the leaf marker preceding each renderable.
    fn leaf_of(items: &[ListItem], handle: RenderHandle) -> Vec<LeafIndex> {
        let mut current = None;
        let mut out = Vec::new();
        for item in items {
            match *item {
                ListItem::Leaf { leaf, .. } => current = Some(leaf),
                ListItem::Renderable(h) if h == handle => out.extend(current),
                ListItem::Renderable(_) => {}
            }
        }
        out
    }

    #[test]
    fn flatten_emits_marker_per_leaf() {
        let mut scene = Scene::new();
        let straddler = scene.add(TestProp::studio(Vec3::new(64.0, 20.0, 20.0), Vec3::splat(8.0)));
        let items = scene.flatten();
        let markers = items.iter().filter(|i| matches!(i, ListItem::Leaf { .. })).count();
        assert_eq!(markers, 16);
        assert_eq!(renderables(&items).len(), scene.leaves.renderable_leaves(straddler).len());
    }

    #[test]
    fn draw_all_attributes_everything_to_first_leaf() {
        let mut scene = Scene::new();
        let far = scene.add(TestProp::studio(Vec3::new(220.0, 220.0, 20.0), Vec3::splat(4.0)));
        let mut out = Vec::new();
        scene.leaves.collect_leaf_renderables(&[5, 6], true, &mut out);
        assert_eq!(
            out,
            vec![
                ListItem::Leaf { leaf: 5, list_index: 0 },
                ListItem::Renderable(far),
                ListItem::Leaf { leaf: 6, list_index: 1 },
            ]
        );
    }

    #[test]
    fn dedup_keeps_first_occurrence_and_stamps_frame() {
        let mut scene = Scene::new();
        let straddler = scene.add(TestProp::studio(Vec3::new(64.0, 20.0, 20.0), Vec3::splat(8.0)));
        let mut items = scene.flatten();
        let first_leaf = leaf_of(&items, straddler)[0];

        scene.leaves.extract_duplicates(42, &mut items);
        assert_eq!(renderables(&items), vec![straddler]);
        assert_eq!(leaf_of(&items, straddler), vec![first_leaf]);
        assert!(scene.leaves.info(straddler).unwrap().drawn_in_frame(42));
    }

    #[test]
    fn dedup_is_idempotent() {
        let mut scene = Scene::new();
        scene.add(TestProp::studio(Vec3::new(64.0, 20.0, 20.0), Vec3::splat(8.0)));
        let alt = scene.add(TestProp::studio(Vec3::new(64.0, 64.0, 20.0), Vec3::splat(8.0)));
        scene.add(TestProp::studio(Vec3::new(200.0, 30.0, 20.0), Vec3::splat(4.0)));
        scene.leaves.enable_alternate_sorting(alt, true);

        let mut items = scene.flatten();
        scene.leaves.extract_duplicates(7, &mut items);
        let once = items.clone();
        scene.leaves.extract_duplicates(7, &mut items);
        assert_eq!(items, once);
    }

    #[test]
    fn alternate_sorting_keeps_last_occurrence() {
        let mut scene = Scene::new();
        let alt = scene.add(TestProp::studio(Vec3::new(64.0, 64.0, 20.0), Vec3::splat(8.0)));
        let plain = scene.add(TestProp::studio(Vec3::new(64.0, 20.0, 20.0), Vec3::splat(8.0)));
        scene.leaves.enable_alternate_sorting(alt, true);

        let mut items = scene.flatten();
        let alt_leaves = leaf_of(&items, alt);
        let plain_leaves = leaf_of(&items, plain);
        assert!(alt_leaves.len() > 1);

        scene.leaves.extract_duplicates(3, &mut items);
        assert_eq!(leaf_of(&items, alt), vec![*alt_leaves.last().unwrap()]);
        assert_eq!(leaf_of(&items, plain), vec![plain_leaves[0]]);
        assert!(scene.leaves.info(alt).unwrap().drawn_in_frame(3));
    }

    #[test]
    fn dedup_survives_pass_counter_wraparound() {
        let mut scene = Scene::new();
        let a = scene.add(TestProp::studio(Vec3::new(64.0, 20.0, 20.0), Vec3::splat(8.0)));
        let b = scene.add(TestProp::studio(Vec3::new(200.0, 30.0, 20.0), Vec3::splat(4.0)));

        scene.leaves.dedup_pass = u32::MAX - 1;
        for frame in 0..4 {
            let mut items = scene.flatten();
            scene.leaves.extract_duplicates(frame, &mut items);
            let mut kept = renderables(&items);
            kept.sort();
            let mut expected = vec![a, b];
            expected.sort();
            assert_eq!(kept, expected, "frame {frame}");
        }
        assert_eq!(scene.leaves.dedup_pass, 3);
    }

    #[test]
    fn disabled_and_view_model_entries_are_dropped() {
        let mut scene = Scene::new();
        let hidden = scene.add(TestProp::studio(Vec3::new(20.0, 20.0, 20.0), Vec3::splat(4.0)));
        let shown = scene.add(TestProp::studio(Vec3::new(200.0, 30.0, 20.0), Vec3::splat(4.0)));
        scene.leaves.enable_rendering(hidden, false);
        let mut items = scene.flatten();
        scene.leaves.extract_duplicates(1, &mut items);
        assert_eq!(renderables(&items), vec![shown]);
    }

    #[test]
    fn static_prop_strip_steps_frame_back() {
        let mut scene = Scene::new();
        let prop = scene.add(TestProp::new(Vec3::new(20.0, 20.0, 20.0), Vec3::splat(4.0), ModelType::StaticProp));
        let studio = scene.add(TestProp::studio(Vec3::new(200.0, 30.0, 20.0), Vec3::splat(4.0)));
        let mut items = scene.flatten();
        scene.leaves.extract_duplicates(10, &mut items);

        assert_eq!(scene.leaves.extract_static_props(&mut items), 1);
        assert_eq!(renderables(&items), vec![studio]);
        assert_eq!(scene.leaves.info(prop).unwrap().last_drawn_frame(), 9);
        assert!(scene.leaves.info(studio).unwrap().drawn_in_frame(10));
    }

    #[test]
    fn stripped_entry_returns_in_a_later_pass() {
        let mut scene = Scene::new();
        let prop = scene.add(TestProp::new(Vec3::new(20.0, 20.0, 20.0), Vec3::splat(4.0), ModelType::StaticProp));
        let mut items = scene.flatten();
        scene.leaves.extract_duplicates(10, &mut items);
        scene.leaves.extract_static_props(&mut items);
        assert!(!scene.leaves.info(prop).unwrap().drawn_in_frame(10));

        let mut items = scene.flatten();
        scene.leaves.extract_duplicates(10, &mut items);
        assert_eq!(renderables(&items), vec![prop]);
        assert!(scene.leaves.info(prop).unwrap().drawn_in_frame(10));
    }

    #[test]
    fn shadow_depth_filters() {
        let mut scene = Scene::new();
        let excluded = scene.add(TestProp::studio(Vec3::new(20.0, 20.0, 20.0), Vec3::splat(4.0)));
        let uncached = scene.add(TestProp::studio(Vec3::new(200.0, 30.0, 20.0), Vec3::splat(4.0)));
        let plain = scene.add(TestProp::studio(Vec3::new(200.0, 200.0, 20.0), Vec3::splat(4.0)));

        let mut items = scene.flatten();
        scene.leaves.extract_duplicates(1, &mut items);
        assert_eq!(scene.leaves.extract_disable_shadow_depth(&mut items), 0);

        scene.leaves.disable_shadow_depth_rendering(excluded, true);
        scene.leaves.disable_shadow_depth_caching(uncached, true);
        assert_eq!(scene.leaves.extract_disable_shadow_depth(&mut items), 1);
        let mut depth_only = items.clone();
        assert_eq!(scene.leaves.extract_disable_shadow_depth_cache(&mut depth_only), 1);
        assert_eq!(renderables(&depth_only), vec![uncached]);
        assert!(!renderables(&items).contains(&excluded));
        assert!(renderables(&items).contains(&plain));
    }

    #[test]
    fn translucent_strip_keeps_two_pass() {
        let mut scene = Scene::new();
        let glass = scene.add(
            TestProp::studio(Vec3::new(20.0, 20.0, 20.0), Vec3::splat(4.0)).translucent(TranslucencyType::Translucent),
        );
        let foliage = scene.add(
            TestProp::studio(Vec3::new(200.0, 30.0, 20.0), Vec3::splat(4.0)).translucent(TranslucencyType::TwoPass),
        );
        let mut items = scene.flatten();
        scene.leaves.extract_duplicates(1, &mut items);
        assert_eq!(scene.leaves.extract_translucent(&mut items), 1);
        assert_eq!(renderables(&items), vec![foliage]);
        assert_eq!(scene.leaves.info(glass).unwrap().last_drawn_frame(), 0);
    }

    #[test]
    fn compute_bounds_buckets_by_largest_dimension() {
        let mut scene = Scene::new();
        let huge = scene.add(TestProp::new(Vec3::new(60.0, 60.0, 40.0), Vec3::new(40.0, 5.0, 5.0), ModelType::StaticProp));
        let medium = scene.add(TestProp::new(
            Vec3::new(200.0, 60.0, 40.0),
            Vec3::new(39.995, 5.0, 5.0),
            ModelType::StaticProp,
        ));
        let mut items = scene.flatten();
        scene.leaves.extract_duplicates(1, &mut items);
        let built = scene.leaves.compute_bounds(&items);

        let entry = |h| built.iter().filter_map(BuildItem::entry).find(|e| e.handle == h).unwrap().clone();
        assert_eq!(entry(huge).opaque_group, EngineRenderGroup::OpaqueStatic(SizeBucket::Huge));
        assert_eq!(entry(medium).opaque_group, EngineRenderGroup::OpaqueStatic(SizeBucket::Medium));
        assert_eq!(
            scene.leaves.info(huge).unwrap().engine_group(),
            EngineRenderGroup::OpaqueStatic(SizeBucket::Huge)
        );
        assert!(entry(huge).perform_occlusion_test);
        assert_eq!(entry(huge).alpha, 255);
        assert!(scene.leaves.info(huge).unwrap().cached_bounds().is_some());
    }

    #[test]
    fn attached_renderables_never_cache_bounds() {
        let mut scene = Scene::new();
        let child = scene.add(TestProp::studio(Vec3::new(20.0, 20.0, 20.0), Vec3::splat(4.0)).attached());
        let items = scene.flatten();
        let built = scene.leaves.compute_bounds(&items);
        assert!(built.iter().any(|i| i.entry().is_some_and(|e| e.handle == child)));
        assert!(scene.leaves.info(child).unwrap().cached_bounds().is_none());
    }

    #[test]
    fn dropped_owner_is_skipped() {
        let mut scene = Scene::new();
        let gone = scene.add(TestProp::studio(Vec3::new(20.0, 20.0, 20.0), Vec3::splat(4.0)));
        let items = scene.flatten();
        scene.props.clear();
        let built = scene.leaves.compute_bounds(&items);
        assert!(built.iter().all(|i| i.entry().is_none()));
        assert!(scene.leaves.contains(gone));
    }
}
