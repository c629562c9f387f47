use std::collections::HashMap;
use std::sync::Arc;

use leafview_common::{BuiltWorldLists, DrawFlags, LeafIndex, ViewSetup, WorldListId};

use crate::list::RenderablesList;

/// Pruned lists at or below this many leaves go back to the pool.
const POOLED_LIST_LEAVES: usize = 128;

/// Visible world leaves of one view, front to back.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldListInfo {
    pub list: WorldListId,
    pub leaves: Vec<LeafIndex>,
    /// Parallel to `leaves`; -1 outside water.
    pub leaf_fog_volume: Vec<i32>,
    /// Index into the unpruned list per kept leaf; `None` when not pruned.
    pub actual_leaf_index: Option<Vec<usize>>,
    pub has_water: bool,
    pub view_fog_volume: i32,
}

impl WorldListInfo {
    pub fn from_built(built: BuiltWorldLists, view_fog_volume: i32) -> Self {
        Self {
            list: built.list,
            leaves: built.leaves,
            leaf_fog_volume: built.leaf_fog_volumes,
            actual_leaf_index: None,
            has_water: built.has_water,
            view_fog_volume,
        }
    }

    pub fn empty(list: WorldListId) -> Self {
        Self {
            list,
            leaves: Vec::new(),
            leaf_fog_volume: Vec::new(),
            actual_leaf_index: None,
            has_water: false,
            view_fog_volume: -1,
        }
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Keeps only the leaves on the side of the water surface this view draws.
    /// Returns `None` when nothing needs pruning.
    pub fn prune_for_water(&self, draw_flags: DrawFlags, pool: &mut WorldListPool) -> Option<WorldListInfo> {
        let under = draw_flags.contains(DrawFlags::RENDER_UNDERWATER);
        let above = draw_flags.contains(DrawFlags::RENDER_ABOVEWATER);
        if under && above {
            return None;
        }
        if !self.has_water && !under {
            return None;
        }

        let mut pruned = pool.take(self.list);
        pruned.has_water = self.has_water;
        pruned.view_fog_volume = self.view_fog_volume;
        let mut actual = Vec::new();
        if self.has_water {
            for (i, (&leaf, &fog)) in self.leaves.iter().zip(&self.leaf_fog_volume).enumerate() {
                if (fog != -1) == under {
                    pruned.leaves.push(leaf);
                    pruned.leaf_fog_volume.push(fog);
                    actual.push(i);
                }
            }
        }
        pruned.actual_leaf_index = Some(actual);
        tracing::trace!(before = self.leaves.len(), after = pruned.leaves.len(), under, "world list pruned");
        Some(pruned)
    }
}

/// Recycles small pruned world-list buffers between views.
#[derive(Debug, Default)]
pub struct WorldListPool {
    free: Vec<WorldListInfo>,
}

impl WorldListPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&mut self, list: WorldListId) -> WorldListInfo {
        match self.free.pop() {
            Some(mut info) => {
                info.list = list;
                info
            }
            None => WorldListInfo::empty(list),
        }
    }

    /// Returns a list to the pool if this was its last reference and it is small.
    pub fn recycle(&mut self, info: Arc<WorldListInfo>) {
        let Ok(mut info) = Arc::try_unwrap(info) else {
            return;
        };
        if info.leaves.capacity() > POOLED_LIST_LEAVES {
            return;
        }
        info.leaves.clear();
        info.leaf_fog_volume.clear();
        info.actual_leaf_index = None;
        info.has_water = false;
        info.view_fog_volume = -1;
        self.free.push(info);
    }

    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }
}

/// Bit-exact camera identity of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorldListKey {
    ortho: Option<[u32; 4]>,
    off_center: Option<[u32; 4]>,
    fov: u32,
    origin: [u32; 3],
    angles: [u32; 3],
    z_near: u32,
    z_far: u32,
    aspect: u32,
    flags: u32,
}

impl WorldListKey {
    pub fn new(view: &ViewSetup, flags: DrawFlags) -> Self {
        Self {
            ortho: view.ortho.map(|r| [r.left, r.top, r.right, r.bottom].map(f32::to_bits)),
            off_center: view.off_center.map(|r| [r.left, r.top, r.right, r.bottom].map(f32::to_bits)),
            fov: view.fov.to_bits(),
            origin: view.origin.to_array().map(f32::to_bits),
            angles: view.angles.to_array().map(f32::to_bits),
            z_near: view.z_near.to_bits(),
            z_far: view.z_far.to_bits(),
            aspect: view.aspect().to_bits(),
            flags: flags.bits(),
        }
    }
}

/// World and renderable lists shared by views with identical cameras.
#[derive(Debug, Clone)]
pub struct CachedLists {
    pub world: Arc<WorldListInfo>,
    pub renderables: Arc<RenderablesList>,
}

/// Per-frame cache of built lists, flushed when the frame ends.
#[derive(Debug, Default)]
pub struct WorldListCache {
    entries: HashMap<WorldListKey, CachedLists>,
    hits: u64,
}

impl WorldListCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&mut self, view: &ViewSetup, flags: DrawFlags) -> Option<CachedLists> {
        let found = self.entries.get(&WorldListKey::new(view, flags)).cloned();
        if found.is_some() {
            self.hits += 1;
            tracing::trace!(hits = self.hits, "world list cache hit");
        }
        found
    }

    pub fn add(&mut self, view: &ViewSetup, flags: DrawFlags, lists: CachedLists) {
        self.entries.insert(WorldListKey::new(view, flags), lists);
    }

    pub fn flush(&mut self) {
        if !self.entries.is_empty() {
            tracing::trace!(entries = self.entries.len(), "world list cache flushed");
        }
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn water_list() -> WorldListInfo {
        WorldListInfo {
            list: WorldListId(1),
            leaves: vec![10, 11, 12, 13],
            leaf_fog_volume: vec![-1, 0, -1, 0],
            actual_leaf_index: None,
            has_water: true,
            view_fog_volume: -1,
        }
    }

    fn dry_list() -> WorldListInfo {
        WorldListInfo {
            has_water: false,
            leaf_fog_volume: vec![-1; 4],
            ..water_list()
        }
    }

    #[test]
    fn both_sides_is_unpruned() {
        let mut pool = WorldListPool::new();
        let flags = DrawFlags::RENDER_UNDERWATER | DrawFlags::RENDER_ABOVEWATER;
        assert!(water_list().prune_for_water(flags, &mut pool).is_none());
    }

    #[test]
    fn above_water_without_water_is_unpruned() {
        let mut pool = WorldListPool::new();
        assert!(dry_list().prune_for_water(DrawFlags::RENDER_ABOVEWATER, &mut pool).is_none());
    }

    #[test]
    fn above_water_keeps_dry_leaves_with_original_indices() {
        let mut pool = WorldListPool::new();
        let pruned = water_list().prune_for_water(DrawFlags::RENDER_ABOVEWATER, &mut pool).unwrap();
        assert_eq!(pruned.leaves, vec![10, 12]);
        assert_eq!(pruned.actual_leaf_index, Some(vec![0, 2]));
        assert!(pruned.leaf_fog_volume.iter().all(|&f| f == -1));
    }

    #[test]
    fn under_water_keeps_wet_leaves() {
        let mut pool = WorldListPool::new();
        let pruned = water_list().prune_for_water(DrawFlags::RENDER_UNDERWATER, &mut pool).unwrap();
        assert_eq!(pruned.leaves, vec![11, 13]);
        assert_eq!(pruned.actual_leaf_index, Some(vec![1, 3]));
    }

    #[test]
    fn under_water_without_water_is_empty() {
        let mut pool = WorldListPool::new();
        let pruned = dry_list().prune_for_water(DrawFlags::RENDER_UNDERWATER, &mut pool).unwrap();
        assert!(pruned.is_empty());
    }

    #[test]
    fn pool_recycles_only_unshared_lists() {
        let mut pool = WorldListPool::new();
        let pruned = Arc::new(water_list().prune_for_water(DrawFlags::RENDER_ABOVEWATER, &mut pool).unwrap());
        let shared = pruned.clone();
        pool.recycle(pruned);
        assert!(pool.is_empty());
        pool.recycle(shared);
        assert_eq!(pool.len(), 1);

        let reused = pool.take(WorldListId(7));
        assert!(pool.is_empty());
        assert!(reused.is_empty());
        assert_eq!(reused.list, WorldListId(7));
        assert_eq!(reused.actual_leaf_index, None);
    }

    #[test]
    fn cache_matches_bit_exact_cameras_only() {
        let mut cache = WorldListCache::new();
        let view = ViewSetup {
            origin: Vec3::new(1.0, 2.0, 3.0),
            ..ViewSetup::default()
        };
        let lists = CachedLists {
            world: Arc::new(water_list()),
            renderables: Arc::new(RenderablesList::new(8)),
        };
        cache.add(&view, DrawFlags::DRAW_ENTITIES, lists);

        assert!(cache.find(&view, DrawFlags::DRAW_ENTITIES).is_some());
        assert!(cache.find(&view, DrawFlags::DRAW_ENTITIES | DrawFlags::RENDER_WATER).is_none());
        let nudged = ViewSetup {
            origin: Vec3::new(1.0, 2.0, 3.0 + f32::EPSILON * 4.0),
            ..view
        };
        assert!(cache.find(&nudged, DrawFlags::DRAW_ENTITIES).is_none());
        assert_eq!(cache.hits(), 1);

        cache.flush();
        assert!(cache.is_empty());
        assert!(cache.find(&view, DrawFlags::DRAW_ENTITIES).is_none());
    }
}
