use std::sync::Weak;

use glam::Vec3;
use leafview_common::{EngineRenderGroup, ModelType, RenderHandle, Renderable, SizeBucket};

/// Static props and entities in four size buckets each, brushes, translucents.
pub const GROUP_COUNT: usize = 10;

const BRUSH_GROUP: usize = 8;
const TRANSLUCENT_GROUP: usize = 9;

/// Dense index of a render group inside a [`RenderablesList`].
pub fn group_index(group: EngineRenderGroup) -> usize {
    match group {
        EngineRenderGroup::OpaqueStatic(bucket) => bucket.index(),
        EngineRenderGroup::OpaqueEntity(bucket) => SizeBucket::ALL.len() + bucket.index(),
        EngineRenderGroup::OpaqueBrush => BRUSH_GROUP,
        EngineRenderGroup::TranslucentEntity => TRANSLUCENT_GROUP,
    }
}

/// One draw-list slot.
#[derive(Clone)]
pub struct RenderListEntry {
    /// `None` for detail objects, which are not registered in the leaf system.
    pub handle: Option<RenderHandle>,
    pub renderable: Weak<dyn Renderable>,
    /// Position of the owning leaf in the view's world list.
    pub world_list_leaf: usize,
    pub alpha: u8,
    pub two_pass: bool,
    pub model_type: ModelType,
    /// Drawn in the no-depth-test pass after all other translucents.
    pub ignores_z: bool,
    /// Depth of the bounds center along the view axis; translucent sort key.
    pub view_depth: f32,
}

impl std::fmt::Debug for RenderListEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderListEntry")
            .field("handle", &self.handle)
            .field("world_list_leaf", &self.world_list_leaf)
            .field("alpha", &self.alpha)
            .field("two_pass", &self.two_pass)
            .field("model_type", &self.model_type)
            .field("ignores_z", &self.ignores_z)
            .field("view_depth", &self.view_depth)
            .finish_non_exhaustive()
    }
}

/// Depth of `point` along `forward` as seen from `origin`.
pub fn view_depth(point: Vec3, origin: Vec3, forward: Vec3) -> f32 {
    (point - origin).dot(forward)
}

/// Per-view draw lists, one per render group.
#[derive(Debug, Clone)]
pub struct RenderablesList {
    groups: [Vec<RenderListEntry>; GROUP_COUNT],
    capacity: usize,
    overflow: usize,
}

impl RenderablesList {
    pub fn new(capacity: usize) -> Self {
        Self {
            groups: Default::default(),
            capacity,
            overflow: 0,
        }
    }

    /// Pre-sizes every group from a previous frame's high-water marks.
    pub fn presized(capacity: usize, high_water: &GroupHighWater) -> Self {
        let mut list = Self::new(capacity);
        for (group, &hint) in list.groups.iter_mut().zip(&high_water.0) {
            group.reserve(hint.min(capacity));
        }
        list
    }

    /// Appends to `group`; a full group drops the entry and returns false.
    pub fn push(&mut self, group: EngineRenderGroup, entry: RenderListEntry) -> bool {
        let slot = &mut self.groups[group_index(group)];
        if slot.len() >= self.capacity {
            if self.overflow == 0 {
                tracing::warn!(?group, capacity = self.capacity, "render group full, dropping entries");
            }
            self.overflow += 1;
            return false;
        }
        slot.push(entry);
        true
    }

    pub fn group(&self, group: EngineRenderGroup) -> &[RenderListEntry] {
        &self.groups[group_index(group)]
    }

    pub fn translucent(&self) -> &[RenderListEntry] {
        &self.groups[TRANSLUCENT_GROUP]
    }

    pub fn brushes(&self) -> &[RenderListEntry] {
        &self.groups[BRUSH_GROUP]
    }

    pub fn count(&self, group: EngineRenderGroup) -> usize {
        self.groups[group_index(group)].len()
    }

    pub fn counts(&self) -> [usize; GROUP_COUNT] {
        std::array::from_fn(|i| self.groups[i].len())
    }

    pub fn opaque_count(&self) -> usize {
        self.groups[..TRANSLUCENT_GROUP].iter().map(Vec::len).sum()
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(Vec::is_empty)
    }

    /// Entries dropped because a group was full.
    pub fn overflow_count(&self) -> usize {
        self.overflow
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sorts translucent entries from `start` on by ascending view depth.
    /// Drawing walks the group from the back, so this yields back-to-front.
    pub fn sort_translucent_from(&mut self, start: usize) {
        let group = &mut self.groups[TRANSLUCENT_GROUP];
        if start < group.len() {
            sort_by_depth(&mut group[start..]);
        }
    }
}

/// Shell sort with strides 4, 2, 1 that steps back after every swap.
pub fn sort_by_depth(entries: &mut [RenderListEntry]) {
    let n = entries.len() as isize;
    if n <= 1 {
        return;
    }
    let mut step: isize = 4;
    while step > 0 {
        let end = n - step;
        let mut i: isize = 0;
        while i < end {
            let (a, b) = (i as usize, (i + step) as usize);
            if entries[a].view_depth > entries[b].view_depth {
                entries.swap(a, b);
                i = if i == 0 { -step } else { i - 2 * step };
            }
            i += step;
        }
        step >>= 1;
    }
}

/// Largest per-group counts seen so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupHighWater(pub [usize; GROUP_COUNT]);

impl GroupHighWater {
    pub fn observe(&mut self, list: &RenderablesList) {
        for (mark, count) in self.0.iter_mut().zip(list.counts()) {
            *mark = (*mark).max(count);
        }
    }

    pub fn total(&self) -> usize {
        self.0.iter().sum()
    }
}
