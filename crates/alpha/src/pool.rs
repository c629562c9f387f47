use leafview_common::{AlphaHandle, FrameRng, Renderable};
use slotmap::SlotMap;

use crate::property::{AlphaContext, AlphaProperty};

/// Level-scoped store of [`AlphaProperty`] records.
///
/// When the last record is destroyed the backing storage is replaced, so the
/// next allocation sees exactly the state of a freshly created pool.
#[derive(Debug, Default)]
pub struct AlphaPropertyPool {
    slots: SlotMap<AlphaHandle, AlphaProperty>,
    rng: FrameRng,
}

impl AlphaPropertyPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the desync-offset source.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            slots: SlotMap::with_key(),
            rng: FrameRng::new(seed),
        }
    }

    pub fn create(&mut self) -> AlphaHandle {
        let handle = self.slots.insert(AlphaProperty::default());
        tracing::trace!(?handle, live = self.slots.len(), "alpha property created");
        handle
    }

    /// Returns false for a stale handle.
    pub fn destroy(&mut self, handle: AlphaHandle) -> bool {
        if self.slots.remove(handle).is_none() {
            tracing::warn!(?handle, "destroying unknown alpha property");
            return false;
        }
        if self.slots.is_empty() {
            self.slots = SlotMap::with_key();
            tracing::debug!("alpha property pool emptied");
        }
        true
    }

    pub fn get(&self, handle: AlphaHandle) -> Option<&AlphaProperty> {
        self.slots.get(handle)
    }

    pub fn get_mut(&mut self, handle: AlphaHandle) -> Option<&mut AlphaProperty> {
        self.slots.get_mut(handle)
    }

    pub fn contains(&self, handle: AlphaHandle) -> bool {
        self.slots.contains_key(handle)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots currently backed by storage, live or free.
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// A negative offset picks a random phase in `0..1024`.
    pub fn set_desync_offset(&mut self, handle: AlphaHandle, offset: i32) {
        let offset = if offset < 0 {
            self.rng.range_i32(0, 1023)
        } else {
            offset
        };
        match self.slots.get_mut(handle) {
            Some(prop) => prop.set_desync_offset(offset.clamp(0, u16::MAX as i32) as u16),
            None => tracing::warn!(?handle, "desync offset on unknown alpha property"),
        }
    }

    /// `None` for a stale handle.
    pub fn compute_render_alpha(
        &self,
        handle: AlphaHandle,
        shadow: bool,
        ctx: &AlphaContext,
        owner: Option<&dyn Renderable>,
    ) -> Option<u8> {
        self.slots
            .get(handle)
            .map(|prop| prop.compute_render_alpha(shadow, ctx, owner))
    }

    pub fn iter(&self) -> impl Iterator<Item = (AlphaHandle, &AlphaProperty)> {
        self.slots.iter()
    }

    /// Level shutdown.
    pub fn clear(&mut self) {
        self.slots = SlotMap::with_key();
    }
}
