use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Slot of a renderable in the leaf registry. Stale after removal.
    pub struct RenderHandle;
    /// Slot of a shadow caster in the shadow index.
    pub struct ShadowHandle;
    /// Slot of a pooled alpha property record.
    pub struct AlphaHandle;
}

/// Index of a spatial partition leaf; the leaf count is fixed per level.
pub type LeafIndex = u32;

/// Identifier of a shadow owned by the external shadow manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShadowId(pub u32);

/// Opaque id of a render target or texture owned by the graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextureId(pub u32);

/// Opaque id of a material owned by the graphics device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialId(pub u32);

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn removed_handle_is_not_reused_as_live() {
        let mut map: SlotMap<RenderHandle, u32> = SlotMap::with_key();
        let a = map.insert(1);
        map.remove(a);
        let b = map.insert(2);
        assert!(map.get(a).is_none());
        assert_eq!(map.get(b), Some(&2));
    }
}
