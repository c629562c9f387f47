use leafview_common::{LeafIndex, RenderHandle, ShadowFlags, ShadowHandle, ShadowId, ShadowManager};

use crate::registry::{LeafSystem, next_generation};

/// A shadow caster known to the leaf index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowInfo {
    pub(crate) owner: ShadowId,
    pub(crate) flags: ShadowFlags,
    pub(crate) enum_count: u32,
}

impl ShadowInfo {
    pub fn owner(&self) -> ShadowId {
        self.owner
    }

    pub fn flags(&self) -> ShadowFlags {
        self.flags
    }

    fn propagates(&self, shadows_on_renderables: bool) -> bool {
        shadows_on_renderables
            || self
                .flags
                .intersects(ShadowFlags::FLASHLIGHT | ShadowFlags::SIMPLE_PROJECTION)
    }
}

impl LeafSystem {
    pub fn add_shadow(&mut self, owner: ShadowId, flags: ShadowFlags) -> ShadowHandle {
        let handle = self.shadows.insert(ShadowInfo {
            owner,
            flags,
            enum_count: 0,
        });
        tracing::trace!(?handle, ?owner, ?flags, "shadow added");
        handle
    }

    /// Unlinks the shadow from every leaf and renderable, then frees it.
    pub fn remove_shadow(&mut self, handle: ShadowHandle) {
        if !self.shadows.contains_key(handle) {
            tracing::warn!(?handle, "removing unknown shadow");
            return;
        }
        self.leaf_shadows.remove_b(handle);
        self.renderable_shadows.remove_b(handle);
        self.shadows.remove(handle);
    }

    pub fn shadow_info(&self, handle: ShadowHandle) -> Option<&ShadowInfo> {
        self.shadows.get(handle)
    }

    pub fn shadow_count(&self) -> usize {
        self.shadows.len()
    }

    /// Replaces the shadow's leaves, propagating it to eligible renderables there.
    pub fn project_shadow(&mut self, handle: ShadowHandle, leaves: &[LeafIndex], manager: &mut dyn ShadowManager) {
        if !self.shadows.contains_key(handle) {
            tracing::warn!(?handle, "projecting unknown shadow");
            return;
        }
        self.leaf_shadows.remove_b(handle);
        self.renderable_shadows.remove_b(handle);

        self.shadow_enum = next_generation(self.shadow_enum);
        for &leaf in leaves {
            self.add_shadow_to_leaf(leaf, handle, manager);
        }
        tracing::trace!(?handle, leaves = leaves.len(), "shadow projected");
    }

    /// Same as [`project_shadow`](Self::project_shadow) for a flashlight; the
    /// shadow is marked as one so it reaches renderables regardless of the
    /// shadows-on-renderables switch.
    pub fn project_flashlight(&mut self, handle: ShadowHandle, leaves: &[LeafIndex], manager: &mut dyn ShadowManager) {
        if let Some(info) = self.shadows.get_mut(handle) {
            info.flags.insert(ShadowFlags::FLASHLIGHT);
        }
        self.project_shadow(handle, leaves, manager);
    }

    /// Calls `callback` once per shadow present in any of `leaves`.
    pub fn enumerate_shadows_in_leaves(&mut self, leaves: &[LeafIndex], callback: &mut dyn FnMut(ShadowHandle)) {
        if leaves.is_empty() {
            return;
        }
        self.shadow_enum = next_generation(self.shadow_enum);
        let generation = self.shadow_enum;
        for &leaf in leaves {
            for &shadow in self.leaf_shadows.of_a(leaf) {
                let Some(info) = self.shadows.get_mut(shadow) else {
                    continue;
                };
                if info.enum_count == generation {
                    continue;
                }
                info.enum_count = generation;
                callback(shadow);
            }
        }
    }

    pub fn shadow_leaves(&self, handle: ShadowHandle) -> &[LeafIndex] {
        self.leaf_shadows.of_b(handle)
    }

    pub fn shadows_in_leaf(&self, leaf: LeafIndex) -> &[ShadowHandle] {
        self.leaf_shadows.of_a(leaf)
    }

    /// Shadows currently cast on the renderable.
    pub fn shadows_on_renderable(&self, handle: RenderHandle) -> &[ShadowHandle] {
        self.renderable_shadows.of_a(handle)
    }

    pub(crate) fn add_shadow_to_leaf(&mut self, leaf: LeafIndex, shadow: ShadowHandle, manager: &mut dyn ShadowManager) {
        self.leaf_shadows.insert(leaf, shadow);

        let Some(info) = self.shadows.get(shadow) else {
            return;
        };
        if !info.propagates(self.config.shadows_on_renderables) {
            return;
        }

        let generation = self.shadow_enum;
        let in_leaf = self.leaf_renderables.of_a(leaf).to_vec();
        for handle in in_leaf {
            let Some(renderable) = self.renderables.get_mut(handle) else {
                continue;
            };
            if renderable.enum_count == generation {
                continue;
            }
            renderable.enum_count = generation;
            self.add_shadow_to_renderable(handle, shadow, manager);
        }
    }

    pub(crate) fn add_renderable_to_leaf(
        &mut self,
        leaf: LeafIndex,
        handle: RenderHandle,
        manager: &mut dyn ShadowManager,
    ) {
        self.leaf_renderables.insert(leaf, handle);

        let receives = self
            .renderables
            .get(handle)
            .is_some_and(|info| info.receives_shadows());
        if !receives {
            return;
        }

        let generation = self.shadow_enum;
        let shadows_on_renderables = self.config.shadows_on_renderables;
        let in_leaf = self.leaf_shadows.of_a(leaf).to_vec();
        for shadow in in_leaf {
            let Some(info) = self.shadows.get_mut(shadow) else {
                continue;
            };
            if info.enum_count == generation || !info.propagates(shadows_on_renderables) {
                continue;
            }
            info.enum_count = generation;
            self.add_shadow_to_renderable(handle, shadow, manager);
        }
    }

    fn add_shadow_to_renderable(&mut self, handle: RenderHandle, shadow: ShadowHandle, manager: &mut dyn ShadowManager) {
        let (Some(info), Some(shadow_info)) = (self.renderables.get(handle), self.shadows.get(shadow)) else {
            return;
        };
        let Some(kind) = info.model_type.shadow_receiver() else {
            return;
        };
        let accepts = info
            .renderable
            .upgrade()
            .is_some_and(|r| r.should_receive_projected_textures(shadow_info.flags));
        if !accepts {
            return;
        }
        let owner = shadow_info.owner;
        self.renderable_shadows.insert(handle, shadow);
        manager.add_shadow_to_receiver(owner, handle, kind);
    }
}
