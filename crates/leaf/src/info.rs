use std::sync::{Arc, Weak};

use bitflags::bitflags;
use leafview_common::{
    Aabb, AlphaHandle, ClientRenderGroup, EngineRenderGroup, ModelType, Renderable, ShadowFlags,
    SizeBucket, TranslucencyType,
};

bitflags! {
    /// Per-renderable state bits kept by the leaf registry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RenderFlags: u32 {
        /// Queued on the dirty list.
        const HAS_CHANGED = 1 << 0;
        const TWO_PASS = 1 << 1;
        /// Merge new bloated bounds with the previous ones.
        const BLOAT_BOUNDS = 1 << 2;
        /// Cached world-space bounds are current.
        const BOUNDS_VALID = 1 << 3;
        const BOUNDS_ALWAYS_RECOMPUTE = 1 << 4;
        const DISABLE_RENDERING = 1 << 5;
        const DISABLE_SHADOW_DEPTH = 1 << 6;
        const DISABLE_SHADOW_DEPTH_CACHING = 1 << 7;
        /// Draw in the furthest leaf touched instead of the first.
        const ALTERNATE_SORTING = 1 << 8;
        const RENDER_WITH_VIEWMODELS = 1 << 9;
        const RECEIVE_SHADOWS = 1 << 10;
        /// Alpha property ignores the depth buffer.
        const IGNORES_Z = 1 << 11;
    }
}

/// Registration request.
#[derive(Clone)]
pub struct RenderableDesc {
    pub renderable: Weak<dyn Renderable>,
    pub alpha: Option<AlphaHandle>,
    /// The alpha property routes into the no-depth-test pass.
    pub ignores_z: bool,
    pub render_with_view_models: bool,
    pub translucency: TranslucencyType,
    pub model_type: ModelType,
}

impl RenderableDesc {
    pub fn new(renderable: &Arc<dyn Renderable>, model_type: ModelType) -> Self {
        Self {
            renderable: Arc::downgrade(renderable),
            alpha: None,
            ignores_z: false,
            render_with_view_models: false,
            translucency: renderable.compute_translucency_type(),
            model_type,
        }
    }

    pub fn with_alpha(mut self, alpha: AlphaHandle, ignores_z: bool) -> Self {
        self.alpha = Some(alpha);
        self.ignores_z = ignores_z;
        self
    }

    pub fn with_translucency(mut self, translucency: TranslucencyType) -> Self {
        self.translucency = translucency;
        self
    }

    pub fn with_view_models(mut self) -> Self {
        self.render_with_view_models = true;
        self
    }
}

impl std::fmt::Debug for RenderableDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderableDesc")
            .field("alpha", &self.alpha)
            .field("ignores_z", &self.ignores_z)
            .field("render_with_view_models", &self.render_with_view_models)
            .field("translucency", &self.translucency)
            .field("model_type", &self.model_type)
            .finish_non_exhaustive()
    }
}

/// Registry record of one renderable.
#[derive(Clone)]
pub struct RenderableInfo {
    pub(crate) renderable: Weak<dyn Renderable>,
    pub(crate) alpha: Option<AlphaHandle>,
    pub(crate) flags: RenderFlags,
    pub(crate) translucency: TranslucencyType,
    pub(crate) model_type: ModelType,
    pub(crate) client_group: ClientRenderGroup,
    pub(crate) engine_group: EngineRenderGroup,
    /// Group used when drawn opaque; carries the size bucket.
    pub(crate) opaque_group: EngineRenderGroup,
    pub(crate) bloated: Aabb,
    /// Cached exact world-space bounds.
    pub(crate) bounds: Aabb,
    pub(crate) area: i32,
    pub(crate) last_drawn_frame: u32,
    /// Dedup pass that last saw this entry.
    pub(crate) seen_pass: u32,
    /// Remaining occurrences of an alternate-sorted entry in the current dedup pass.
    pub(crate) occurrences: u32,
    /// Shadow enumeration generation that last touched this entry.
    pub(crate) enum_count: u32,
}

impl RenderableInfo {
    pub(crate) fn new(desc: &RenderableDesc) -> Self {
        let mut flags = RenderFlags::empty();
        if desc.ignores_z {
            flags |= RenderFlags::IGNORES_Z;
        }
        let mut info = Self {
            renderable: desc.renderable.clone(),
            alpha: desc.alpha,
            flags,
            translucency: desc.translucency,
            model_type: desc.model_type,
            client_group: ClientRenderGroup::Opaque,
            engine_group: EngineRenderGroup::OpaqueBrush,
            opaque_group: EngineRenderGroup::opaque_for(desc.model_type),
            bloated: Aabb::INVERTED,
            bounds: Aabb::INVERTED,
            area: -1,
            last_drawn_frame: u32::MAX,
            seen_pass: 0,
            occurrences: 0,
            enum_count: 0,
        };
        info.classify();
        info
    }

    /// Derives render groups from translucency and model type, keeping any size bucket.
    pub(crate) fn classify(&mut self) {
        self.flags.set(
            RenderFlags::TWO_PASS,
            self.translucency == TranslucencyType::TwoPass,
        );
        self.client_group = match self.translucency {
            TranslucencyType::Opaque => ClientRenderGroup::Opaque,
            _ if self.flags.contains(RenderFlags::IGNORES_Z) => ClientRenderGroup::TranslucentIgnoreZ,
            _ => ClientRenderGroup::Translucent,
        };

        self.opaque_group = EngineRenderGroup::opaque_for(self.model_type).with_bucket(self.bucket());
        self.engine_group = if self.is_opaque() {
            self.opaque_group
        } else {
            EngineRenderGroup::TranslucentEntity
        };
    }

    fn bucket(&self) -> SizeBucket {
        match self.opaque_group {
            EngineRenderGroup::OpaqueStatic(b) | EngineRenderGroup::OpaqueEntity(b) => b,
            _ => SizeBucket::Tiny,
        }
    }

    pub fn renderable(&self) -> Option<Arc<dyn Renderable>> {
        self.renderable.upgrade()
    }

    pub fn weak_renderable(&self) -> &Weak<dyn Renderable> {
        &self.renderable
    }

    pub fn alpha(&self) -> Option<AlphaHandle> {
        self.alpha
    }

    pub fn flags(&self) -> RenderFlags {
        self.flags
    }

    pub fn translucency(&self) -> TranslucencyType {
        self.translucency
    }

    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    pub fn client_group(&self) -> ClientRenderGroup {
        self.client_group
    }

    pub fn engine_group(&self) -> EngineRenderGroup {
        self.engine_group
    }

    pub fn opaque_group(&self) -> EngineRenderGroup {
        self.opaque_group
    }

    pub fn bloated_bounds(&self) -> Aabb {
        self.bloated
    }

    pub fn cached_bounds(&self) -> Option<Aabb> {
        self.flags
            .contains(RenderFlags::BOUNDS_VALID)
            .then_some(self.bounds)
    }

    pub fn area(&self) -> i32 {
        self.area
    }

    pub fn last_drawn_frame(&self) -> u32 {
        self.last_drawn_frame
    }

    /// Whether the renderable survived into a list built in `frame`.
    pub fn drawn_in_frame(&self, frame: u32) -> bool {
        self.last_drawn_frame == frame
    }

    pub fn is_two_pass(&self) -> bool {
        self.flags.contains(RenderFlags::TWO_PASS) || self.translucency == TranslucencyType::TwoPass
    }

    pub fn is_opaque(&self) -> bool {
        self.translucency == TranslucencyType::Opaque
    }

    pub fn is_translucent(&self) -> bool {
        self.translucency == TranslucencyType::Translucent
    }

    pub fn is_view_model(&self) -> bool {
        self.flags.contains(RenderFlags::RENDER_WITH_VIEWMODELS)
    }

    pub fn is_disabled(&self) -> bool {
        self.flags.contains(RenderFlags::DISABLE_RENDERING)
    }

    pub fn receives_shadows(&self) -> bool {
        self.flags.contains(RenderFlags::RECEIVE_SHADOWS)
    }

    /// Brush, static-prop and studio renderables that accept projected textures.
    pub(crate) fn compute_receive_shadows(&self) -> bool {
        self.model_type.shadow_receiver().is_some()
            && self
                .renderable
                .upgrade()
                .is_some_and(|r| r.should_receive_projected_textures(ShadowFlags::PROJECTED_TEXTURE_MASK))
    }
}

impl std::fmt::Debug for RenderableInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderableInfo")
            .field("live", &(self.renderable.strong_count() > 0))
            .field("flags", &self.flags)
            .field("translucency", &self.translucency)
            .field("model_type", &self.model_type)
            .field("engine_group", &self.engine_group)
            .field("bloated", &self.bloated)
            .field("area", &self.area)
            .field("last_drawn_frame", &self.last_drawn_frame)
            .finish_non_exhaustive()
    }
}
