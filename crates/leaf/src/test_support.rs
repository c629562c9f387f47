use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use glam::Vec3;
use leafview_common::{
    Aabb, ModelType, RenderHandle, Renderable, ShadowFlags, ShadowId, ShadowManager, ShadowReceiver,
    TranslucencyType,
};
use parking_lot::Mutex;

use crate::info::RenderableDesc;

/// Box-shaped renderable that can be moved between recomputes.
pub(crate) struct TestProp {
    origin: Mutex<Vec3>,
    half: Vec3,
    model_type: ModelType,
    translucency: Mutex<TranslucencyType>,
    receives_projected: AtomicBool,
    move_parent: AtomicBool,
}

impl TestProp {
    pub(crate) fn new(origin: Vec3, half: Vec3, model_type: ModelType) -> Arc<Self> {
        Arc::new(Self {
            origin: Mutex::new(origin),
            half,
            model_type,
            translucency: Mutex::new(TranslucencyType::Opaque),
            receives_projected: AtomicBool::new(true),
            move_parent: AtomicBool::new(false),
        })
    }

    pub(crate) fn studio(origin: Vec3, half: Vec3) -> Arc<Self> {
        Self::new(origin, half, ModelType::StudioModel)
    }

    pub(crate) fn refusing_shadows(self: Arc<Self>) -> Arc<Self> {
        self.receives_projected.store(false, Ordering::Relaxed);
        self
    }

    pub(crate) fn translucent(self: Arc<Self>, translucency: TranslucencyType) -> Arc<Self> {
        *self.translucency.lock() = translucency;
        self
    }

    pub(crate) fn attached(self: Arc<Self>) -> Arc<Self> {
        self.move_parent.store(true, Ordering::Relaxed);
        self
    }

    pub(crate) fn move_to(&self, origin: Vec3) {
        *self.origin.lock() = origin;
    }

    pub(crate) fn as_dyn(self: &Arc<Self>) -> Arc<dyn Renderable> {
        self.clone()
    }

    pub(crate) fn desc(self: &Arc<Self>) -> RenderableDesc {
        RenderableDesc::new(&self.as_dyn(), self.model_type)
    }
}

impl Renderable for TestProp {
    fn render_origin(&self) -> Vec3 {
        *self.origin.lock()
    }

    fn render_bounds(&self) -> Aabb {
        Aabb::from_center_half_extents(Vec3::ZERO, self.half)
    }

    fn compute_translucency_type(&self) -> TranslucencyType {
        *self.translucency.lock()
    }

    fn should_receive_projected_textures(&self, _flags: ShadowFlags) -> bool {
        self.receives_projected.load(Ordering::Relaxed)
    }

    fn has_move_parent(&self) -> bool {
        self.move_parent.load(Ordering::Relaxed)
    }
}

/// Shadow manager that remembers every call.
#[derive(Debug, Default)]
pub(crate) struct RecordingShadows {
    pub(crate) added: Vec<(ShadowId, RenderHandle, ShadowReceiver)>,
    pub(crate) cleared: Vec<(RenderHandle, ShadowReceiver)>,
}

impl ShadowManager for RecordingShadows {
    fn add_shadow_to_receiver(&mut self, shadow: ShadowId, receiver: RenderHandle, kind: ShadowReceiver) {
        self.added.push((shadow, receiver, kind));
    }

    fn remove_all_shadows_from_receiver(&mut self, receiver: RenderHandle, kind: ShadowReceiver) {
        self.cleared.push((receiver, kind));
    }

    fn set_falloff_bias(&mut self, _shadow: ShadowId, _bias: u8) {}
}
