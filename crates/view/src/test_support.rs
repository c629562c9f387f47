use std::sync::Arc;

use glam::Vec3;
use leafview_common::{
    Aabb, MaterialId, ModelType, RenderConfig, RenderHandle, Renderable, ShadowDepthRequest, ShadowId, ShadowManager,
    ShadowReceiver, TextureId, TranslucencyType, ViewSetup, WaterMaterial,
};
use leafview_leaf::{GridLeaves, GridWater, RenderableDesc};

use crate::scene::Scene;

/// Axis-aligned box prop.
#[derive(Debug, Clone)]
pub(crate) struct Prop {
    origin: Vec3,
    half: Vec3,
    model_type: ModelType,
    translucency: TranslucencyType,
    npc: bool,
}

impl Prop {
    pub(crate) fn new(origin: Vec3) -> Self {
        Self {
            origin,
            half: Vec3::splat(8.0),
            model_type: ModelType::StudioModel,
            translucency: TranslucencyType::Opaque,
            npc: false,
        }
    }

    pub(crate) fn model(mut self, model_type: ModelType) -> Self {
        self.model_type = model_type;
        self
    }

    pub(crate) fn half(mut self, half: f32) -> Self {
        self.half = Vec3::splat(half);
        self
    }

    pub(crate) fn translucent(mut self) -> Self {
        self.translucency = TranslucencyType::Translucent;
        self
    }

    pub(crate) fn npc(mut self) -> Self {
        self.npc = true;
        self
    }
}

impl Renderable for Prop {
    fn render_origin(&self) -> Vec3 {
        self.origin
    }

    fn render_bounds(&self) -> Aabb {
        Aabb::from_center_half_extents(Vec3::ZERO, self.half)
    }

    fn compute_translucency_type(&self) -> TranslucencyType {
        self.translucency
    }

    fn is_npc(&self) -> bool {
        self.npc
    }
}

/// Shadow manager asking for a fixed set of depth textures every frame.
#[derive(Debug, Default)]
pub(crate) struct DepthShadows {
    pub(crate) requests: Vec<ShadowDepthRequest>,
}

impl DepthShadows {
    pub(crate) fn one(view: ViewSetup, draw_translucents: bool) -> Self {
        Self {
            requests: vec![ShadowDepthRequest {
                view,
                depth_target: TextureId(40),
                color_target: None,
                draw_translucents,
                non_cached_only: false,
            }],
        }
    }
}

impl ShadowManager for DepthShadows {
    fn add_shadow_to_receiver(&mut self, _: ShadowId, _: RenderHandle, _: ShadowReceiver) {}

    fn remove_all_shadows_from_receiver(&mut self, _: RenderHandle, _: ShadowReceiver) {}

    fn set_falloff_bias(&mut self, _: ShadowId, _: u8) {}

    fn compute_shadow_depth_textures(&mut self, _: &ViewSetup) -> Vec<ShadowDepthRequest> {
        self.requests.clone()
    }
}

pub(crate) fn water_material() -> WaterMaterial {
    WaterMaterial {
        id: MaterialId(7),
        translucent: true,
        has_reflect_texture: true,
        has_refract_texture: true,
        force_cheap: false,
        force_expensive: false,
        reflect_entities: true,
        underwater_overlay: Some(MaterialId(70)),
    }
}

/// Four 128-unit cells along +x.
pub(crate) fn corridor() -> GridLeaves {
    GridLeaves::new(Vec3::new(0.0, -64.0, 0.0), 128.0, [4, 1, 1])
}

/// An 8x8x4 block of cells centered on the origin.
pub(crate) fn pool_grid() -> GridLeaves {
    GridLeaves::new(Vec3::new(-512.0, -512.0, -256.0), 128.0, [8, 8, 4])
}

/// Same block with water at z = 0.
pub(crate) fn pool_with_water(material: WaterMaterial) -> GridLeaves {
    pool_grid().with_water(GridWater { height: 0.0, material })
}

/// Camera at the near end of the corridor looking down it.
pub(crate) fn corridor_view() -> ViewSetup {
    ViewSetup {
        origin: Vec3::new(8.0, 0.0, 64.0),
        width: 512,
        height: 512,
        fov: 90.0,
        ..ViewSetup::default()
    }
}

pub(crate) fn view_at(origin: Vec3) -> ViewSetup {
    ViewSetup {
        origin,
        width: 512,
        height: 512,
        fov: 90.0,
        ..ViewSetup::default()
    }
}

/// Scene plus the props it registered, which it does not own.
pub(crate) struct Stage {
    pub(crate) scene: Scene,
    props: Vec<Arc<dyn Renderable>>,
}

impl Stage {
    pub(crate) fn new(grid: GridLeaves) -> Self {
        Self::with_config(&RenderConfig::default(), grid)
    }

    pub(crate) fn with_config(config: &RenderConfig, grid: GridLeaves) -> Self {
        Self {
            scene: Scene::with_config(config, Box::new(grid)),
            props: Vec::new(),
        }
    }

    fn register(&mut self, prop: Prop, configure: impl FnOnce(RenderableDesc) -> RenderableDesc) -> RenderHandle {
        let model_type = prop.model_type;
        let prop: Arc<dyn Renderable> = Arc::new(prop);
        let desc = configure(RenderableDesc::new(&prop, model_type));
        let handle = self.scene.add_renderable(desc);
        self.props.push(prop);
        self.scene.recompute_leaves();
        handle
    }

    pub(crate) fn add(&mut self, prop: Prop) -> RenderHandle {
        self.register(prop, |desc| desc)
    }

    pub(crate) fn add_view_model(&mut self, prop: Prop) -> RenderHandle {
        self.register(prop, RenderableDesc::with_view_models)
    }

    /// Registers a prop that fades out between `start` and `end` units.
    pub(crate) fn add_faded(&mut self, prop: Prop, start: f32, end: f32) -> RenderHandle {
        let alpha = self.scene.alpha.create();
        if let Some(property) = self.scene.alpha.get_mut(alpha) {
            property.set_fade(1.0, start, end);
        }
        self.register(prop, |desc| desc.with_alpha(alpha, false))
    }

    /// Registers a prop that draws without depth testing.
    pub(crate) fn add_no_z(&mut self, prop: Prop) -> RenderHandle {
        let alpha = self.scene.alpha.create();
        self.register(prop, |desc| desc.with_alpha(alpha, true))
    }
}
