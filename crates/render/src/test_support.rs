use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use glam::Vec3;
use leafview_alpha::{AlphaProperty, AlphaPropertyPool};
use leafview_common::{
    Aabb, BuiltWorldLists, DetailObjectSystem, DetailRenderable, Frustum, LeafIndex, ModelType, RenderHandle,
    Renderable, ShadowId, ShadowManager, ShadowReceiver, SpatialQuery, TranslucencyType, ViewId, ViewSetup,
    VisibleFogVolume, WorldListRequest,
};
use leafview_leaf::{GridLeaves, LeafSystem, RenderableDesc};

use crate::builder::{BuildParams, RenderListBuilder, SceneRefs};
use crate::list::RenderablesList;

/// Renderable with no extent.
pub(crate) struct NullRenderable;

impl Renderable for NullRenderable {
    fn render_origin(&self) -> Vec3 {
        Vec3::ZERO
    }

    fn render_bounds(&self) -> Aabb {
        Aabb::new(Vec3::ZERO, Vec3::ZERO)
    }
}

/// Axis-aligned box prop.
#[derive(Debug, Clone)]
pub(crate) struct Prop {
    origin: Vec3,
    half: Vec3,
    model_type: ModelType,
    translucency: TranslucencyType,
}

impl Prop {
    pub(crate) fn new(origin: Vec3, half: Vec3) -> Self {
        Self {
            origin,
            half,
            model_type: ModelType::StudioModel,
            translucency: TranslucencyType::Opaque,
        }
    }

    pub(crate) fn model(mut self, model_type: ModelType) -> Self {
        self.model_type = model_type;
        self
    }

    pub(crate) fn translucency(mut self, translucency: TranslucencyType) -> Self {
        self.translucency = translucency;
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
}

/// Grid level that counts model-cache lock brackets.
pub(crate) struct Level {
    pub(crate) grid: GridLeaves,
    locks: AtomicUsize,
}

impl SpatialQuery for Level {
    fn leaf_count(&self) -> u32 {
        self.grid.leaf_count()
    }

    fn enumerate_leaves_in_box(&self, bounds: &Aabb, out: &mut dyn FnMut(LeafIndex)) {
        self.grid.enumerate_leaves_in_box(bounds, out)
    }

    fn leaves_area(&self, leaves: &[LeafIndex]) -> i32 {
        self.grid.leaves_area(leaves)
    }

    fn build_world_lists(&self, view: &ViewSetup, request: &WorldListRequest) -> BuiltWorldLists {
        self.grid.build_world_lists(view, request)
    }

    fn does_box_touch_area_frustum(&self, frustum: &Frustum, bounds: &Aabb, area: i32) -> bool {
        self.grid.does_box_touch_area_frustum(frustum, bounds, area)
    }

    fn is_occluded(&self, bounds: &Aabb) -> bool {
        self.grid.is_occluded(bounds)
    }

    fn box_intersects_water_volume(&self, bounds: &Aabb, fog_volume: i32) -> bool {
        self.grid.box_intersects_water_volume(bounds, fog_volume)
    }

    fn visible_fog_volume(&self, eye: Vec3) -> VisibleFogVolume {
        self.grid.visible_fog_volume(eye)
    }

    fn lock_model_cache(&self) {
        self.locks.fetch_add(1, Ordering::Relaxed);
    }
}

/// Shadow manager that records falloff biases.
#[derive(Debug, Default)]
pub(crate) struct BiasShadows {
    pub(crate) biases: Vec<(ShadowId, u8)>,
}

impl ShadowManager for BiasShadows {
    fn add_shadow_to_receiver(&mut self, _: ShadowId, _: RenderHandle, _: ShadowReceiver) {}

    fn remove_all_shadows_from_receiver(&mut self, _: RenderHandle, _: ShadowReceiver) {}

    fn set_falloff_bias(&mut self, shadow: ShadowId, bias: u8) {
        self.biases.push((shadow, bias));
    }
}

/// Detail system returning a fixed list.
#[derive(Debug, Default)]
pub(crate) struct ListDetails {
    pub(crate) items: Vec<DetailRenderable>,
}

impl DetailObjectSystem for ListDetails {
    fn build_rendering_data(&mut self, _: &[LeafIndex], _: Vec3) -> Vec<DetailRenderable> {
        self.items.clone()
    }

    fn render_translucent_detail_objects_in_leaf(&mut self, _: LeafIndex, _: Vec3) {}
}

/// Four 128-unit cells along +x, camera at the near end looking down the corridor.
pub(crate) fn corridor_grid() -> GridLeaves {
    GridLeaves::new(Vec3::new(0.0, -64.0, 0.0), 128.0, [4, 1, 1])
}

/// A level, its registries and a builder.
pub(crate) struct Stage {
    pub(crate) level: Level,
    pub(crate) leaves: LeafSystem,
    pub(crate) alpha: AlphaPropertyPool,
    pub(crate) shadows: BiasShadows,
    pub(crate) details: ListDetails,
    pub(crate) builder: RenderListBuilder,
    pub(crate) view: ViewSetup,
    pub(crate) frame: u32,
    props: Vec<Arc<Prop>>,
}

impl Stage {
    pub(crate) fn corridor() -> Self {
        Self::with_grid(corridor_grid())
    }

    pub(crate) fn with_grid(grid: GridLeaves) -> Self {
        let mut leaves = LeafSystem::default();
        leaves.level_init(grid.leaf_count());
        Self {
            level: Level {
                grid,
                locks: AtomicUsize::new(0),
            },
            leaves,
            alpha: AlphaPropertyPool::new(),
            shadows: BiasShadows::default(),
            details: ListDetails::default(),
            builder: RenderListBuilder::default(),
            view: ViewSetup {
                origin: Vec3::new(0.0, 0.0, 32.0),
                width: 512,
                height: 512,
                fov: 90.0,
                ..ViewSetup::default()
            },
            frame: 0,
            props: Vec::new(),
        }
    }

    fn register(&mut self, prop: Prop, alpha: Option<leafview_common::AlphaHandle>, view_model: bool) -> RenderHandle {
        let model_type = prop.model_type;
        let prop = Arc::new(prop);
        let as_dyn: Arc<dyn Renderable> = prop.clone();
        let mut desc = RenderableDesc::new(&as_dyn, model_type);
        if let Some(alpha) = alpha {
            desc = desc.with_alpha(alpha, false);
        }
        if view_model {
            desc = desc.with_view_models();
        }
        let handle = self.leaves.add_renderable(desc);
        self.props.push(prop);
        self.leaves.recompute_leaves(&self.level, &mut self.shadows);
        handle
    }

    pub(crate) fn add(&mut self, prop: Prop) -> RenderHandle {
        self.register(prop, None, false)
    }

    pub(crate) fn add_with_alpha(&mut self, prop: Prop, setup: impl FnOnce(&mut AlphaProperty)) -> RenderHandle {
        let alpha = self.alpha.create();
        if let Some(property) = self.alpha.get_mut(alpha) {
            setup(property);
        }
        self.register(prop, Some(alpha), false)
    }

    pub(crate) fn add_view_model(&mut self, prop: Prop) -> RenderHandle {
        self.register(prop, None, true)
    }

    pub(crate) fn spatial_locks(&self) -> usize {
        self.level.locks.load(Ordering::Relaxed)
    }

    /// Advances the frame and builds the main view's lists; `adjust` tweaks the params.
    pub(crate) fn build(&mut self, adjust: impl FnOnce(BuildParams<'_>) -> BuildParams<'_>) -> RenderablesList {
        self.frame += 1;
        let world = self
            .builder
            .build_world_list(&self.level, &self.view, &WorldListRequest::default(), -1);
        let params = adjust(BuildParams::new(&self.view, ViewId::Main, &world));
        let mut scene = SceneRefs {
            leaves: &mut self.leaves,
            alpha: &self.alpha,
            spatial: &self.level,
            shadows: &mut self.shadows,
            details: &mut self.details,
        };
        self.builder.build(&mut scene, &params, self.frame)
    }
}
