use std::fmt::Write as _;

use leafview_common::{EngineRenderGroup, LeafIndex, ModelType, RenderHandle, SizeBucket, TranslucencyType};
use leafview_render::RenderablesList;
use leafview_view::{DrawnView, Scene};

/// Read-only queries against a loaded scene and the lists built from it,
/// for debugging output and development UI.
pub struct SceneInspector;

impl SceneInspector {
    /// Produce a summary of the scene's registries.
    pub fn summary(scene: &Scene) -> SceneSummary {
        let stats = scene.leaves.stats();
        SceneSummary {
            leaves: stats.leaves,
            renderables: stats.renderables,
            view_models: stats.view_models,
            shadows: stats.shadows,
            leaf_links: stats.leaf_links,
            dirty: stats.dirty,
            alpha_properties: scene.alpha.len(),
            glass_surfaces: scene.glass.len(),
            has_sky: scene.sky.is_some_and(|sky| sky.is_enabled()),
        }
    }

    /// Registration and leaf membership of one renderable.
    pub fn inspect_renderable(scene: &Scene, handle: RenderHandle) -> Option<RenderableSummary> {
        let Some(info) = scene.leaves.info(handle) else {
            tracing::debug!(?handle, "inspecting unknown renderable");
            return None;
        };
        let origin = info.renderable().map(|r| r.render_origin().to_array());
        Some(RenderableSummary {
            handle,
            origin,
            model_type: info.model_type(),
            translucency: info.translucency(),
            group: info.engine_group(),
            leaves: scene.leaves.renderable_leaves(handle).to_vec(),
            area: info.area(),
            last_drawn_frame: info.last_drawn_frame(),
            view_model: info.is_view_model(),
        })
    }

    /// All registered handles, in registry order.
    pub fn list_renderables(scene: &Scene) -> Vec<RenderHandle> {
        scene.leaves.iter().map(|(handle, _)| handle).collect()
    }

    /// Occupancy of every group of a built list.
    pub fn list_summary(list: &RenderablesList) -> ListSummary {
        let per_bucket = |group: fn(SizeBucket) -> EngineRenderGroup| SizeBucket::ALL.map(|b| list.count(group(b)));
        ListSummary {
            brushes: list.brushes().len(),
            opaque_static: per_bucket(EngineRenderGroup::OpaqueStatic),
            opaque_entity: per_bucket(EngineRenderGroup::OpaqueEntity),
            translucent: list.translucent().len(),
            ignore_z: list.translucent().iter().filter(|e| e.ignores_z).count(),
            overflow: list.overflow_count(),
        }
    }

    /// One line per drawn view, indented by nesting depth.
    pub fn view_tree(views: &[DrawnView]) -> String {
        let mut out = String::new();
        for view in views {
            let indent = "  ".repeat(view.depth.saturating_sub(1));
            let _ = writeln!(
                out,
                "{indent}{} [{:?}] leaves={} renderables={}{}",
                view.kind.name(),
                view.id,
                view.world_leaves,
                view.renderables,
                if view.cached { " (cached)" } else { "" },
            );
        }
        out
    }
}

/// Summary of scene registries for the inspector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneSummary {
    pub leaves: usize,
    pub renderables: usize,
    pub view_models: usize,
    pub shadows: usize,
    pub leaf_links: usize,
    pub dirty: usize,
    pub alpha_properties: usize,
    pub glass_surfaces: usize,
    pub has_sky: bool,
}

impl std::fmt::Display for SceneSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Scene: leaves={} renderables={} view_models={} shadows={} links={} dirty={} alpha={} glass={} sky={}",
            self.leaves,
            self.renderables,
            self.view_models,
            self.shadows,
            self.leaf_links,
            self.dirty,
            self.alpha_properties,
            self.glass_surfaces,
            self.has_sky,
        )
    }
}

/// Detailed info about a single renderable.
#[derive(Debug, Clone)]
pub struct RenderableSummary {
    pub handle: RenderHandle,
    /// `None` once the game dropped the renderable.
    pub origin: Option<[f32; 3]>,
    pub model_type: ModelType,
    pub translucency: TranslucencyType,
    pub group: EngineRenderGroup,
    pub leaves: Vec<LeafIndex>,
    pub area: i32,
    pub last_drawn_frame: u32,
    pub view_model: bool,
}

impl std::fmt::Display for RenderableSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Renderable {:?} {:?}/{:?} group={:?}", self.handle, self.model_type, self.translucency, self.group)?;
        match self.origin {
            Some([x, y, z]) => write!(f, " pos=({x:.2}, {y:.2}, {z:.2})")?,
            None => write!(f, " pos=<dropped>")?,
        }
        write!(f, " leaves={:?} area={}", self.leaves, self.area)
    }
}

/// Per-group entry counts of one renderables list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSummary {
    pub brushes: usize,
    /// Indexed like [`SizeBucket::ALL`].
    pub opaque_static: [usize; 4],
    pub opaque_entity: [usize; 4],
    pub translucent: usize,
    pub ignore_z: usize,
    pub overflow: usize,
}

impl ListSummary {
    pub fn opaque(&self) -> usize {
        self.brushes + self.opaque_static.iter().sum::<usize>() + self.opaque_entity.iter().sum::<usize>()
    }
}

impl std::fmt::Display for ListSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "List: brushes={} static={:?} entity={:?} translucent={} (no-z {}) overflow={}",
            self.brushes, self.opaque_static, self.opaque_entity, self.translucent, self.ignore_z, self.overflow
        )
    }
}
