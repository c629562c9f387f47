//! One 3D view: camera, target, flags and water clip state.

use leafview_common::{ClearFlags, DrawFlags, LeafIndex, Plane, ViewId, ViewSetup, vector_angles};

use crate::device::RenderTarget;

/// Offset applied to glass clip planes so the surface itself is not clipped.
pub const GLASS_CLIP_OFFSET: f32 = 0.1;

/// Distance the height clip is moved off the water surface.
pub const WATER_CLIP_SPREAD: f32 = 2.0;

/// What role a view plays in the frame's view tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    Simple,
    AboveWater,
    UnderWater,
    Reflection,
    Refraction,
    Intersection,
    SoftwareIntersection,
    ReflectiveGlass,
    RefractiveGlass,
    Skybox,
    ShadowDepth,
    ViewModel,
}

impl ViewKind {
    pub fn name(self) -> &'static str {
        match self {
            ViewKind::Simple => "simple",
            ViewKind::AboveWater => "above_water",
            ViewKind::UnderWater => "under_water",
            ViewKind::Reflection => "reflection",
            ViewKind::Refraction => "refraction",
            ViewKind::Intersection => "intersection",
            ViewKind::SoftwareIntersection => "software_intersection",
            ViewKind::ReflectiveGlass => "reflective_glass",
            ViewKind::RefractiveGlass => "refractive_glass",
            ViewKind::Skybox => "skybox",
            ViewKind::ShadowDepth => "shadow_depth",
            ViewKind::ViewModel => "view_model",
        }
    }
}

/// Depth-only pass parameters for a shadow-depth view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowDepthPass {
    pub draw_translucents: bool,
    pub non_cached_only: bool,
}

/// A fully resolved view ready to be set up, pushed, drawn and popped.
#[derive(Debug, Clone)]
pub struct View3d {
    pub kind: ViewKind,
    pub setup: ViewSetup,
    pub id: ViewId,
    pub draw_flags: DrawFlags,
    pub clear_flags: ClearFlags,
    /// `None` draws into the parent's target.
    pub target: Option<RenderTarget>,
    /// Custom user clip plane pushed for the duration of the view.
    pub clip_plane: Option<Plane>,
    pub water_height: f32,
    /// How far the clip height moved off the real surface.
    pub water_z_adjust: f32,
    pub software_clip: bool,
    pub fog_volume: i32,
    pub force_view_leaf: Option<LeafIndex>,
    pub shadow_depth: Option<ShadowDepthPass>,
}

impl View3d {
    pub fn new(kind: ViewKind, setup: ViewSetup, id: ViewId) -> Self {
        Self {
            kind,
            setup,
            id,
            draw_flags: DrawFlags::empty(),
            clear_flags: ClearFlags::empty(),
            target: None,
            clip_plane: None,
            water_height: 0.0,
            water_z_adjust: 0.0,
            software_clip: false,
            fog_volume: -1,
            force_view_leaf: None,
            shadow_depth: None,
        }
    }

    pub fn with_flags(mut self, flags: DrawFlags) -> Self {
        self.draw_flags = flags;
        self
    }

    pub fn with_clear(mut self, clear: ClearFlags) -> Self {
        self.clear_flags = clear;
        self
    }

    pub fn with_water(mut self, water_height: f32, z_adjust: f32, fog_volume: i32) -> Self {
        self.water_height = water_height;
        self.water_z_adjust = z_adjust;
        self.fog_volume = fog_volume;
        self
    }

    pub fn with_clip_plane(mut self, plane: Plane) -> Self {
        self.clip_plane = Some(plane);
        self
    }

    /// Renders into `target`, resized to it while keeping `aspect`.
    pub fn with_target(mut self, target: RenderTarget, aspect: f32) -> Self {
        self.setup = fit_to_target(&self.setup, target, aspect);
        self.target = Some(target);
        self
    }

    /// Height the device clips at, with the water spread applied.
    pub fn clip_height(&self) -> f32 {
        if self.draw_flags.contains(DrawFlags::FUDGE_UP) {
            self.water_height + WATER_CLIP_SPREAD
        } else {
            self.water_height - WATER_CLIP_SPREAD
        }
    }
}

/// Resizes a view to cover a whole offscreen target with the parent's aspect.
pub fn fit_to_target(view: &ViewSetup, target: RenderTarget, aspect: f32) -> ViewSetup {
    ViewSetup {
        x: 0,
        y: 0,
        width: target.width,
        height: target.height,
        aspect_ratio: aspect,
        ..*view
    }
}

/// Mirrors the camera below a horizontal water surface.
pub fn water_reflection_setup(view: &ViewSetup, water_height: f32) -> ViewSetup {
    let mut mirrored = *view;
    mirrored.angles.x = -view.angles.x;
    mirrored.angles.z = -view.angles.z;
    mirrored.origin.z -= 2.0 * (view.origin.z - water_height);
    mirrored
}

/// Mirrors the camera about an arbitrary glass plane.
pub fn glass_reflection_setup(view: &ViewSetup, plane: &Plane) -> ViewSetup {
    let basis = view.basis();
    let forward = plane.reflect_vector(basis.forward);
    let up = plane.reflect_vector(basis.up);
    ViewSetup {
        origin: plane.reflect_point(view.origin),
        angles: vector_angles(forward, up),
        ..*view
    }
}

/// Clip plane keeping only what lies in front of reflective glass.
pub fn reflective_glass_clip(plane: &Plane) -> Plane {
    Plane::new(plane.normal, plane.dist + GLASS_CLIP_OFFSET)
}

/// Clip plane keeping only what lies behind refractive glass.
pub fn refractive_glass_clip(plane: &Plane) -> Plane {
    Plane::new(-plane.normal, -plane.dist + GLASS_CLIP_OFFSET)
}
