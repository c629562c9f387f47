use std::fmt::Write as _;

use glam::Vec3;
use leafview_alpha::FadeOverlay;
use leafview_common::{
    ClearFlags, DrawFlags, DrawModelFlags, MaterialId, Plane, RenderHandle, Renderable, TextureId, ViewId, ViewSetup,
    WorldListId,
};
use leafview_render::WorldListInfo;

/// Offscreen color buffer a view can render into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub texture: TextureId,
    pub width: i32,
    pub height: i32,
}

impl RenderTarget {
    pub const fn new(texture: TextureId, width: i32, height: i32) -> Self {
        Self { texture, width, height }
    }
}

/// Which side of the water clip height survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightClipMode {
    Disable,
    RenderAbove,
    RenderBelow,
}

/// Draw-submission interface the composer drives.
///
/// The composer decides what to draw and in which order; a device only
/// executes. Every `push_*` is matched by one `pop_view` before the parent
/// view issues further calls.
pub trait RenderDevice {
    fn push_3d_view(&mut self, view: &ViewSetup, id: ViewId, clear: ClearFlags, target: Option<RenderTarget>);

    fn push_2d_view(&mut self, view: &ViewSetup);

    fn pop_view(&mut self);

    fn set_height_clip(&mut self, mode: HeightClipMode, z: f32);

    fn push_custom_clip_plane(&mut self, plane: Plane);

    fn pop_custom_clip_plane(&mut self);

    fn draw_world_lists(&mut self, world: &WorldListInfo, flags: DrawFlags, water_z_adjust: f32);

    /// Translucent surfaces of one leaf; `leaf_index` indexes the unpruned list.
    fn draw_translucent_world_leaf(&mut self, world: &WorldListInfo, leaf_index: usize, flags: DrawFlags);

    fn draw_renderable(
        &mut self,
        handle: Option<RenderHandle>,
        renderable: &dyn Renderable,
        flags: DrawModelFlags,
        alpha: u8,
    ) -> bool {
        let _ = handle;
        renderable.draw_model(flags, alpha)
    }

    fn draw_post_effects(&mut self, view: &ViewSetup) {
        let _ = view;
    }

    fn draw_screen_fade(&mut self, overlay: FadeOverlay);

    fn draw_overlay(&mut self, material: MaterialId, view: &ViewSetup);

    fn draw_full_screen_texture(&mut self, texture: TextureId, view: &ViewSetup);

    fn capture_frame(&mut self, texture: TextureId, view: &ViewSetup);

    fn paint_hud(&mut self, view: &ViewSetup) {
        let _ = view;
    }
}

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    PushView {
        id: ViewId,
        clear: ClearFlags,
        target: Option<TextureId>,
        origin: Vec3,
        angles: Vec3,
    },
    Push2d,
    PopView,
    HeightClip {
        mode: HeightClipMode,
        z: f32,
    },
    PushClipPlane(Plane),
    PopClipPlane,
    World {
        list: WorldListId,
        leaves: usize,
        flags: DrawFlags,
        water_z_adjust: f32,
    },
    TranslucentLeaf {
        list: WorldListId,
        index: usize,
    },
    Model {
        handle: Option<RenderHandle>,
        flags: DrawModelFlags,
        alpha: u8,
    },
    PostEffects,
    ScreenFade(FadeOverlay),
    Overlay(MaterialId),
    FullScreenTexture(TextureId),
    Capture(TextureId),
    Hud,
}

/// Device that records every call and forwards model draws to the renderable.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    calls: Vec<DeviceCall>,
    depth: usize,
    max_depth: usize,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    pub fn clear(&mut self) {
        self.calls.clear();
        self.depth = 0;
        self.max_depth = 0;
    }

    /// Views still pushed; zero after a balanced frame.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Ids of every 3D view pushed, in push order.
    pub fn pushed_views(&self) -> Vec<ViewId> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                DeviceCall::PushView { id, .. } => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Handles of drawn models, in draw order.
    pub fn drawn_models(&self) -> Vec<Option<RenderHandle>> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                DeviceCall::Model { handle, .. } => Some(*handle),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&DeviceCall) -> bool) -> usize {
        self.calls.iter().filter(|call| matches(call)).count()
    }

    /// Indented, human-readable listing of the recorded calls.
    pub fn transcript(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Frame ({} calls, max depth {}) ===", self.calls.len(), self.max_depth);
        let mut depth = 0usize;
        for call in &self.calls {
            if matches!(call, DeviceCall::PopView) {
                depth = depth.saturating_sub(1);
            }
            let indent = "  ".repeat(depth + 1);
            let _ = match call {
                DeviceCall::PushView {
                    id,
                    clear,
                    target,
                    origin,
                    angles,
                } => writeln!(
                    out,
                    "{indent}push {id:?} clear={clear:?} target={target:?} origin=({:.1}, {:.1}, {:.1}) angles=({:.1}, {:.1}, {:.1})",
                    origin.x, origin.y, origin.z, angles.x, angles.y, angles.z
                ),
                DeviceCall::Push2d => writeln!(out, "{indent}push 2d"),
                DeviceCall::PopView => writeln!(out, "{indent}pop"),
                DeviceCall::HeightClip { mode, z } => writeln!(out, "{indent}height clip {mode:?} z={z:.2}"),
                DeviceCall::PushClipPlane(plane) => writeln!(
                    out,
                    "{indent}push clip plane n=({:.2}, {:.2}, {:.2}) d={:.2}",
                    plane.normal.x, plane.normal.y, plane.normal.z, plane.dist
                ),
                DeviceCall::PopClipPlane => writeln!(out, "{indent}pop clip plane"),
                DeviceCall::World {
                    list,
                    leaves,
                    flags,
                    water_z_adjust,
                } => writeln!(
                    out,
                    "{indent}world list={} leaves={leaves} flags={flags:?} z_adjust={water_z_adjust:.2}",
                    list.0
                ),
                DeviceCall::TranslucentLeaf { list, index } => {
                    writeln!(out, "{indent}translucent leaf list={} index={index}", list.0)
                }
                DeviceCall::Model { handle, flags, alpha } => {
                    writeln!(out, "{indent}model {handle:?} flags={flags:?} alpha={alpha}")
                }
                DeviceCall::PostEffects => writeln!(out, "{indent}post effects"),
                DeviceCall::ScreenFade(fade) => writeln!(
                    out,
                    "{indent}screen fade color={:?} alpha={} modulate={}",
                    fade.color, fade.alpha, fade.modulate
                ),
                DeviceCall::Overlay(material) => writeln!(out, "{indent}overlay material={}", material.0),
                DeviceCall::FullScreenTexture(texture) => writeln!(out, "{indent}full screen texture={}", texture.0),
                DeviceCall::Capture(texture) => writeln!(out, "{indent}capture texture={}", texture.0),
                DeviceCall::Hud => writeln!(out, "{indent}hud"),
            };
            if matches!(call, DeviceCall::PushView { .. } | DeviceCall::Push2d) {
                depth += 1;
            }
        }
        out
    }

    fn push(&mut self, call: DeviceCall) {
        self.depth += 1;
        self.max_depth = self.max_depth.max(self.depth);
        self.calls.push(call);
    }
}

impl RenderDevice for RecordingDevice {
    fn push_3d_view(&mut self, view: &ViewSetup, id: ViewId, clear: ClearFlags, target: Option<RenderTarget>) {
        self.push(DeviceCall::PushView {
            id,
            clear,
            target: target.map(|t| t.texture),
            origin: view.origin,
            angles: view.angles,
        });
    }

    fn push_2d_view(&mut self, _: &ViewSetup) {
        self.push(DeviceCall::Push2d);
    }

    fn pop_view(&mut self) {
        if self.depth == 0 {
            tracing::warn!("pop_view without a pushed view");
        }
        self.depth = self.depth.saturating_sub(1);
        self.calls.push(DeviceCall::PopView);
    }

    fn set_height_clip(&mut self, mode: HeightClipMode, z: f32) {
        self.calls.push(DeviceCall::HeightClip { mode, z });
    }

    fn push_custom_clip_plane(&mut self, plane: Plane) {
        self.calls.push(DeviceCall::PushClipPlane(plane));
    }

    fn pop_custom_clip_plane(&mut self) {
        self.calls.push(DeviceCall::PopClipPlane);
    }

    fn draw_world_lists(&mut self, world: &WorldListInfo, flags: DrawFlags, water_z_adjust: f32) {
        self.calls.push(DeviceCall::World {
            list: world.list,
            leaves: world.len(),
            flags,
            water_z_adjust,
        });
    }

    fn draw_translucent_world_leaf(&mut self, world: &WorldListInfo, leaf_index: usize, _: DrawFlags) {
        self.calls.push(DeviceCall::TranslucentLeaf {
            list: world.list,
            index: leaf_index,
        });
    }

    fn draw_renderable(
        &mut self,
        handle: Option<RenderHandle>,
        renderable: &dyn Renderable,
        flags: DrawModelFlags,
        alpha: u8,
    ) -> bool {
        self.calls.push(DeviceCall::Model { handle, flags, alpha });
        renderable.draw_model(flags, alpha)
    }

    fn draw_post_effects(&mut self, _: &ViewSetup) {
        self.calls.push(DeviceCall::PostEffects);
    }

    fn draw_screen_fade(&mut self, overlay: FadeOverlay) {
        self.calls.push(DeviceCall::ScreenFade(overlay));
    }

    fn draw_overlay(&mut self, material: MaterialId, _: &ViewSetup) {
        self.calls.push(DeviceCall::Overlay(material));
    }

    fn draw_full_screen_texture(&mut self, texture: TextureId, _: &ViewSetup) {
        self.calls.push(DeviceCall::FullScreenTexture(texture));
    }

    fn capture_frame(&mut self, texture: TextureId, _: &ViewSetup) {
        self.calls.push(DeviceCall::Capture(texture));
    }

    fn paint_hud(&mut self, _: &ViewSetup) {
        self.calls.push(DeviceCall::Hud);
    }
}
