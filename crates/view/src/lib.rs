//! View: composes the frame's nested 3D views and drives one frame at a time.
//!
//! # Invariants
//! - Every device view push is matched by a pop before the frame ends.
//! - A child view (reflection, refraction, glass, skybox, shadow depth)
//!   finishes drawing before its parent issues further draws.
//! - The current view is restored to the parent after each child view.
//! - Cached world lists never outlive the frame that built them.

mod composer;
mod config;
mod current;
mod device;
mod driver;
mod scene;
mod view;
mod water;

#[cfg(test)]
mod test_support;

pub use composer::{DrawnView, ViewComposer};
pub use config::ViewConfig;
pub use current::{CurrentView, CurrentViewState};
pub use device::{DeviceCall, HeightClipMode, RecordingDevice, RenderDevice, RenderTarget};
pub use driver::{
    CameraSource, CameraView, EyeCamera, FREEZE_FLASH_RATE, FixedCamera, FrameStats, FrameTimer, ToolOverride,
    ViewRender,
};
pub use scene::{GlassSurface, RenderTargets, Scene, SkyParams, SkyboxVisibility};
pub use view::{
    GLASS_CLIP_OFFSET, ShadowDepthPass, View3d, ViewKind, WATER_CLIP_SPREAD, fit_to_target, glass_reflection_setup,
    reflective_glass_clip, refractive_glass_clip, water_reflection_setup,
};
pub use water::{
    WATER_PLANE_FUDGE, WaterEyeAdjust, WaterRenderInfo, calc_water_eye_adjustments, determine_water_render_info,
    does_view_plane_intersect_water,
};

pub fn crate_info() -> &'static str {
    "leafview-view v0.1.0"
}
