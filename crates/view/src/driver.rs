//! Per-frame driver: camera setup, the 3D view tree, then the 2D pass.

use std::time::{Duration, Instant};

use glam::Vec3;
use leafview_alpha::FadeOverlay;
use leafview_common::{ClearFlags, ViewId, ViewSetup};

use crate::composer::{DrawnView, ViewComposer};
use crate::config::ViewConfig;
use crate::current::CurrentViewState;
use crate::device::RenderDevice;
use crate::scene::Scene;

/// Alpha per second of the white flash drawn over a frozen frame.
pub const FREEZE_FLASH_RATE: f32 = 340.0;

/// Eye placement a camera hook produces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    pub origin: Vec3,
    pub angles: Vec3,
    pub fov: f32,
    pub z_near: f32,
    pub z_far: f32,
}

/// A camera that can place the eye for a frame.
pub trait EyeCamera {
    /// Adjusts `view`, which starts out at the configured defaults.
    fn calc_view(&self, view: &mut CameraView);

    /// Weapon-specific view-model fov.
    fn viewmodel_fov_override(&self) -> Option<f32> {
        None
    }

    /// Scale on fade distances while zoomed; below one keeps props visible
    /// from further away.
    fn fov_distance_adjust_factor(&self) -> f32 {
        1.0
    }
}

/// Where the frame's main camera comes from.
#[derive(Clone, Copy)]
pub enum CameraSource<'a> {
    /// No local player; the camera sits at the origin.
    None,
    Player(&'a dyn EyeCamera),
    Spectator(&'a dyn EyeCamera),
}

/// Camera at a fixed placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedCamera {
    pub origin: Vec3,
    pub angles: Vec3,
    pub fov: Option<f32>,
    pub viewmodel_fov: Option<f32>,
    pub distance_adjust: f32,
}

impl FixedCamera {
    pub fn new(origin: Vec3, angles: Vec3) -> Self {
        Self {
            origin,
            angles,
            fov: None,
            viewmodel_fov: None,
            distance_adjust: 1.0,
        }
    }

    pub fn with_fov(mut self, fov: f32) -> Self {
        self.fov = Some(fov);
        self
    }

    pub fn with_distance_adjust(mut self, factor: f32) -> Self {
        self.distance_adjust = factor;
        self
    }
}

impl EyeCamera for FixedCamera {
    fn calc_view(&self, view: &mut CameraView) {
        view.origin = self.origin;
        view.angles = self.angles;
        if let Some(fov) = self.fov {
            view.fov = fov;
        }
    }

    fn viewmodel_fov_override(&self) -> Option<f32> {
        self.viewmodel_fov
    }

    fn fov_distance_adjust_factor(&self) -> f32 {
        self.distance_adjust
    }
}

/// Camera placement forced by an external tool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolOverride {
    pub origin: Vec3,
    pub angles: Vec3,
    pub fov: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct FreezeFrame {
    until: f32,
    take: bool,
    flash_until: f32,
}

/// Statistics from the last [`ViewRender::render`] call.
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    pub frame: u32,
    pub views: usize,
    pub world_list_builds: u64,
    pub renderables_list_builds: u64,
    pub frozen: bool,
    pub frame_time: Duration,
}

/// Frame time tracker for instrumentation.
#[derive(Debug)]
pub struct FrameTimer {
    history: Vec<Duration>,
    index: usize,
    filled: bool,
}

impl FrameTimer {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: vec![Duration::ZERO; capacity.max(1)],
            index: 0,
            filled: false,
        }
    }

    pub fn record(&mut self, dt: Duration) {
        self.history[self.index] = dt;
        self.index = (self.index + 1) % self.history.len();
        if self.index == 0 {
            self.filled = true;
        }
    }

    fn samples(&self) -> &[Duration] {
        if self.filled {
            &self.history
        } else {
            &self.history[..self.index]
        }
    }

    pub fn average(&self) -> Duration {
        let samples = self.samples();
        if samples.is_empty() {
            return Duration::ZERO;
        }
        samples.iter().sum::<Duration>() / samples.len() as u32
    }

    pub fn max(&self) -> Duration {
        self.samples().iter().copied().max().unwrap_or(Duration::ZERO)
    }
}

/// Owns the main view and drives one frame of rendering at a time.
#[derive(Debug)]
pub struct ViewRender {
    composer: ViewComposer,
    view: ViewSetup,
    fov_distance_adjust: f32,
    frame: u32,
    tool_override: Option<ToolOverride>,
    freeze: FreezeFrame,
    building_cubemaps: bool,
    prev_render_origin: Vec3,
    current_render_origin: Vec3,
    timer: FrameTimer,
    stats: FrameStats,
}

impl ViewRender {
    pub fn new(config: ViewConfig) -> Self {
        Self {
            composer: ViewComposer::new(config),
            view: ViewSetup::default(),
            fov_distance_adjust: 1.0,
            frame: 0,
            tool_override: None,
            freeze: FreezeFrame::default(),
            building_cubemaps: false,
            prev_render_origin: Vec3::ZERO,
            current_render_origin: Vec3::ZERO,
            timer: FrameTimer::new(64),
            stats: FrameStats::default(),
        }
    }

    pub fn config(&self) -> &ViewConfig {
        self.composer.config()
    }

    pub fn set_config(&mut self, config: ViewConfig) {
        self.composer.set_config(config);
    }

    pub fn composer(&self) -> &ViewComposer {
        &self.composer
    }

    pub fn view_setup(&self) -> &ViewSetup {
        &self.view
    }

    /// Fade-distance scale the local player's zoom asked for this frame.
    pub fn fov_distance_adjust(&self) -> f32 {
        self.fov_distance_adjust
    }

    /// Current-view accessors for subsystems drawing during the frame.
    pub fn current_view(&self) -> &CurrentViewState {
        self.composer.current()
    }

    pub fn drawn_views(&self) -> &[DrawnView] {
        self.composer.drawn_views()
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn timer(&self) -> &FrameTimer {
        &self.timer
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn set_viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.view.x = x;
        self.view.y = y;
        self.view.width = width;
        self.view.height = height;
    }

    pub fn set_tool_override(&mut self, tool: Option<ToolOverride>) {
        self.tool_override = tool;
    }

    pub fn set_building_cubemaps(&mut self, building: bool) {
        self.building_cubemaps = building;
    }

    pub fn prev_render_origin(&self) -> Vec3 {
        self.prev_render_origin
    }

    pub fn current_render_origin(&self) -> Vec3 {
        self.current_render_origin
    }

    /// Resolves the frame's camera into the main view.
    pub fn set_up_views(&mut self, source: CameraSource<'_>) {
        let config = self.composer.config();
        let mut camera = CameraView {
            origin: Vec3::ZERO,
            angles: Vec3::ZERO,
            fov: config.default_fov,
            z_near: config.z_near,
            z_far: config.z_far,
        };
        let mut viewmodel_fov = config.viewmodel_fov;
        let default_fov = config.default_fov;
        let mut distance_adjust = 1.0;

        self.composer.current_mut().allow_access(true);
        match source {
            CameraSource::None => {}
            CameraSource::Player(eye) => {
                eye.calc_view(&mut camera);
                if let Some(fov) = eye.viewmodel_fov_override() {
                    viewmodel_fov = fov;
                }
                distance_adjust = eye.fov_distance_adjust_factor();
            }
            CameraSource::Spectator(eye) => eye.calc_view(&mut camera),
        }
        if let Some(tool) = self.tool_override {
            camera.origin = tool.origin;
            camera.angles = tool.angles;
            camera.fov = tool.fov;
        }

        self.view.origin = camera.origin;
        self.view.angles = camera.angles;
        self.view.fov = camera.fov;
        self.view.z_near = camera.z_near;
        self.view.z_far = camera.z_far;
        self.view.fov_viewmodel = (viewmodel_fov - (default_fov - camera.fov)).max(0.001);
        self.fov_distance_adjust = distance_adjust;

        self.prev_render_origin = self.current_render_origin;
        self.current_render_origin = camera.origin;
        let view = self.view;
        let current = self.composer.current_mut();
        current.setup(&view, ViewId::Main);
        current.allow_access(false);
        tracing::trace!(origin = ?view.origin, fov = view.fov, fov_viewmodel = view.fov_viewmodel, "views set up");
    }

    /// Freezes the screen for `seconds`; zero unfreezes. Extending an active
    /// freeze keeps the captured frame.
    pub fn freeze_frame(&mut self, seconds: f32, now: f32) {
        if seconds == 0.0 {
            self.freeze.until = 0.0;
            self.freeze.take = false;
        } else if self.freeze.until > now {
            self.freeze.until += seconds;
        } else {
            self.freeze.until = now + seconds;
            self.freeze.take = true;
        }
    }

    /// White flash over the frozen frame, fading out at `until`.
    pub fn set_freeze_flash(&mut self, until: f32) {
        self.freeze.flash_until = until;
    }

    pub fn is_frozen(&self, now: f32) -> bool {
        !self.freeze.take && self.freeze.until > now
    }

    /// Renders one frame of the scene from the main view.
    pub fn render(&mut self, scene: &mut Scene, device: &mut dyn RenderDevice) -> &FrameStats {
        self.frame = self.frame.wrapping_add(1);
        let _span = tracing::info_span!("render_view", frame = self.frame).entered();
        let start = Instant::now();
        let view = self.view;
        let now = scene.time;
        let world_builds = self.composer.builder().world_list_builds();
        let renderables_builds = self.composer.builder().renderables_list_builds();

        self.composer.set_distance_scale(self.fov_distance_adjust);
        self.composer.begin_frame(self.frame, &view);
        let frozen = self.is_frozen(now);
        if frozen {
            self.draw_freeze_frame(scene, device, &view, now);
        } else {
            self.freeze.flash_until = 0.0;
            self.draw_main(scene, device, &view, now);
        }

        let current = self.composer.current_mut();
        current.allow_access(true);
        device.push_2d_view(&view);
        device.paint_hud(&view);
        device.pop_view();
        self.composer.end_frame();

        let elapsed = start.elapsed();
        self.timer.record(elapsed);
        let builder = self.composer.builder();
        self.stats = FrameStats {
            frame: self.frame,
            views: self.composer.drawn_views().len(),
            world_list_builds: builder.world_list_builds() - world_builds,
            renderables_list_builds: builder.renderables_list_builds() - renderables_builds,
            frozen,
            frame_time: elapsed,
        };
        tracing::debug!(
            frame = self.frame,
            views = self.stats.views,
            world_lists = self.stats.world_list_builds,
            frozen,
            "frame rendered"
        );
        &self.stats
    }

    fn draw_freeze_frame(&mut self, scene: &Scene, device: &mut dyn RenderDevice, view: &ViewSetup, now: f32) {
        device.push_3d_view(view, ViewId::Main, ClearFlags::empty(), None);
        device.draw_full_screen_texture(scene.targets.freeze_frame.texture, view);
        if self.freeze.flash_until >= now {
            let alpha = (FREEZE_FLASH_RATE * (self.freeze.flash_until - now)).clamp(0.0, 255.0) as u8;
            device.draw_screen_fade(FadeOverlay {
                color: [255, 255, 255],
                alpha,
                modulate: false,
            });
        }
        device.pop_view();
    }

    fn draw_main(&mut self, scene: &mut Scene, device: &mut dyn RenderDevice, view: &ViewSetup, now: f32) {
        device.push_3d_view(view, ViewId::Main, ClearFlags::empty(), None);

        let mut clear = ClearFlags::DEPTH | ClearFlags::STENCIL;
        self.composer.draw_skybox(scene, device, view, &mut clear);
        if !clear.contains(ClearFlags::COLOR) && scene.spatial.point_in_solid(view.origin) {
            clear |= ClearFlags::COLOR;
        }
        self.composer.draw_scene(scene, device, view, clear, ViewId::Main);

        if !self.building_cubemaps {
            device.draw_post_effects(view);
        }
        self.composer.draw_view_models(scene, device, view);

        if let Some(overlay) = self.composer.underwater_overlay() {
            device.draw_overlay(overlay, view);
        }
        if let Some(fade) = scene.screen_fade.update(now) {
            device.draw_screen_fade(fade);
        }
        if let Some(material) = scene.screen_overlay {
            device.draw_overlay(material, view);
        }
        if self.freeze.take {
            device.capture_frame(scene.targets.freeze_frame.texture, view);
            self.freeze.take = false;
        }

        device.pop_view();
    }
}

impl Default for ViewRender {
    fn default() -> Self {
        Self::new(ViewConfig::default())
    }
}
