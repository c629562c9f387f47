use glam::Vec3;
use leafview_common::{FrameRng, Renderable, ShadowId};
use serde::{Deserialize, Serialize};

use crate::mode::{DistanceFadeMode, RenderFx, RenderMode};

/// Phase multiplier that decorrelates instances sharing an effect.
const DESYNC_PHASE: f32 = 363.0;

/// Alpha of the hologram effect before distance falloff.
const HOLOGRAM_ALPHA: f32 = 180.0;

/// Per-evaluation inputs: scene time and the current view axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlphaContext {
    /// Continuous scene time in seconds.
    pub time: f32,
    pub view_origin: Vec3,
    pub view_forward: Vec3,
    /// Seed for hologram jitter; vary it per frame.
    pub jitter_seed: u64,
}

impl Default for AlphaContext {
    fn default() -> Self {
        Self {
            time: 0.0,
            view_origin: Vec3::ZERO,
            view_forward: Vec3::X,
            jitter_seed: 0,
        }
    }
}

/// Alpha, fade and render-effect state of one renderable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlphaProperty {
    render_mode: RenderMode,
    render_fx: RenderFx,
    alpha_modulation: u8,
    fx_start_time: f32,
    fx_duration: f32,
    dist_fade_start: u16,
    dist_fade_end: u16,
    fade_scale: f32,
    desync_offset: u16,
    alpha_override: bool,
    shadow_alpha_override: bool,
    distance_fade_mode: DistanceFadeMode,
    always_ignore_z: bool,
    shadow: Option<ShadowId>,
}

impl Default for AlphaProperty {
    fn default() -> Self {
        Self {
            render_mode: RenderMode::Normal,
            render_fx: RenderFx::None,
            alpha_modulation: 255,
            fx_start_time: 0.0,
            fx_duration: 0.0,
            dist_fade_start: 0,
            dist_fade_end: 0,
            fade_scale: 0.0,
            desync_offset: 0,
            alpha_override: false,
            shadow_alpha_override: false,
            distance_fade_mode: DistanceFadeMode::Center,
            always_ignore_z: false,
            shadow: None,
        }
    }
}

impl AlphaProperty {
    /// Records an effect. Fade and solid effects stamp `now` when `start_time`
    /// is `None`; slow and fast variants lock their duration to 4s and 1s.
    pub fn set_render_fx(
        &mut self,
        fx: RenderFx,
        mode: RenderMode,
        start_time: Option<f32>,
        duration: f32,
        now: f32,
    ) {
        let changed = self.render_fx != fx;
        let start = match start_time {
            Some(t) => t,
            None if fx.stamps_start_time() => now,
            None => f32::MAX,
        };
        let duration = fx.locked_duration().unwrap_or(duration);

        self.render_mode = mode;
        self.render_fx = fx;
        if changed || start_time.is_some() {
            self.fx_start_time = start;
            self.fx_duration = duration;
        }
    }

    /// Distance fade in world units; a negative start counts back from `end`.
    pub fn set_fade(&mut self, global_fade_scale: f32, start: f32, end: f32) {
        let (mut start, end) = if start > end { (end, start) } else { (start, end) };
        if start < 0.0 {
            start = (end + start).max(0.0);
        }
        self.dist_fade_start = start.clamp(0.0, u16::MAX as f32) as u16;
        self.dist_fade_end = end.clamp(0.0, u16::MAX as f32) as u16;
        self.fade_scale = global_fade_scale;
    }

    pub fn set_alpha_modulation(&mut self, alpha: u8) {
        self.alpha_modulation = alpha;
    }

    pub fn set_desync_offset(&mut self, offset: u16) {
        self.desync_offset = offset;
    }

    pub fn set_distance_fade_mode(&mut self, mode: DistanceFadeMode) {
        self.distance_fade_mode = mode;
    }

    pub fn enable_alpha_modulation_override(&mut self, enable: bool) {
        self.alpha_override = enable;
    }

    pub fn enable_shadow_alpha_modulation_override(&mut self, enable: bool) {
        self.shadow_alpha_override = enable;
    }

    pub fn set_ignore_z(&mut self, always: bool) {
        self.always_ignore_z = always;
    }

    pub fn set_shadow(&mut self, shadow: Option<ShadowId>) {
        self.shadow = shadow;
    }

    pub fn render_mode(&self) -> RenderMode {
        self.render_mode
    }

    pub fn render_fx(&self) -> RenderFx {
        self.render_fx
    }

    pub fn alpha_modulation(&self) -> u8 {
        self.alpha_modulation
    }

    pub fn fx_start_time(&self) -> f32 {
        self.fx_start_time
    }

    pub fn fx_duration(&self) -> f32 {
        self.fx_duration
    }

    pub fn dist_fade_start(&self) -> u16 {
        self.dist_fade_start
    }

    pub fn dist_fade_end(&self) -> u16 {
        self.dist_fade_end
    }

    pub fn fade_scale(&self) -> f32 {
        self.fade_scale
    }

    pub fn desync_offset(&self) -> u16 {
        self.desync_offset
    }

    pub fn distance_fade_mode(&self) -> DistanceFadeMode {
        self.distance_fade_mode
    }

    pub fn shadow(&self) -> Option<ShadowId> {
        self.shadow
    }

    /// Glow modes and the always-ignore flag skip the depth test.
    pub fn ignores_z_buffer(&self) -> bool {
        matches!(self.render_mode, RenderMode::Glow | RenderMode::WorldGlow) || self.always_ignore_z
    }

    /// Effect alpha at `ctx.time`, independent of the owner's overrides.
    /// `owner_origin` only matters for hologram and distort.
    pub fn compute_alpha_blend(&self, ctx: &AlphaContext, owner_origin: Vec3) -> u8 {
        if matches!(self.render_mode, RenderMode::None | RenderMode::Environmental) {
            return 0;
        }

        let t = ctx.time;
        let offset = self.desync_offset as f32 * DESYNC_PHASE;
        let modulation = self.alpha_modulation as f32;
        let strobe = |wave: f32| if wave < 0.0 { 0 } else { self.alpha_modulation as i32 };

        let blend: i32 = match self.render_fx {
            RenderFx::PulseSlowWide => (modulation + 64.0 * (t * 2.0 + offset).sin()) as i32,
            RenderFx::PulseFastWide => (modulation + 64.0 * (t * 8.0 + offset).sin()) as i32,
            RenderFx::PulseFastWider => (255.0 * (t * 12.0 + offset).sin().abs()) as i32,
            RenderFx::PulseSlow => (modulation + 16.0 * (t * 2.0 + offset).sin()) as i32,
            RenderFx::PulseFast => (modulation + 16.0 * (t * 8.0 + offset).sin()) as i32,
            RenderFx::FadeOut | RenderFx::FadeFast | RenderFx::FadeSlow => {
                let elapsed = t - self.fx_start_time;
                remap_clamped(elapsed, 0.0, self.fx_duration, modulation, 0.0).clamp(0.0, 255.0) as i32
            }
            RenderFx::FadeIn | RenderFx::SolidFast | RenderFx::SolidSlow => {
                let elapsed = t - self.fx_start_time;
                remap_clamped(elapsed, 0.0, self.fx_duration, 0.0, modulation).clamp(0.0, 255.0) as i32
            }
            RenderFx::StrobeSlow => strobe(20.0 * (t * 4.0 + offset).sin()),
            RenderFx::StrobeFast => strobe(20.0 * (t * 16.0 + offset).sin()),
            RenderFx::StrobeFaster => strobe(20.0 * (t * 36.0 + offset).sin()),
            RenderFx::FlickerSlow => strobe(20.0 * ((t * 2.0).sin() + (t * 17.0 + offset).sin())),
            RenderFx::FlickerFast => strobe(20.0 * ((t * 16.0).sin() + (t * 23.0 + offset).sin())),
            RenderFx::Hologram | RenderFx::Distort => {
                let dist = if self.render_fx == RenderFx::Distort {
                    1.0
                } else {
                    (owner_origin - ctx.view_origin).dot(ctx.view_forward)
                };
                if dist <= 0.0 {
                    0
                } else {
                    let base = if dist <= 100.0 {
                        HOLOGRAM_ALPHA as i32
                    } else {
                        ((1.0 - (dist - 100.0) / 400.0) * HOLOGRAM_ALPHA) as i32
                    };
                    base + self.jitter(ctx.jitter_seed)
                }
            }
            _ => {
                if self.render_mode == RenderMode::Normal {
                    255
                } else {
                    self.alpha_modulation as i32
                }
            }
        };

        blend.clamp(0, 255) as u8
    }

    /// Effect alpha, then the owner's override for the requested context.
    pub fn compute_render_alpha(
        &self,
        shadow: bool,
        ctx: &AlphaContext,
        owner: Option<&dyn Renderable>,
    ) -> u8 {
        let origin = owner.map_or(Vec3::ZERO, |o| o.render_origin());
        let alpha = self.compute_alpha_blend(ctx, origin);
        match owner {
            Some(o) if shadow && self.shadow_alpha_override => o.override_shadow_alpha_modulation(alpha),
            Some(o) if !shadow && self.alpha_override => o.override_alpha_modulation(alpha),
            _ => alpha,
        }
    }

    fn jitter(&self, seed: u64) -> i32 {
        let mut rng = FrameRng::new(seed ^ (self.desync_offset as u64).wrapping_mul(0x2545_f491_4f6c_dd1d));
        rng.range_i32(-32, 31)
    }
}

/// Linear remap of `val` from `[a, b]` onto `[c, d]`, clamped to the ends.
pub fn remap_clamped(val: f32, a: f32, b: f32, c: f32, d: f32) -> f32 {
    if a == b {
        return if val >= b { d } else { c };
    }
    let t = ((val - a) / (b - a)).clamp(0.0, 1.0);
    c + (d - c) * t
}
