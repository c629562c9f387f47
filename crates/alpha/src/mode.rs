use serde::{Deserialize, Serialize};

/// How a renderable blends with the framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RenderMode {
    #[default]
    Normal,
    TransColor,
    TransTexture,
    /// Additive, no depth test, fixed screen size.
    Glow,
    TransAlpha,
    TransAdd,
    /// Not drawn; drives environmental effects.
    Environmental,
    TransAddFrameBlend,
    TransAlphaAdd,
    /// Glow without the fixed screen size.
    WorldGlow,
    None,
}

/// Time-varying alpha effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RenderFx {
    #[default]
    None,
    PulseSlow,
    PulseFast,
    PulseSlowWide,
    PulseFastWide,
    FadeSlow,
    FadeFast,
    SolidSlow,
    SolidFast,
    StrobeSlow,
    StrobeFast,
    StrobeFaster,
    FlickerSlow,
    FlickerFast,
    NoDissipation,
    Distort,
    /// Distort plus a fade with distance along the view axis.
    Hologram,
    Explode,
    GlowShell,
    ClampMinScale,
    EnvRain,
    EnvSnow,
    Spotlight,
    PulseFastWider,
    FadeOut,
    FadeIn,
}

impl RenderFx {
    /// Fixed ramp length the effect forces, if any.
    pub fn locked_duration(self) -> Option<f32> {
        match self {
            RenderFx::FadeSlow | RenderFx::SolidSlow => Some(4.0),
            RenderFx::FadeFast | RenderFx::SolidFast => Some(1.0),
            _ => None,
        }
    }

    /// Effects that stamp "now" as the start when none is given.
    pub fn stamps_start_time(self) -> bool {
        matches!(
            self,
            RenderFx::FadeIn
                | RenderFx::FadeOut
                | RenderFx::FadeSlow
                | RenderFx::SolidSlow
                | RenderFx::FadeFast
                | RenderFx::SolidFast
        )
    }
}

/// Which point of the bounds distance fade measures from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DistanceFadeMode {
    #[default]
    Center,
    /// Nearest point of the bounding box.
    Nearest,
}
