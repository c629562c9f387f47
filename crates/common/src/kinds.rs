use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// What kind of model a renderable draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelType {
    /// Sprites, particles and anything without a studio or brush model.
    Entity,
    StudioModel,
    StaticProp,
    Brush,
}

impl ModelType {
    /// Receiver kind reported to the shadow manager; plain entities receive nothing.
    pub fn shadow_receiver(self) -> Option<ShadowReceiver> {
        match self {
            ModelType::Entity => None,
            ModelType::StudioModel => Some(ShadowReceiver::StudioModel),
            ModelType::StaticProp => Some(ShadowReceiver::StaticProp),
            ModelType::Brush => Some(ShadowReceiver::BrushModel),
        }
    }
}

/// Material translucency classification of a renderable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TranslucencyType {
    Opaque,
    Translucent,
    /// Drawn once opaque at full alpha and again in the translucent pass.
    TwoPass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShadowReceiver {
    BrushModel,
    StaticProp,
    StudioModel,
}

bitflags! {
    /// Kind of projected texture a shadow caster produces.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShadowFlags: u16 {
        const SHADOW = 1 << 0;
        const FLASHLIGHT = 1 << 1;
        const SIMPLE_PROJECTION = 1 << 2;
        const PROJECTED_TEXTURE_MASK = Self::SHADOW.bits() | Self::FLASHLIGHT.bits() | Self::SIMPLE_PROJECTION.bits();
    }
}

bitflags! {
    /// Flags passed to [`crate::Renderable::draw_model`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DrawModelFlags: u32 {
        const RENDER = 1 << 0;
        const TRANSLUCENT = 1 << 1;
        const TWO_PASS = 1 << 2;
        const SHADOW_DEPTH = 1 << 3;
        const SSAO_DEPTH = 1 << 4;
        const IGNORE_Z = 1 << 5;
        const VIEW_MODEL = 1 << 6;
    }
}

bitflags! {
    /// What a view draws and how it clips against water.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DrawFlags: u32 {
        const RENDER_REFRACTION = 1 << 0;
        const RENDER_REFLECTION = 1 << 1;
        const CLIP_Z = 1 << 2;
        /// Clip away geometry below the clip height instead of above.
        const CLIP_BELOW = 1 << 3;
        const RENDER_UNDERWATER = 1 << 4;
        const RENDER_ABOVEWATER = 1 << 5;
        const RENDER_WATER = 1 << 6;
        const SSAO_DEPTH_PASS = 1 << 7;
        const DRAWSKYBOX = 1 << 8;
        /// Nudge the water clip height up to hide the seam.
        const FUDGE_UP = 1 << 9;
        const DRAW_ENTITIES = 1 << 10;
        const SKIP_WORLD = 1 << 11;
        const SKIP_WORLD_DECALS_AND_OVERLAYS = 1 << 12;
        const CLIP_SKYBOX = 1 << 13;
        const SHADOW_DEPTH_MAP = 1 << 14;
    }
}

bitflags! {
    /// Buffers a view clears before drawing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClearFlags: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const FULL_TARGET = 1 << 2;
        const NO_DRAW = 1 << 3;
        const OBEY_STENCIL = 1 << 4;
        const STENCIL = 1 << 5;
    }
}

/// Which kind of view is currently being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewId {
    None,
    Main,
    Skybox3d,
    Monitor,
    Reflection,
    Refraction,
    IntroPlayer,
    IntroCamera,
    ShadowDepthTexture,
    Ssao,
}

/// Size class of an opaque renderable, by largest world-space dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SizeBucket {
    Huge,
    Medium,
    Small,
    Tiny,
}

impl SizeBucket {
    pub const ALL: [SizeBucket; 4] = [
        SizeBucket::Huge,
        SizeBucket::Medium,
        SizeBucket::Small,
        SizeBucket::Tiny,
    ];

    /// Lower bounds (inclusive) of huge, medium and small.
    pub const THRESHOLDS: [f32; 3] = [80.0, 30.0, 10.0];

    pub fn from_dimension(dimension: f32) -> Self {
        let [huge, medium, small] = Self::THRESHOLDS;
        if dimension >= huge {
            SizeBucket::Huge
        } else if dimension >= medium {
            SizeBucket::Medium
        } else if dimension >= small {
            SizeBucket::Small
        } else {
            SizeBucket::Tiny
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Render-list bucket a renderable is routed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineRenderGroup {
    OpaqueStatic(SizeBucket),
    OpaqueEntity(SizeBucket),
    OpaqueBrush,
    TranslucentEntity,
}

impl EngineRenderGroup {
    pub fn is_opaque(self) -> bool {
        !matches!(self, EngineRenderGroup::TranslucentEntity)
    }

    /// Opaque group for a model type before any size bucketing.
    pub fn opaque_for(model: ModelType) -> Self {
        match model {
            ModelType::Entity | ModelType::StudioModel => {
                EngineRenderGroup::OpaqueEntity(SizeBucket::Tiny)
            }
            ModelType::StaticProp => EngineRenderGroup::OpaqueStatic(SizeBucket::Tiny),
            ModelType::Brush => EngineRenderGroup::OpaqueBrush,
        }
    }

    /// Same group family moved into another size bucket; brush and translucent are unbucketed.
    pub fn with_bucket(self, bucket: SizeBucket) -> Self {
        match self {
            EngineRenderGroup::OpaqueStatic(_) => EngineRenderGroup::OpaqueStatic(bucket),
            EngineRenderGroup::OpaqueEntity(_) => EngineRenderGroup::OpaqueEntity(bucket),
            other => other,
        }
    }
}

/// Coarse client-side group, mostly for debugging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientRenderGroup {
    Opaque,
    Translucent,
    TranslucentIgnoreZ,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_boundaries_are_inclusive_above() {
        assert_eq!(SizeBucket::from_dimension(80.0), SizeBucket::Huge);
        assert_eq!(SizeBucket::from_dimension(79.99), SizeBucket::Medium);
        assert_eq!(SizeBucket::from_dimension(30.0), SizeBucket::Medium);
        assert_eq!(SizeBucket::from_dimension(29.9), SizeBucket::Small);
        assert_eq!(SizeBucket::from_dimension(2.0), SizeBucket::Tiny);
        assert_eq!(SizeBucket::from_dimension(500.0), SizeBucket::Huge);
    }

    #[test]
    fn opaque_group_by_model_type() {
        assert_eq!(
            EngineRenderGroup::opaque_for(ModelType::StudioModel),
            EngineRenderGroup::OpaqueEntity(SizeBucket::Tiny)
        );
        assert_eq!(
            EngineRenderGroup::opaque_for(ModelType::StaticProp),
            EngineRenderGroup::OpaqueStatic(SizeBucket::Tiny)
        );
        assert_eq!(
            EngineRenderGroup::OpaqueBrush.with_bucket(SizeBucket::Huge),
            EngineRenderGroup::OpaqueBrush
        );
    }

    #[test]
    fn only_modelled_types_receive_shadows() {
        assert_eq!(ModelType::Entity.shadow_receiver(), None);
        assert_eq!(
            ModelType::Brush.shadow_receiver(),
            Some(ShadowReceiver::BrushModel)
        );
    }
}
