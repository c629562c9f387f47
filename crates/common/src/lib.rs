//! Common: math, handles, collaborator contracts and configuration shared by
//! every leafview crate.
//!
//! # Invariants
//! - World space is x forward, y left, z up; angles are (pitch, yaw, roll) degrees.
//! - Handles are generational: a removed handle never aliases a live slot.
//! - The pipeline never owns a renderable; it only holds weak references.

mod config;
mod handles;
mod kinds;
mod rng;
mod services;
mod types;
mod view;

pub use config::{ConfigError, RenderConfig};
pub use handles::{AlphaHandle, LeafIndex, MaterialId, RenderHandle, ShadowHandle, ShadowId, TextureId};
pub use kinds::{
    ClearFlags, ClientRenderGroup, DrawFlags, DrawModelFlags, EngineRenderGroup, ModelType, ShadowFlags, ShadowReceiver,
    SizeBucket, TranslucencyType, ViewId,
};
pub use rng::FrameRng;
pub use services::{
    BuiltWorldLists, DetailObjectSystem, DetailRenderable, NoDetailObjects, NullShadowManager,
    Renderable, ShadowDepthRequest, ShadowManager, SpatialQuery, VisibleFogVolume, WaterMaterial,
    WorldListId, WorldListRequest,
};
pub use types::{Aabb, CameraBasis, Plane, vector_angles};
pub use view::{Frustum, OffCenterRect, OrthoRect, ViewSetup, vertical_fov};

pub fn crate_info() -> &'static str {
    "leafview-common v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("common"));
    }
}
