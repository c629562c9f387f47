//! Render: turns a view's visible leaves into sorted per-group draw lists.
//!
//! # Invariants
//! - Every renderable that survives a build was stamped as drawn this frame;
//!   every renderable a filter drops has its stamp undone.
//! - A renderable appears at most once per list build, except two-pass
//!   renderables, which appear once opaque and once translucent.
//! - Translucent entries are depth-sorted within each leaf span, and leaf
//!   spans follow the world list's front-to-back order.
//! - Parallel alpha evaluation produces the same alphas as the serial path.

mod builder;
mod fade;
mod list;
mod world_list;

#[cfg(test)]
mod test_support;

pub use builder::{
    BuildParams, BuildStats, BuilderConfig, RenderListBuilder, SceneRefs, ViewModelLists,
    collate_view_model_renderables,
};
pub use fade::{
    SCREEN_SIZE_SCALE, ScreenFadeRange, ScreenSizeInfo, combine_alpha, distance_fade_factor, fade_distance_sq,
    is_beyond_fade_end, screen_fade_factor, screen_size,
};
pub use list::{GROUP_COUNT, GroupHighWater, RenderListEntry, RenderablesList, group_index, sort_by_depth, view_depth};
pub use world_list::{CachedLists, WorldListCache, WorldListInfo, WorldListKey, WorldListPool};

pub fn crate_info() -> &'static str {
    "leafview-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
