//! Leaf: which BSP leaves each renderable and projected shadow occupies, and
//! the first stages of turning visible leaves into a renderable list.
//!
//! # Invariants
//! - A renderable is linked to a leaf at most once, and every link is
//!   reachable from both the leaf and the renderable side.
//! - A shadow reaches a receiver through a shared leaf regardless of whether
//!   the shadow or the renderable was placed first.
//! - Dirty renderables are re-placed only inside [`LeafSystem::recompute_leaves`];
//!   threaded placement produces the same links as the serial path.
//! - List filters never leave a dropped renderable marked as drawn.

mod deferred;
mod extract;
mod grid;
mod info;
mod links;
mod registry;
mod shadow;

#[cfg(test)]
mod test_support;

pub use deferred::{DeferredInserts, PendingInsert};
pub use extract::{BuildEntry, BuildItem, ListItem};
pub use grid::{GridLeaves, GridWater};
pub use info::{RenderFlags, RenderableDesc, RenderableInfo};
pub use links::LinkSet;
pub use registry::{
    BLOAT_GRANULARITY, LeafConfig, LeafStats, LeafSubsystem, LeafSystem, RecomputeStats, bloated_bounds,
};
pub use shadow::ShadowInfo;

pub fn crate_info() -> &'static str {
    "leafview-leaf v0.1.0"
}
