//! Alpha: per-renderable render mode, render-fx and fade state, and the
//! full-screen fade overlay.
//!
//! # Invariants
//! - Alpha evaluation is a pure function of the record and an [`AlphaContext`];
//!   equal inputs give equal bytes on any thread.
//! - Effect math runs in `i32` and clamps to `0..=255`; it never wraps.
//! - Destroying the last record returns the pool to its freshly created state.

mod mode;
mod pool;
mod property;
mod screen;

pub use mode::{DistanceFadeMode, RenderFx, RenderMode};
pub use pool::AlphaPropertyPool;
pub use property::{AlphaContext, AlphaProperty, remap_clamped};
pub use screen::{FadeOverlay, ScreenFade, ScreenFadeFlags};

pub fn crate_info() -> &'static str {
    "leafview-alpha v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("alpha"));
    }
}
