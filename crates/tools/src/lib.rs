//! Developer tooling: read-only scene, list and view-tree inspection.
//!
//! # Invariants
//! - Inspection never mutates the scene or its lists.

mod inspector;

pub use inspector::{ListSummary, RenderableSummary, SceneInspector, SceneSummary};

pub fn crate_info() -> &'static str {
    "leafview-tools v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("tools"));
    }
}
