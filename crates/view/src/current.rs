//! The camera of the view being drawn, readable by other subsystems.

use glam::{Mat4, Vec3};
use leafview_common::{CameraBasis, ViewId, ViewSetup};

/// Camera parameters of one view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentView {
    pub origin: Vec3,
    pub angles: Vec3,
    pub basis: CameraBasis,
    pub id: ViewId,
    pub world_to_view: Mat4,
}

impl CurrentView {
    pub fn new(view: &ViewSetup, id: ViewId) -> Self {
        Self {
            origin: view.origin,
            angles: view.angles,
            basis: view.basis(),
            id,
            world_to_view: view.view_matrix(),
        }
    }
}

/// Current-view state with a stack so a child view restores its parent on pop.
///
/// Reads are only meaningful while access is allowed; reading outside that
/// window logs a warning and still returns the last value.
#[derive(Debug, Default)]
pub struct CurrentViewState {
    current: Option<CurrentView>,
    stack: Vec<Option<CurrentView>>,
    access: bool,
}

impl CurrentViewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `view` current and allows access.
    pub fn setup(&mut self, view: &ViewSetup, id: ViewId) {
        self.current = Some(CurrentView::new(view, id));
        self.access = true;
    }

    /// Saves the current view, then makes `view` current.
    pub fn push(&mut self, view: &ViewSetup, id: ViewId) {
        self.stack.push(self.current);
        self.setup(view, id);
        tracing::trace!(depth = self.stack.len(), ?id, "current view pushed");
    }

    /// Restores the view saved by the matching [`push`](Self::push).
    pub fn pop(&mut self) {
        match self.stack.pop() {
            Some(previous) => self.current = previous,
            None => tracing::warn!("current view popped with an empty stack"),
        }
    }

    /// Ends the frame's view; access is disallowed until the next setup.
    pub fn finish(&mut self) {
        self.access = false;
    }

    pub fn allow_access(&mut self, allow: bool) {
        self.access = allow;
    }

    pub fn is_access_allowed(&self) -> bool {
        self.access
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn get(&self) -> Option<&CurrentView> {
        if !self.access {
            tracing::warn!("current view read while access is disallowed");
        }
        self.current.as_ref()
    }

    pub fn origin(&self) -> Vec3 {
        self.get().map_or(Vec3::ZERO, |v| v.origin)
    }

    pub fn angles(&self) -> Vec3 {
        self.get().map_or(Vec3::ZERO, |v| v.angles)
    }

    pub fn forward(&self) -> Vec3 {
        self.get().map_or(Vec3::X, |v| v.basis.forward)
    }

    pub fn right(&self) -> Vec3 {
        self.get().map_or(Vec3::NEG_Y, |v| v.basis.right)
    }

    pub fn up(&self) -> Vec3 {
        self.get().map_or(Vec3::Z, |v| v.basis.up)
    }

    pub fn world_to_view(&self) -> Mat4 {
        self.get().map_or(Mat4::IDENTITY, |v| v.world_to_view)
    }

    pub fn view_id(&self) -> ViewId {
        self.get().map_or(ViewId::None, |v| v.id)
    }

    /// True for the primary view.
    pub fn is_main_view(&self) -> bool {
        self.view_id() == ViewId::Main
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn view_at(x: f32) -> ViewSetup {
        ViewSetup {
            origin: Vec3::new(x, 0.0, 0.0),
            ..ViewSetup::default()
        }
    }

    #[test]
    fn pop_restores_parent_view() {
        let mut state = CurrentViewState::new();
        state.setup(&view_at(1.0), ViewId::Main);
        state.push(&view_at(2.0), ViewId::Reflection);
        assert_eq!(state.view_id(), ViewId::Reflection);
        assert_eq!(state.depth(), 1);

        state.pop();
        assert_eq!(state.view_id(), ViewId::Main);
        assert_abs_diff_eq!(state.origin().x, 1.0);
        assert_eq!(state.depth(), 0);
    }

    #[test]
    fn nested_pushes_unwind_in_order() {
        let mut state = CurrentViewState::new();
        state.setup(&view_at(0.0), ViewId::Main);
        state.push(&view_at(1.0), ViewId::Refraction);
        state.push(&view_at(2.0), ViewId::ShadowDepthTexture);
        state.pop();
        assert_eq!(state.view_id(), ViewId::Refraction);
        state.pop();
        assert_eq!(state.view_id(), ViewId::Main);
    }

    #[test]
    fn empty_pop_keeps_current() {
        let mut state = CurrentViewState::new();
        state.setup(&view_at(3.0), ViewId::Main);
        state.pop();
        assert_eq!(state.view_id(), ViewId::Main);
    }

    #[test]
    fn finish_disallows_access_but_keeps_values() {
        let mut state = CurrentViewState::new();
        assert!(!state.is_access_allowed());
        state.setup(&view_at(4.0), ViewId::Main);
        assert!(state.is_access_allowed());
        state.finish();
        assert!(!state.is_access_allowed());
        assert_abs_diff_eq!(state.origin().x, 4.0);
    }

    #[test]
    fn basis_follows_angles() {
        let mut state = CurrentViewState::new();
        let view = ViewSetup {
            angles: Vec3::new(0.0, 90.0, 0.0),
            ..ViewSetup::default()
        };
        state.setup(&view, ViewId::Main);
        let forward = state.forward();
        assert_abs_diff_eq!(forward.x, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(forward.y, 1.0, epsilon = 1e-5);
        assert!(state.is_main_view());
    }

    #[test]
    fn unset_state_reads_defaults() {
        let state = CurrentViewState::new();
        assert_eq!(state.view_id(), ViewId::None);
        assert_eq!(state.up(), Vec3::Z);
    }
}
