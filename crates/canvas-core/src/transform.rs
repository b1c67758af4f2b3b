//! Pointer-driven move/resize state machine.
//!
//! ```text
//!   Idle --pointer_down(target), not generating--> Dragging(target)
//!   Dragging --pointer_move--> Dragging        (GeometryModel::update)
//!   Dragging --pointer_up | capture_lost--> Idle
//! ```
//!
//! Every move is computed from the box and pointer position captured at
//! pointer-down, never incrementally, so returning the pointer to where the
//! drag started restores the original box exactly.

use crate::anchor::{AnchorKind, CursorAffordance, DragTarget, sanitize_scale};
use crate::geometry::{BoxPatch, GeometryModel, MIN_DIMENSION, SelectionBox};

/// Drag phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformPhase {
    #[default]
    Idle,
    Dragging,
}

/// Drag bookkeeping. All optional fields are `Some` exactly while dragging.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransformState {
    pub phase: TransformPhase,
    pub active_target: Option<DragTarget>,
    pub origin_pointer: Option<(f32, f32)>,
    pub origin_box: Option<SelectionBox>,
}

impl TransformState {
    fn dragging(target: DragTarget, pointer: (f32, f32), origin: SelectionBox) -> Self {
        Self {
            phase: TransformPhase::Dragging,
            active_target: Some(target),
            origin_pointer: Some(pointer),
            origin_box: Some(origin),
        }
    }
}

/// Move/resize controller for the local selection box.
#[derive(Debug, Clone)]
pub struct TransformController {
    state: TransformState,
    hovered: Option<DragTarget>,
    scale: f32,
}

impl Default for TransformController {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformController {
    pub fn new() -> Self {
        Self {
            state: TransformState::default(),
            hovered: None,
            scale: 1.0,
        }
    }

    pub fn state(&self) -> &TransformState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        self.state.phase == TransformPhase::Dragging
    }

    /// Current zoom factor of the canvas view.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.scale = sanitize_scale(scale);
    }

    /// Pointer entered an anchor or the box body. Cursor only; a generating
    /// box is not interactive, so nothing is recorded.
    pub fn pointer_enter(&mut self, target: DragTarget, generating: bool) -> CursorAffordance {
        if generating {
            return CursorAffordance::Default;
        }
        self.hovered = Some(target);
        self.cursor()
    }

    /// Pointer left `target`. While dragging the drag cursor stays.
    pub fn pointer_leave(&mut self, target: DragTarget) -> CursorAffordance {
        if self.hovered == Some(target) {
            self.hovered = None;
        }
        self.cursor()
    }

    pub fn cursor(&self) -> CursorAffordance {
        self.state
            .active_target
            .or(self.hovered)
            .map_or(CursorAffordance::Default, |target| target.cursor())
    }

    /// Start a drag. Refused while the box is generating or a drag is
    /// already running.
    pub fn pointer_down(
        &mut self,
        target: DragTarget,
        pointer: (f32, f32),
        model: &GeometryModel,
        generating: bool,
    ) -> bool {
        if generating {
            tracing::debug!(?target, "drag refused: box is generating");
            return false;
        }
        if self.is_dragging() {
            return false;
        }

        self.state = TransformState::dragging(target, pointer, model.get());
        tracing::trace!(?target, ?pointer, "drag started");
        true
    }

    /// Apply the drag for the current pointer position. Returns the updated
    /// box, or `None` when idle or when the pointer position is not finite
    /// (the last good box stays committed).
    pub fn pointer_move(
        &mut self,
        pointer: (f32, f32),
        model: &mut GeometryModel,
    ) -> Option<SelectionBox> {
        let TransformState {
            phase: TransformPhase::Dragging,
            active_target: Some(target),
            origin_pointer: Some(origin_pointer),
            origin_box: Some(origin_box),
        } = self.state
        else {
            return None;
        };
        if !(pointer.0.is_finite() && pointer.1.is_finite()) {
            tracing::debug!(?pointer, "ignoring non-finite pointer position");
            return None;
        }

        let delta = (
            (pointer.0 - origin_pointer.0) / self.scale,
            (pointer.1 - origin_pointer.1) / self.scale,
        );
        let patch = match target {
            DragTarget::Body => {
                BoxPatch::position(origin_box.x + delta.0, origin_box.y + delta.1)
            }
            DragTarget::Anchor(anchor) => resize_patch(anchor, origin_box, delta),
        };
        Some(model.update(patch))
    }

    /// Finish the drag; the box keeps its last computed value.
    pub fn pointer_up(&mut self, model: &GeometryModel) -> Option<SelectionBox> {
        if !self.is_dragging() {
            return None;
        }
        self.state = TransformState::default();
        let committed = model.get();
        tracing::trace!(?committed, "drag finished");
        Some(committed)
    }

    /// Pointer capture lost (window blur etc.). Same as releasing the button.
    pub fn capture_lost(&mut self, model: &GeometryModel) -> Option<SelectionBox> {
        self.pointer_up(model)
    }

    /// `"W x H"` text shown next to the box while transforming.
    pub fn dimension_label(&self, selection: &SelectionBox) -> Option<String> {
        self.is_dragging()
            .then(|| format!("{} x {}", selection.width.round(), selection.height.round()))
    }
}

/// Anchor-specific resize relative to the box at drag start. Each axis is
/// handled on its own; a left/top drag moves the position and grows the
/// size by the negated delta so the far edge stays put.
pub fn resize_patch(anchor: AnchorKind, origin: SelectionBox, delta: (f32, f32)) -> BoxPatch {
    let mut patch = BoxPatch::default();

    if anchor.moves_right() {
        patch.width = Some((origin.width + delta.0).max(MIN_DIMENSION));
    } else if anchor.moves_left() {
        let width = origin.width - delta.0;
        if width < MIN_DIMENSION {
            patch.x = Some(origin.x + (origin.width - MIN_DIMENSION));
            patch.width = Some(MIN_DIMENSION);
        } else {
            patch.x = Some(origin.x + delta.0);
            patch.width = Some(width);
        }
    }

    if anchor.moves_bottom() {
        patch.height = Some((origin.height + delta.1).max(MIN_DIMENSION));
    } else if anchor.moves_top() {
        let height = origin.height - delta.1;
        if height < MIN_DIMENSION {
            patch.y = Some(origin.y + (origin.height - MIN_DIMENSION));
            patch.height = Some(MIN_DIMENSION);
        } else {
            patch.y = Some(origin.y + delta.1);
            patch.height = Some(height);
        }
    }

    patch
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> GeometryModel {
        GeometryModel::with_box(SelectionBox::new(100.0, 100.0, 200.0, 200.0))
    }

    fn drag(
        controller: &mut TransformController,
        model: &mut GeometryModel,
        target: DragTarget,
        to: (f32, f32),
    ) -> SelectionBox {
        assert!(controller.pointer_down(target, (0.0, 0.0), model, false));
        controller.pointer_move(to, model).unwrap();
        controller.pointer_up(model).unwrap()
    }

    #[test]
    fn test_right_anchor_grows_width() {
        let mut m = model();
        let mut c = TransformController::new();
        let b = drag(&mut c, &mut m, DragTarget::Anchor(AnchorKind::Right), (40.0, 99.0));
        assert_eq!(b, SelectionBox::new(100.0, 100.0, 240.0, 200.0));
    }

    #[test]
    fn test_left_anchor_keeps_right_edge() {
        let mut m = model();
        let mut c = TransformController::new();
        let b = drag(&mut c, &mut m, DragTarget::Anchor(AnchorKind::Left), (-30.0, 0.0));
        assert_eq!(b, SelectionBox::new(70.0, 100.0, 230.0, 200.0));
        assert!((b.right() - 300.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_corner_combines_axes() {
        let mut m = model();
        let mut c = TransformController::new();
        let top_left = DragTarget::Anchor(AnchorKind::TopLeft);
        let b = drag(&mut c, &mut m, top_left, (10.0, 20.0));
        assert_eq!(b, SelectionBox::new(110.0, 120.0, 190.0, 180.0));

        let mut m = model();
        let bottom_right = DragTarget::Anchor(AnchorKind::BottomRight);
        let b = drag(&mut c, &mut m, bottom_right, (10.0, 20.0));
        assert_eq!(b, SelectionBox::new(100.0, 100.0, 210.0, 220.0));
    }

    #[test]
    fn test_delta_is_divided_by_scale() {
        let mut m = model();
        let mut c = TransformController::new();
        c.set_scale(2.0);
        let b = drag(&mut c, &mut m, DragTarget::Anchor(AnchorKind::Bottom), (0.0, 50.0));
        assert_eq!(b.height, 225.0);
    }

    #[test]
    fn test_body_drag_moves_box() {
        let mut m = model();
        let mut c = TransformController::new();
        let b = drag(&mut c, &mut m, DragTarget::Body, (-20.0, 5.0));
        assert_eq!(b, SelectionBox::new(80.0, 105.0, 200.0, 200.0));
    }

    #[test]
    fn test_drag_back_to_origin_is_identity() {
        let original = SelectionBox::new(13.37, 42.01, 301.3, 257.9);
        for anchor in AnchorKind::ALL {
            let mut m = GeometryModel::with_box(original);
            let mut c = TransformController::new();
            c.set_scale(1.7);
            assert!(c.pointer_down(DragTarget::Anchor(anchor), (5.5, 7.25), &m, false));
            c.pointer_move((131.3, -77.1), &mut m);
            c.pointer_move((5.5, 7.25), &mut m);
            let b = c.pointer_up(&m).unwrap();
            assert_eq!(b.x.to_bits(), original.x.to_bits(), "{anchor:?}");
            assert_eq!(b.y.to_bits(), original.y.to_bits(), "{anchor:?}");
            assert_eq!(b.width.to_bits(), original.width.to_bits(), "{anchor:?}");
            assert_eq!(b.height.to_bits(), original.height.to_bits(), "{anchor:?}");
        }
    }

    #[test]
    fn test_shrinking_past_minimum_pins_far_edge() {
        let mut m = model();
        let mut c = TransformController::new();
        let b = drag(&mut c, &mut m, DragTarget::Anchor(AnchorKind::Left), (500.0, 0.0));
        assert_eq!(b.width, MIN_DIMENSION);
        assert!((b.right() - 300.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_drag_refused_while_generating() {
        let mut m = model();
        let mut c = TransformController::new();
        assert!(!c.pointer_down(DragTarget::Anchor(AnchorKind::Right), (0.0, 0.0), &m, true));
        assert!(!c.is_dragging());
        assert!(c.pointer_move((50.0, 50.0), &mut m).is_none());
        assert_eq!(m.get(), SelectionBox::new(100.0, 100.0, 200.0, 200.0));
    }

    #[test]
    fn test_capture_lost_returns_to_idle() {
        let mut m = model();
        let mut c = TransformController::new();
        c.pointer_down(DragTarget::Anchor(AnchorKind::Top), (0.0, 0.0), &m, false);
        c.pointer_move((0.0, -10.0), &mut m);
        let b = c.capture_lost(&m).unwrap();
        assert_eq!(b, SelectionBox::new(100.0, 90.0, 200.0, 210.0));
        assert_eq!(*c.state(), TransformState::default());
        assert!(c.pointer_move((0.0, -50.0), &mut m).is_none());
    }

    #[test]
    fn test_cursor_sticks_while_dragging() {
        let m = model();
        let mut c = TransformController::new();
        let target = DragTarget::Anchor(AnchorKind::TopRight);

        assert_eq!(c.pointer_enter(target, false), CursorAffordance::ResizeDiagonalNesw);
        c.pointer_down(target, (0.0, 0.0), &m, false);
        assert_eq!(c.pointer_leave(target), CursorAffordance::ResizeDiagonalNesw);
        c.pointer_up(&m);
        assert_eq!(c.cursor(), CursorAffordance::Default);
    }

    #[test]
    fn test_dimension_label_only_while_dragging() {
        let mut m = model();
        let mut c = TransformController::new();
        assert!(c.dimension_label(&m.get()).is_none());
        c.pointer_down(DragTarget::Anchor(AnchorKind::Right), (0.0, 0.0), &m, false);
        let b = c.pointer_move((56.0, 0.0), &mut m).unwrap();
        assert_eq!(c.dimension_label(&b).as_deref(), Some("256 x 200"));
    }

    #[test]
    fn test_hover_ignored_while_generating() {
        let mut c = TransformController::new();
        let target = DragTarget::Anchor(AnchorKind::Left);
        assert_eq!(c.pointer_enter(target, true), CursorAffordance::Default);
        assert_eq!(c.cursor(), CursorAffordance::Default);
        assert_eq!(c.pointer_enter(target, false), CursorAffordance::ResizeHorizontal);
    }

    #[test]
    fn test_non_finite_pointer_keeps_last_box() {
        let mut m = model();
        let mut c = TransformController::new();
        c.pointer_down(DragTarget::Body, (0.0, 0.0), &m, false);
        let good = c.pointer_move((20.0, 10.0), &mut m).unwrap();

        assert!(c.pointer_move((f32::NAN, 10.0), &mut m).is_none());
        assert!(c.pointer_move((5.0, f32::INFINITY), &mut m).is_none());
        assert_eq!(m.get(), good);
        assert_eq!(c.pointer_up(&m), Some(good));
        assert!(m.get().is_renderable());
    }
}
