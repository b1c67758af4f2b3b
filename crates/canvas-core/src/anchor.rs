//! Resize anchors and hit testing for a selection box.

use crate::geometry::SelectionBox;

/// Minimum anchor grab size in screen pixels.
pub const MIN_ANCHOR_HIT: f32 = 4.0;

/// Anchor grab size at zoom 1. Divided by the zoom so the handle keeps
/// the same on-screen size.
pub const ANCHOR_HIT_BASE: f32 = 16.0;

/// One of the eight resize handles on a box border.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnchorKind {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
}

/// Pointer cursor shown while hovering or dragging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorAffordance {
    #[default]
    Default,
    Move,
    ResizeHorizontal,
    ResizeVertical,
    ResizeDiagonalNesw,
    ResizeDiagonalNwse,
}

impl CursorAffordance {
    /// CSS cursor name.
    pub fn css(&self) -> &'static str {
        match self {
            CursorAffordance::Default => "default",
            CursorAffordance::Move => "move",
            CursorAffordance::ResizeHorizontal => "ew-resize",
            CursorAffordance::ResizeVertical => "ns-resize",
            CursorAffordance::ResizeDiagonalNesw => "nesw-resize",
            CursorAffordance::ResizeDiagonalNwse => "nwse-resize",
        }
    }
}

impl AnchorKind {
    pub const ALL: [AnchorKind; 8] = [
        AnchorKind::TopLeft,
        AnchorKind::Top,
        AnchorKind::TopRight,
        AnchorKind::Right,
        AnchorKind::BottomRight,
        AnchorKind::Bottom,
        AnchorKind::BottomLeft,
        AnchorKind::Left,
    ];

    pub fn is_corner(&self) -> bool {
        matches!(
            self,
            AnchorKind::TopLeft
                | AnchorKind::TopRight
                | AnchorKind::BottomRight
                | AnchorKind::BottomLeft
        )
    }

    /// Dragging moves the left edge (x and width change, right edge fixed).
    pub fn moves_left(&self) -> bool {
        matches!(
            self,
            AnchorKind::TopLeft | AnchorKind::Left | AnchorKind::BottomLeft
        )
    }

    pub fn moves_right(&self) -> bool {
        matches!(
            self,
            AnchorKind::TopRight | AnchorKind::Right | AnchorKind::BottomRight
        )
    }

    /// Dragging moves the top edge (y and height change, bottom edge fixed).
    pub fn moves_top(&self) -> bool {
        matches!(
            self,
            AnchorKind::TopLeft | AnchorKind::Top | AnchorKind::TopRight
        )
    }

    pub fn moves_bottom(&self) -> bool {
        matches!(
            self,
            AnchorKind::BottomLeft | AnchorKind::Bottom | AnchorKind::BottomRight
        )
    }

    pub fn cursor(&self) -> CursorAffordance {
        match self {
            AnchorKind::Left | AnchorKind::Right => CursorAffordance::ResizeHorizontal,
            AnchorKind::Top | AnchorKind::Bottom => CursorAffordance::ResizeVertical,
            AnchorKind::TopRight | AnchorKind::BottomLeft => CursorAffordance::ResizeDiagonalNesw,
            AnchorKind::TopLeft | AnchorKind::BottomRight => CursorAffordance::ResizeDiagonalNwse,
        }
    }

    /// Handle center on the box border.
    pub fn position(&self, selection: &SelectionBox) -> (f32, f32) {
        let (cx, cy) = selection.center();
        let x = if self.moves_left() {
            selection.x
        } else if self.moves_right() {
            selection.right()
        } else {
            cx
        };
        let y = if self.moves_top() {
            selection.y
        } else if self.moves_bottom() {
            selection.bottom()
        } else {
            cy
        };
        (x, y)
    }

    /// Square grab area `(x, y, size, size)` centered on the handle.
    pub fn hit_rect(&self, selection: &SelectionBox, scale: f32) -> (f32, f32, f32, f32) {
        let size = anchor_hit_size(scale);
        let (px, py) = self.position(selection);
        (px - size / 2.0, py - size / 2.0, size, size)
    }

    fn hit(&self, selection: &SelectionBox, point: (f32, f32), scale: f32) -> bool {
        let (x, y, w, h) = self.hit_rect(selection, scale);
        point.0 >= x && point.0 <= x + w && point.1 >= y && point.1 <= y + h
    }
}

/// What a pointer-down grabbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DragTarget {
    Anchor(AnchorKind),
    /// The box interior; dragging moves the box.
    Body,
}

impl DragTarget {
    pub fn cursor(&self) -> CursorAffordance {
        match self {
            DragTarget::Anchor(anchor) => anchor.cursor(),
            DragTarget::Body => CursorAffordance::Move,
        }
    }
}

/// Zoom-compensated anchor size in canvas units.
pub fn anchor_hit_size(scale: f32) -> f32 {
    let scale = sanitize_scale(scale);
    (ANCHOR_HIT_BASE / scale).max(MIN_ANCHOR_HIT)
}

/// Zoom factors that are zero, negative or not finite act as 1.
pub fn sanitize_scale(scale: f32) -> f32 {
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}

/// Find what lies under `point` (canvas units): corners win over edges,
/// edges over the body.
pub fn hit_test(selection: &SelectionBox, point: (f32, f32), scale: f32) -> Option<DragTarget> {
    if !selection.is_renderable() {
        return None;
    }

    let (corners, edges): (Vec<AnchorKind>, Vec<AnchorKind>) =
        AnchorKind::ALL.iter().partition(|a| a.is_corner());

    corners
        .into_iter()
        .chain(edges)
        .find(|anchor| anchor.hit(selection, point, scale))
        .map(DragTarget::Anchor)
        .or_else(|| selection.contains(point).then_some(DragTarget::Body))
}
