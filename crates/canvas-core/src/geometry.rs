//! Selection box representation and invariant enforcement.
//!
//! A [`SelectionBox`] is the region a session is targeting for generation.
//! The [`GeometryModel`] owns the local copy and applies partial updates,
//! keeping width and height strictly positive.

use serde::{Deserialize, Serialize};

/// Default width and height of a fresh selection box.
pub const DEFAULT_BOX_SIZE: f32 = 512.0;

/// Generation models want dimensions in multiples of this.
pub const GRID_STEP: f32 = 8.0;

/// Smallest width/height a box can be resized to.
pub const MIN_DIMENSION: f32 = GRID_STEP;

/// Rectangular region of interest in canvas units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for SelectionBox {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: DEFAULT_BOX_SIZE,
            height: DEFAULT_BOX_SIZE,
        }
    }
}

impl SelectionBox {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Whether a point lies inside the box (edges inclusive on the top-left).
    pub fn contains(&self, point: (f32, f32)) -> bool {
        point.0 >= self.x && point.1 >= self.y && point.0 < self.right() && point.1 < self.bottom()
    }

    /// False when any coordinate is NaN or infinite. Such a box is hidden
    /// instead of being drawn.
    pub fn is_renderable(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }

    /// Copy with width/height snapped to the nearest multiple of [`GRID_STEP`].
    pub fn normalized(&self) -> Self {
        Self {
            width: snap_dimension(self.width),
            height: snap_dimension(self.height),
            ..*self
        }
    }

    /// Dimensions to request from the generation model.
    pub fn generation_size(&self) -> (u32, u32) {
        let normalized = self.normalized();
        (
            dimension_to_u32(normalized.width),
            dimension_to_u32(normalized.height),
        )
    }
}

/// Round to the nearest multiple of [`GRID_STEP`].
pub fn round_to_grid(value: f32) -> f32 {
    (value / GRID_STEP).round() * GRID_STEP
}

fn snap_dimension(value: f32) -> f32 {
    if value.is_finite() {
        round_to_grid(value).max(MIN_DIMENSION)
    } else {
        value
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn dimension_to_u32(value: f32) -> u32 {
    if value.is_finite() {
        value.max(0.0) as u32
    } else {
        DEFAULT_BOX_SIZE as u32
    }
}

/// Partial update of a [`SelectionBox`]; `None` fields keep their value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoxPatch {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
}

impl BoxPatch {
    pub fn position(x: f32, y: f32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn size(width: f32, height: f32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }

    /// Apply the patch over `base`, without any clamping.
    pub fn apply(&self, base: SelectionBox) -> SelectionBox {
        SelectionBox {
            x: self.x.unwrap_or(base.x),
            y: self.y.unwrap_or(base.y),
            width: self.width.unwrap_or(base.width),
            height: self.height.unwrap_or(base.height),
        }
    }
}

impl From<SelectionBox> for BoxPatch {
    fn from(b: SelectionBox) -> Self {
        Self {
            x: Some(b.x),
            y: Some(b.y),
            width: Some(b.width),
            height: Some(b.height),
        }
    }
}

/// Owner of the local session's selection box.
///
/// `update` does not snap to the grid; callers normalize before using a box
/// for generation. It only keeps width and height positive.
#[derive(Debug, Clone, Default)]
pub struct GeometryModel {
    current: SelectionBox,
}

impl GeometryModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_box(selection: SelectionBox) -> Self {
        let mut model = Self::new();
        model.replace(selection);
        model
    }

    pub fn get(&self) -> SelectionBox {
        self.current
    }

    /// Merge `patch` over the current box and return the new box.
    pub fn update(&mut self, patch: BoxPatch) -> SelectionBox {
        let mut next = patch.apply(self.current);
        next.width = clamp_dimension(next.width);
        next.height = clamp_dimension(next.height);
        self.current = next;
        next
    }

    /// Replace the whole box (still clamped).
    pub fn replace(&mut self, selection: SelectionBox) -> SelectionBox {
        self.update(selection.into())
    }

    /// Back to the default 512x512 box at the origin.
    pub fn reset(&mut self) -> SelectionBox {
        self.current = SelectionBox::default();
        self.current
    }
}

// NaN is kept so the renderer can refuse to draw the box.
fn clamp_dimension(value: f32) -> f32 {
    if value.is_nan() {
        value
    } else {
        value.max(MIN_DIMENSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_box() {
        let model = GeometryModel::new();
        assert_eq!(model.get(), SelectionBox::new(0.0, 0.0, 512.0, 512.0));
    }

    #[test]
    fn test_update_merges_fields() {
        let mut model = GeometryModel::new();
        let updated = model.update(BoxPatch {
            x: Some(40.0),
            width: Some(300.0),
            ..BoxPatch::default()
        });
        assert_eq!(updated, SelectionBox::new(40.0, 0.0, 300.0, 512.0));
        assert_eq!(model.get(), updated);
    }

    #[test]
    fn test_update_never_yields_non_positive_size() {
        let mut model = GeometryModel::new();
        for (w, h) in [
            (0.0, 0.0),
            (-10.0, 5.0),
            (3.0, -400.0),
            (f32::NEG_INFINITY, 0.5),
            (1e-9, 1e9),
        ] {
            let b = model.update(BoxPatch::size(w, h));
            assert!(b.width > 0.0, "width {w} -> {}", b.width);
            assert!(b.height > 0.0, "height {h} -> {}", b.height);
        }
    }

    #[test]
    fn test_nan_makes_box_unrenderable() {
        let mut model = GeometryModel::new();
        let b = model.update(BoxPatch {
            x: Some(f32::NAN),
            ..BoxPatch::default()
        });
        assert!(!b.is_renderable());

        let b = model.update(BoxPatch::position(0.0, 0.0));
        assert!(b.is_renderable());
    }

    #[test]
    fn test_normalized_rounds_to_grid() {
        let b = SelectionBox::new(3.0, 5.0, 403.0, 301.0).normalized();
        assert_eq!(b, SelectionBox::new(3.0, 5.0, 400.0, 304.0));
        assert_eq!(SelectionBox::new(0.0, 0.0, 2.0, 12.0).generation_size(), (8, 16));
    }

    #[test]
    fn test_reset() {
        let mut model = GeometryModel::with_box(SelectionBox::new(10.0, 10.0, 64.0, 64.0));
        assert_eq!(model.reset(), SelectionBox::default());
    }

    #[test]
    fn test_contains() {
        let b = SelectionBox::new(10.0, 10.0, 20.0, 20.0);
        assert!(b.contains((10.0, 10.0)));
        assert!(b.contains((29.0, 29.0)));
        assert!(!b.contains((30.0, 15.0)));
    }
}
