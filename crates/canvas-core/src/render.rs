//! Drawable primitives handed to the host rendering surface.

use crate::anchor::{AnchorKind, CursorAffordance};
use crate::color::Color;
use crate::geometry::SelectionBox;
use crate::overlay::{
    OutlineGradient, OverlayFrame, PreviewImage, ProgressBar, Rect, outline_gradient,
};

/// Outline stroke width in screen pixels.
pub const OUTLINE_WIDTH: f32 = 2.0;

/// Gap between the dimension label and the box top edge, screen pixels.
pub const LABEL_OFFSET: f32 = 20.0;

/// A resize handle to draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorPrimitive {
    pub kind: AnchorKind,
    pub rect: Rect,
    pub cursor: CursorAffordance,
}

/// The `W x H` text shown while transforming.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelPrimitive {
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub color: Color,
}

/// Everything drawn for one session's box.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxFrame {
    pub session: String,
    pub is_local: bool,
    pub outline: Rect,
    pub outline_width: f32,
    pub outline_gradient: OutlineGradient,
    pub anchors: Vec<AnchorPrimitive>,
    pub preview: Option<(Rect, PreviewImage)>,
    pub progress_bar: Option<ProgressBar>,
    pub label: Option<LabelPrimitive>,
}

/// Inputs for [`compose_box`].
#[derive(Debug, Clone, Copy)]
pub struct ComposeOptions {
    /// Zoom of the view; keeps strokes and handles a constant screen size.
    pub scale: f32,
    /// Draw interactive anchors (local box, not generating).
    pub anchors: bool,
    pub is_local: bool,
}

/// The host surface. It supplies input elsewhere; here it only draws.
pub trait RenderAdapter {
    fn draw(&mut self, frame: &BoxFrame);

    fn set_cursor(&mut self, cursor: CursorAffordance);
}

/// Lay out a box with its overlay. Returns `None` when the geometry is not
/// finite; the box is hidden rather than drawn broken.
pub fn compose_box(
    session: &str,
    selection: &SelectionBox,
    overlay: Option<OverlayFrame>,
    label: Option<String>,
    options: ComposeOptions,
) -> Option<BoxFrame> {
    if !selection.is_renderable() {
        return None;
    }
    let scale = crate::anchor::sanitize_scale(options.scale);

    let anchors = if options.anchors {
        AnchorKind::ALL
            .iter()
            .map(|kind| {
                let (x, y, width, height) = kind.hit_rect(selection, scale);
                AnchorPrimitive {
                    kind: *kind,
                    rect: Rect {
                        x,
                        y,
                        width,
                        height,
                    },
                    cursor: kind.cursor(),
                }
            })
            .collect()
    } else {
        Vec::new()
    };

    let (preview, progress_bar, gradient) = match overlay {
        Some(frame) => (frame.preview, frame.progress_bar, frame.outline),
        None => (None, None, outline_gradient(0.0)),
    };

    Some(BoxFrame {
        session: session.to_string(),
        is_local: options.is_local,
        outline: Rect {
            x: selection.x,
            y: selection.y,
            width: selection.width,
            height: selection.height,
        },
        outline_width: OUTLINE_WIDTH / scale,
        outline_gradient: gradient,
        anchors,
        preview,
        progress_bar,
        label: label.map(|text| LabelPrimitive {
            x: selection.x,
            y: selection.y - LABEL_OFFSET / scale,
            text,
            color: Color::NEUTRAL,
        }),
    })
}
