//! Shared-canvas core library
//!
//! Geometry and interaction engine for the selection boxes of a
//! collaborative image-generation canvas:
//! - `geometry`: the box and its invariants
//! - `transform` / `nudge`: pointer and keyboard controllers
//! - `overlay`: generation progress, preview placement and stale-load guard
//! - `render`: primitives for the host surface
//!
//! Everything here is synchronous and free of I/O.

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod anchor;
pub mod color;
pub mod geometry;
pub mod nudge;
pub mod overlay;
pub mod render;
pub mod transform;

pub use anchor::{AnchorKind, CursorAffordance, DragTarget, anchor_hit_size, hit_test};
pub use color::Color;
pub use geometry::{BoxPatch, DEFAULT_BOX_SIZE, GRID_STEP, GeometryModel, SelectionBox};
pub use nudge::{ArrowKey, KeyInput, KeyListener, KeyNudgeController, KeyboardBus};
pub use overlay::{
    OutlineGradient, OverlayFrame, PreviewError, PreviewImage, PreviewRequest, PreviewTicket,
    ProgressBar, ProgressOverlayRenderer, ProgressSnapshot, Rect, decode_preview,
    preview_placement,
};
pub use render::{BoxFrame, ComposeOptions, RenderAdapter, compose_box};
pub use transform::{TransformController, TransformPhase, TransformState};
