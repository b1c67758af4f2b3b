//! Generation progress overlay for one session's selection box.
//!
//! Derives the preview image placement, the progress bar and the outline
//! gradient from the latest [`ProgressSnapshot`]. Preview decoding happens
//! outside the renderer; results come back through
//! [`ProgressOverlayRenderer::complete_preview`] and are dropped if the
//! generation they were requested for is no longer current.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

use crate::color::Color;
use crate::geometry::{GRID_STEP, SelectionBox, round_to_grid};

/// Extra width of the progress bar beyond the box.
pub const PROGRESS_BAR_EXTRA_WIDTH: f32 = 8.0;
/// Horizontal offset of the bar, left of the box.
pub const PROGRESS_BAR_OFFSET_X: f32 = -4.0;
/// Vertical gap between the box bottom edge and the bar.
pub const PROGRESS_BAR_GAP: f32 = 3.0;
pub const PROGRESS_BAR_HEIGHT: f32 = 16.0;

/// Latest generation progress for a session. Each new event replaces it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressSnapshot {
    /// 0..=100.
    pub progress: f32,
    pub eta_relative_seconds: f32,
    /// Encoded preview image (base64 or data URL).
    pub current_image: Option<String>,
    pub is_generating: bool,
    pub generating_session_id: String,
}

impl ProgressSnapshot {
    /// Clamp progress into 0..=100; NaN counts as 0.
    pub fn sanitized(mut self) -> Self {
        self.progress = clamp_progress(self.progress);
        if !self.eta_relative_seconds.is_finite() {
            self.eta_relative_seconds = 0.0;
        }
        self
    }
}

fn clamp_progress(progress: f32) -> f32 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 100.0)
    }
}

/// Axis-aligned rectangle in canvas units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Decoded preview image.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewImage {
    pub width: u32,
    pub height: u32,
    /// Encoded bytes as received, for the host to hand to its image element.
    pub bytes: Arc<[u8]>,
}

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("preview payload is empty")]
    Empty,

    #[error("invalid base64 in preview payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("io error while probing preview: {0}")]
    Io(#[from] std::io::Error),

    #[error("unreadable preview image: {0}")]
    Image(#[from] image::ImageError),

    #[error("preview image has zero size")]
    ZeroSize,
}

/// Decode a base64 (optionally `data:` URL) preview and read its natural size.
pub fn decode_preview(encoded: &str) -> Result<PreviewImage, PreviewError> {
    let payload = match encoded.split_once(',') {
        Some((header, data)) if header.starts_with("data:") => data,
        _ => encoded,
    }
    .trim();
    if payload.is_empty() {
        return Err(PreviewError::Empty);
    }

    let bytes = STANDARD.decode(payload)?;
    let (width, height) = image::ImageReader::new(std::io::Cursor::new(&bytes))
        .with_guessed_format()?
        .into_dimensions()?;
    if width == 0 || height == 0 {
        return Err(PreviewError::ZeroSize);
    }

    Ok(PreviewImage {
        width,
        height,
        bytes: bytes.into(),
    })
}

/// Where the preview image goes inside `selection`.
///
/// The box's smaller dimension is filled; the other axis follows the image
/// aspect ratio, rounded to a multiple of 8 (never below 8) and clamped to
/// the box, and is centered.
#[allow(clippy::cast_precision_loss)]
pub fn preview_placement(selection: &SelectionBox, natural: (u32, u32)) -> Option<Rect> {
    if natural.0 == 0 || natural.1 == 0 || !selection.is_renderable() {
        return None;
    }
    let aspect = natural.0 as f32 / natural.1 as f32;

    let (width, height) = if selection.width <= selection.height {
        let height = round_to_grid(selection.width / aspect)
            .max(GRID_STEP)
            .min(selection.height);
        (selection.width, height)
    } else {
        let width = round_to_grid(selection.height * aspect)
            .max(GRID_STEP)
            .min(selection.width);
        (width, selection.height)
    };

    Some(Rect {
        x: selection.x + (selection.width - width) / 2.0,
        y: selection.y + (selection.height - height) / 2.0,
        width,
        height,
    })
}

/// Progress bar under the box, filled with [`Color::SUCCESS`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressBar {
    pub rect: Rect,
    pub color: Color,
}

pub fn progress_bar(selection: &SelectionBox, progress: f32) -> ProgressBar {
    let progress = clamp_progress(progress);
    ProgressBar {
        rect: Rect {
            x: selection.x + PROGRESS_BAR_OFFSET_X,
            y: selection.bottom() + PROGRESS_BAR_GAP,
            width: (selection.width + PROGRESS_BAR_EXTRA_WIDTH) * progress / 100.0,
            height: PROGRESS_BAR_HEIGHT,
        },
        color: Color::SUCCESS,
    }
}

/// Two-color outline with a hard transition at `stop` (0..=1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlineGradient {
    pub stop: f32,
    pub before: Color,
    pub after: Color,
}

impl OutlineGradient {
    /// Color at offset `t` along the border.
    pub fn color_at(&self, t: f32) -> Color {
        if t < self.stop { self.before } else { self.after }
    }

    pub fn is_uniform(&self) -> bool {
        self.before == self.after || self.stop <= 0.0 || self.stop >= 1.0
    }
}

pub fn outline_gradient(progress: f32) -> OutlineGradient {
    let progress = clamp_progress(progress);
    if progress >= 100.0 {
        return OutlineGradient {
            stop: 1.0,
            before: Color::SUCCESS,
            after: Color::SUCCESS,
        };
    }
    OutlineGradient {
        stop: (progress / 100.0).min(1.0),
        before: if progress > 0.0 {
            Color::IN_PROGRESS
        } else {
            Color::NEUTRAL
        },
        after: Color::NEUTRAL,
    }
}

/// Identifies one preview load. Loads from an older epoch are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewTicket {
    pub epoch: u64,
    pub sequence: u64,
}

/// A preview the renderer wants decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewRequest {
    pub ticket: PreviewTicket,
    pub encoded: String,
}

impl PreviewRequest {
    pub fn decode(&self) -> Result<PreviewImage, PreviewError> {
        decode_preview(&self.encoded)
    }
}

/// Everything the host draws for one box's generation state.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayFrame {
    pub preview: Option<(Rect, PreviewImage)>,
    pub progress_bar: Option<ProgressBar>,
    pub outline: OutlineGradient,
}

/// Per-session overlay state.
#[derive(Debug, Clone, Default)]
pub struct ProgressOverlayRenderer {
    epoch: u64,
    next_sequence: u64,
    committed_sequence: Option<u64>,
    was_generating: bool,
    latest: Option<ProgressSnapshot>,
    preview: Option<PreviewImage>,
}

impl ProgressOverlayRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation epoch; bumped on every `is_generating` flip.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn latest(&self) -> Option<&ProgressSnapshot> {
        self.latest.as_ref()
    }

    pub fn preview(&self) -> Option<&PreviewImage> {
        self.preview.as_ref()
    }

    pub fn is_generating(&self) -> bool {
        self.was_generating
    }

    /// Take a new progress event. Returns a decode request when the event
    /// carries a preview for a running generation.
    pub fn apply(&mut self, snapshot: ProgressSnapshot) -> Option<PreviewRequest> {
        let snapshot = snapshot.sanitized();

        if snapshot.is_generating != self.was_generating {
            self.epoch += 1;
            self.preview = None;
            self.committed_sequence = None;
            self.was_generating = snapshot.is_generating;
            tracing::debug!(
                session = %snapshot.generating_session_id,
                generating = snapshot.is_generating,
                epoch = self.epoch,
                "generation state changed, preview invalidated"
            );
        }

        let request = match (&snapshot.current_image, snapshot.is_generating) {
            (Some(encoded), true) if !encoded.is_empty() => {
                let ticket = PreviewTicket {
                    epoch: self.epoch,
                    sequence: self.next_sequence,
                };
                self.next_sequence += 1;
                Some(PreviewRequest {
                    ticket,
                    encoded: encoded.clone(),
                })
            }
            _ => None,
        };

        self.latest = Some(snapshot);
        request
    }

    /// Deliver a decoded preview. Returns whether it was committed.
    pub fn complete_preview(
        &mut self,
        ticket: PreviewTicket,
        result: Result<PreviewImage, PreviewError>,
    ) -> bool {
        if ticket.epoch != self.epoch {
            tracing::debug!(
                ticket_epoch = ticket.epoch,
                epoch = self.epoch,
                "dropping preview from a previous generation"
            );
            return false;
        }
        if self
            .committed_sequence
            .is_some_and(|committed| ticket.sequence < committed)
        {
            tracing::trace!(sequence = ticket.sequence, "dropping out-of-order preview");
            return false;
        }

        match result {
            Ok(image) => {
                self.preview = Some(image);
                self.committed_sequence = Some(ticket.sequence);
                true
            }
            Err(err) => {
                tracing::warn!(%err, "failed to decode generation preview");
                false
            }
        }
    }

    /// Overlay geometry for `selection`.
    pub fn frame(&self, selection: &SelectionBox) -> OverlayFrame {
        let progress = self.latest.as_ref().map_or(0.0, |s| s.progress);
        let generating = self.latest.as_ref().is_some_and(|s| s.is_generating);

        let preview = if generating {
            self.preview.as_ref().and_then(|image| {
                preview_placement(selection, (image.width, image.height))
                    .map(|rect| (rect, image.clone()))
            })
        } else {
            None
        };

        OverlayFrame {
            preview,
            progress_bar: (progress > 0.0).then(|| progress_bar(selection, progress)),
            outline: outline_gradient(progress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded_png(width: u32, height: u32) -> String {
        let img = image::RgbaImage::new(width, height);
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        STANDARD.encode(bytes)
    }

    fn snapshot(progress: f32, generating: bool, image: Option<String>) -> ProgressSnapshot {
        ProgressSnapshot {
            progress,
            eta_relative_seconds: 3.0,
            current_image: image,
            is_generating: generating,
            generating_session_id: "session-a".to_string(),
        }
    }

    fn image(width: u32, height: u32) -> PreviewImage {
        PreviewImage {
            width,
            height,
            bytes: Arc::from(Vec::new()),
        }
    }

    #[test]
    fn test_aspect_lock_wide_image() {
        let b = SelectionBox::new(0.0, 0.0, 400.0, 300.0);
        let rect = preview_placement(&b, (800, 400)).unwrap();
        assert_eq!(rect.height, 300.0);
        assert_eq!(rect.width % 8.0, 0.0);
        assert!(rect.width <= b.width);
        assert_eq!(rect.x, 0.0);
    }

    #[test]
    fn test_aspect_lock_scaled_axis_is_centered() {
        let b = SelectionBox::new(10.0, 20.0, 300.0, 400.0);
        let rect = preview_placement(&b, (300, 200)).unwrap();
        assert_eq!(rect.width, 300.0);
        assert_eq!(rect.height, 200.0);
        assert_eq!(rect.y, 20.0 + 100.0);

        let b = SelectionBox::new(10.0, 20.0, 400.0, 300.0);
        let rect = preview_placement(&b, (100, 400)).unwrap();
        // 300 * 0.25 = 75, rounded to 72.
        assert_eq!(rect.height, 300.0);
        assert_eq!(rect.width, 72.0);
        assert_eq!(rect.x, 10.0 + 164.0);
    }

    #[test]
    fn test_extreme_aspect_keeps_visible_axis() {
        let small = SelectionBox::new(0.0, 0.0, 8.0, 8.0);
        let rect = preview_placement(&small, (100, 10)).unwrap();
        assert_eq!((rect.width, rect.height), (8.0, 8.0));

        let b = SelectionBox::new(0.0, 0.0, 64.0, 64.0);
        let rect = preview_placement(&b, (100, 1)).unwrap();
        assert_eq!((rect.width, rect.height), (64.0, 8.0));
        assert_eq!(rect.y, 28.0);

        let rect = preview_placement(&b, (1, 100)).unwrap();
        assert_eq!((rect.width, rect.height), (64.0, 64.0));
    }

    #[test]
    fn test_progress_bar_geometry() {
        let b = SelectionBox::new(100.0, 50.0, 512.0, 256.0);
        let bar = progress_bar(&b, 50.0);
        assert_eq!(bar.rect.x, 96.0);
        assert_eq!(bar.rect.y, 309.0);
        assert_eq!(bar.rect.width, 260.0);
        assert_eq!(bar.rect.height, 16.0);
        assert_eq!(bar.color, Color::SUCCESS);
        assert_eq!(progress_bar(&b, 250.0).rect.width, 520.0);
    }

    #[test]
    fn test_gradient_stops() {
        let idle = outline_gradient(0.0);
        assert!(idle.is_uniform());
        assert_eq!(idle.color_at(0.0), Color::NEUTRAL);
        assert_eq!(idle.color_at(1.0), Color::NEUTRAL);

        let half = outline_gradient(50.0);
        assert_eq!(half.stop, 0.5);
        assert_eq!(half.color_at(0.25), Color::IN_PROGRESS);
        assert_eq!(half.color_at(0.75), Color::NEUTRAL);

        let done = outline_gradient(100.0);
        assert_eq!(done.color_at(0.0), Color::SUCCESS);
        assert_eq!(done.color_at(0.5), Color::SUCCESS);
        assert_eq!(done.color_at(1.0), Color::SUCCESS);
    }

    #[test]
    fn test_decode_preview_accepts_data_url() {
        let raw = encoded_png(16, 8);
        let decoded = decode_preview(&raw).unwrap();
        assert_eq!((decoded.width, decoded.height), (16, 8));

        let url = format!("data:image/png;base64,{raw}");
        let decoded = decode_preview(&url).unwrap();
        assert_eq!((decoded.width, decoded.height), (16, 8));

        assert!(matches!(decode_preview(""), Err(PreviewError::Empty)));
        assert!(matches!(
            decode_preview("***"),
            Err(PreviewError::Base64(_))
        ));
    }

    #[test]
    fn test_preview_shown_while_generating() {
        let mut renderer = ProgressOverlayRenderer::new();
        let request = renderer
            .apply(snapshot(10.0, true, Some(encoded_png(32, 32))))
            .unwrap();
        assert!(renderer.complete_preview(request.ticket, request.decode()));

        let b = SelectionBox::new(0.0, 0.0, 256.0, 256.0);
        let frame = renderer.frame(&b);
        let (rect, img) = frame.preview.unwrap();
        assert_eq!((img.width, img.height), (32, 32));
        assert_eq!(rect.width, 256.0);
        assert!(frame.progress_bar.is_some());
    }

    #[test]
    fn test_generation_flip_invalidates_preview() {
        let mut renderer = ProgressOverlayRenderer::new();
        let request = renderer.apply(snapshot(40.0, true, Some("x".into()))).unwrap();
        assert!(renderer.complete_preview(request.ticket, Ok(image(64, 64))));
        assert!(renderer.preview().is_some());

        renderer.apply(snapshot(100.0, false, None));
        assert!(renderer.preview().is_none());

        renderer.apply(snapshot(0.0, true, None));
        assert!(renderer.preview().is_none());
        assert_eq!(renderer.epoch(), 3);
    }

    #[test]
    fn test_stale_load_is_ignored() {
        let mut renderer = ProgressOverlayRenderer::new();
        let old = renderer.apply(snapshot(30.0, true, Some("old".into()))).unwrap();

        // Generation stops and restarts before the old load resolves.
        renderer.apply(snapshot(100.0, false, None));
        let fresh = renderer.apply(snapshot(5.0, true, Some("new".into()))).unwrap();

        assert!(!renderer.complete_preview(old.ticket, Ok(image(8, 8))));
        assert!(renderer.preview().is_none());

        assert!(renderer.complete_preview(fresh.ticket, Ok(image(16, 16))));
        assert_eq!(renderer.preview().map(|p| p.width), Some(16));
    }

    #[test]
    fn test_out_of_order_load_within_epoch() {
        let mut renderer = ProgressOverlayRenderer::new();
        let first = renderer.apply(snapshot(10.0, true, Some("a".into()))).unwrap();
        let second = renderer.apply(snapshot(20.0, true, Some("b".into()))).unwrap();

        assert!(renderer.complete_preview(second.ticket, Ok(image(16, 16))));
        assert!(!renderer.complete_preview(first.ticket, Ok(image(8, 8))));
        assert_eq!(renderer.preview().map(|p| p.width), Some(16));
    }

    #[test]
    fn test_failed_decode_keeps_previous_preview() {
        let mut renderer = ProgressOverlayRenderer::new();
        let first = renderer.apply(snapshot(10.0, true, Some("a".into()))).unwrap();
        renderer.complete_preview(first.ticket, Ok(image(16, 16)));

        let broken = renderer.apply(snapshot(20.0, true, Some("***".into()))).unwrap();
        assert!(!renderer.complete_preview(broken.ticket, broken.decode()));
        assert!(renderer.preview().is_some());
    }

    #[test]
    fn test_progress_is_clamped() {
        let mut renderer = ProgressOverlayRenderer::new();
        renderer.apply(snapshot(f32::NAN, true, None));
        assert_eq!(renderer.latest().unwrap().progress, 0.0);
        renderer.apply(snapshot(180.0, true, None));
        assert_eq!(renderer.latest().unwrap().progress, 100.0);
    }
}
