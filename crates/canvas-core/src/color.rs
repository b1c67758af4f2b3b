//! Colors used by the canvas overlays.

use serde::{Deserialize, Serialize};

/// RGBA color representation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Idle outline color.
    pub const NEUTRAL: Color = Color::rgb(229, 231, 235);
    /// Outline color for the part of a box that generation has covered so far.
    pub const IN_PROGRESS: Color = Color::rgb(59, 130, 246);
    /// Finished generation and progress bar fill.
    pub const SUCCESS: Color = Color::rgb(34, 197, 94);

    /// CSS hex form (`#rrggbb`, or `#rrggbbaa` when translucent).
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}
