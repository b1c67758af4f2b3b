//! Presence and progress channel payloads.
//!
//! Every remote payload is validated here, at the ingestion boundary, and
//! turned into core types with documented fallbacks. Nothing downstream
//! sees optional network fields.

use std::collections::BTreeMap;

use canvas_core::{DEFAULT_BOX_SIZE, ProgressSnapshot, SelectionBox};
use serde::{Deserialize, Serialize};

/// What a session tracks on the presence channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPayload {
    pub selection_box: SelectionBox,
}

/// Box as it arrives from a peer; any field may be missing or garbage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct RawSelectionBox {
    #[serde(default)]
    pub x: Option<f32>,
    #[serde(default)]
    pub y: Option<f32>,
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub height: Option<f32>,
}

impl RawSelectionBox {
    /// Missing or non-finite position becomes 0; missing, non-finite or
    /// non-positive size becomes the default 512.
    pub fn resolve(&self) -> SelectionBox {
        let coord = |v: Option<f32>| v.filter(|v| v.is_finite()).unwrap_or(0.0);
        let size = |v: Option<f32>| {
            v.filter(|v| v.is_finite() && *v > 0.0)
                .unwrap_or(DEFAULT_BOX_SIZE)
        };
        SelectionBox {
            x: coord(self.x),
            y: coord(self.y),
            width: size(self.width),
            height: size(self.height),
        }
    }
}

/// One metadata entry of a presence member.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PresenceMeta {
    #[serde(default, deserialize_with = "lenient_box")]
    pub selection_box: Option<RawSelectionBox>,
}

/// A presence member and its metadata list (first entry is current).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PresenceMember {
    #[serde(default)]
    pub metas: Vec<PresenceMeta>,
}

impl PresenceMember {
    /// The member's box, defaulting when metadata is absent.
    pub fn selection_box(&self) -> SelectionBox {
        self.metas
            .first()
            .and_then(|meta| meta.selection_box)
            .map(|raw| raw.resolve())
            .unwrap_or_default()
    }
}

/// Full membership snapshot keyed by session name.
pub type PresenceState = BTreeMap<String, PresenceMember>;

/// Parse a presence snapshot. Members whose entry is not an object are kept
/// with empty metadata, so they still show up with the default box.
pub fn parse_presence(value: &serde_json::Value) -> Result<PresenceState, serde_json::Error> {
    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_value(value.clone())?;
    Ok(raw
        .into_iter()
        .map(|(key, member)| {
            let member = serde_json::from_value(member).unwrap_or_else(|err| {
                tracing::warn!(session = %key, %err, "malformed presence member, using defaults");
                PresenceMember::default()
            });
            (key, member)
        })
        .collect())
}

fn lenient_box<'de, D>(deserializer: D) -> Result<Option<RawSelectionBox>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// `"progress"` event from the generation channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressEvent {
    pub eta_relative: f32,
    pub progress: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_image: Option<String>,
    pub is_generating: bool,
    pub generating_session_name: String,
}

impl ProgressEvent {
    pub fn into_snapshot(self) -> ProgressSnapshot {
        ProgressSnapshot {
            progress: self.progress,
            eta_relative_seconds: self.eta_relative,
            current_image: self.current_image.filter(|image| !image.is_empty()),
            is_generating: self.is_generating,
            generating_session_id: self.generating_session_name,
        }
        .sanitized()
    }
}
