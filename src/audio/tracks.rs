use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::AudioError;

/// Persisted ambient choice. Serialized as the track id, or `"silent"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum AmbientSelection {
    #[default]
    Silent,
    Track(String),
}

impl AmbientSelection {
    pub const SILENT_ID: &'static str = "silent";

    pub fn track_id(&self) -> Option<&str> {
        match self {
            AmbientSelection::Silent => None,
            AmbientSelection::Track(id) => Some(id),
        }
    }
}

impl From<String> for AmbientSelection {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == Self::SILENT_ID {
            AmbientSelection::Silent
        } else {
            AmbientSelection::Track(trimmed.to_string())
        }
    }
}

impl From<&str> for AmbientSelection {
    fn from(value: &str) -> Self {
        AmbientSelection::from(value.to_string())
    }
}

impl From<AmbientSelection> for String {
    fn from(value: AmbientSelection) -> Self {
        match value {
            AmbientSelection::Silent => AmbientSelection::SILENT_ID.to_string(),
            AmbientSelection::Track(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub id: String,
    pub label: String,
    /// Same-origin path of the audio file.
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct AmbientCatalog {
    tracks: Vec<TrackInfo>,
}

impl Default for AmbientCatalog {
    fn default() -> Self {
        let tracks = [
            ("rain", "Rain"),
            ("forest", "Forest"),
            ("ocean", "Ocean waves"),
            ("cafe", "Coffee shop"),
            ("fireplace", "Fireplace"),
        ]
        .into_iter()
        .map(|(id, label)| TrackInfo {
            id: id.to_string(),
            label: label.to_string(),
            path: format!("/sounds/{id}.mp3"),
        })
        .collect();

        Self { tracks }
    }
}

impl AmbientCatalog {
    pub fn new(tracks: Vec<TrackInfo>) -> Self {
        Self { tracks }
    }

    pub fn get(&self, id: &str) -> Option<&TrackInfo> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn tracks(&self) -> &[TrackInfo] {
        &self.tracks
    }

    pub fn paths(&self) -> Vec<String> {
        self.tracks.iter().map(|t| t.path.clone()).collect()
    }
}

/// Fetches the encoded bytes of a track.
#[async_trait]
pub trait TrackLoader: Send + Sync {
    async fn load(&self, track: &TrackInfo) -> Result<Bytes, AudioError>;
}
