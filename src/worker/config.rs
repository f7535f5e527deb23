use serde::{Deserialize, Serialize};

use crate::audio::AmbientCatalog;

/// Cache generation settings. `version` is the single identifier behind both
/// partition names; bumping it evicts every older generation on activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    pub version: String,
    /// App-shell paths precached all-or-nothing.
    pub shell_assets: Vec<String>,
    /// Ambient track paths precached best-effort.
    pub audio_assets: Vec<String>,
    pub start_url: String,
    /// Activate right after install instead of waiting for open clients to go away.
    pub skip_waiting: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version: format!("v{}", env!("CARGO_PKG_VERSION")),
            shell_assets: vec![
                "/".into(),
                "/index.html".into(),
                "/styles.css".into(),
                "/app.js".into(),
                "/manifest.json".into(),
            ],
            audio_assets: AmbientCatalog::default().paths(),
            start_url: "/".into(),
            skip_waiting: true,
        }
    }
}

impl CacheConfig {
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn static_partition(&self) -> String {
        format!("static-{}", self.version)
    }

    pub fn audio_partition(&self) -> String {
        format!("audio-{}", self.version)
    }

    pub fn is_current_partition(&self, name: &str) -> bool {
        name == self.static_partition() || name == self.audio_partition()
    }
}
