use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Control messages posted by the foreground app, e.g. `{"type":"GET_VERSION"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    SkipWaiting,
    GetVersion,
    ClearCache,
}

impl ControlMessage {
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).with_context(|| format!("unknown control message: {raw}"))
    }
}
