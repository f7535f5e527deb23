//! Push messages and notification interaction.

use std::time::Duration;

use serde::Deserialize;

use super::clients::{Notification, NotificationAction};

pub const ACTION_START: &str = "start";
pub const ACTION_SNOOZE: &str = "snooze";
pub const SNOOZE_DELAY: Duration = Duration::from_secs(5 * 60);

const DEFAULT_TITLE: &str = "Focus timer";
const DEFAULT_BODY: &str = "Ready for your next focus session?";
const NOTIFICATION_TAG: &str = "focus-reminder";

#[derive(Debug, Default, Deserialize)]
struct PushPayload {
    title: Option<String>,
    body: Option<String>,
}

/// Builds the notification for a push. JSON payloads may set title and body;
/// anything else is used verbatim as the body.
pub fn notification_for(payload: Option<&[u8]>) -> Notification {
    let parsed = match payload {
        None => PushPayload::default(),
        Some(raw) => serde_json::from_slice::<PushPayload>(raw).unwrap_or_else(|_| PushPayload {
            title: None,
            body: Some(String::from_utf8_lossy(raw).trim().to_string()).filter(|b| !b.is_empty()),
        }),
    };

    Notification {
        title: parsed.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        body: parsed.body.unwrap_or_else(|| DEFAULT_BODY.to_string()),
        tag: NOTIFICATION_TAG.to_string(),
        actions: vec![
            NotificationAction {
                action: ACTION_START.to_string(),
                title: "Start session".to_string(),
            },
            NotificationAction {
                action: ACTION_SNOOZE.to_string(),
                title: "Snooze 5 min".to_string(),
            },
        ],
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    Focused(String),
    Opened(String),
    Snoozed,
}
