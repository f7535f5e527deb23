use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::warn;
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    audio::AmbientSelection,
    store::{keys, load_json, save_json, KeyValueStore},
    timer::Mode,
};

pub const FOCUS_MINUTES_RANGE: (u32, u32) = (5, 60);
pub const SHORT_MINUTES_RANGE: (u32, u32) = (1, 15);
pub const LONG_MINUTES_RANGE: (u32, u32) = (5, 30);

pub const DEFAULT_VOLUME: f32 = 0.5;

/// Phase lengths in whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSettings {
    pub focus: u32,
    pub short: u32,
    pub long: u32,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            focus: 25,
            short: 5,
            long: 15,
        }
    }
}

impl TimerSettings {
    /// Builds settings from raw user input, clamping each field into its bounds.
    pub fn new(focus: u32, short: u32, long: u32) -> Self {
        Self { focus, short, long }.clamped()
    }

    pub fn clamped(self) -> Self {
        Self {
            focus: self.focus.clamp(FOCUS_MINUTES_RANGE.0, FOCUS_MINUTES_RANGE.1),
            short: self.short.clamp(SHORT_MINUTES_RANGE.0, SHORT_MINUTES_RANGE.1),
            long: self.long.clamp(LONG_MINUTES_RANGE.0, LONG_MINUTES_RANGE.1),
        }
    }

    pub fn minutes_for(&self, mode: Mode) -> u32 {
        match mode {
            Mode::Focus => self.focus,
            Mode::ShortBreak => self.short,
            Mode::LongBreak => self.long,
        }
    }

    pub fn seconds_for(&self, mode: Mode) -> u32 {
        self.minutes_for(mode) * 60
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

#[derive(Debug, Clone, PartialEq)]
struct UserSettings {
    timer: TimerSettings,
    ambient: AmbientSelection,
    volume: f32,
    muted: bool,
    theme: Theme,
    current_task: String,
    last_update_check: Option<DateTime<Utc>>,
    has_seen_shortcuts: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            timer: TimerSettings::default(),
            ambient: AmbientSelection::Silent,
            volume: DEFAULT_VOLUME,
            muted: false,
            theme: Theme::default(),
            current_task: String::new(),
            last_update_check: None,
            has_seen_shortcuts: false,
        }
    }
}

/// Typed view over every persisted preference key.
///
/// Reads come from an in-memory copy; each update replaces the in-memory
/// value first and then writes the whole key, so a failed write never rolls
/// back what the user just chose.
pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    /// Reads every preference key. A key that cannot be read falls back to
    /// its default; the first read error is handed back for reporting.
    pub async fn load(store: Arc<dyn KeyValueStore>) -> (Self, Option<anyhow::Error>) {
        let defaults = UserSettings::default();
        let mut failure = None;
        let s = store.as_ref();

        let data = UserSettings {
            timer: read_or_default::<TimerSettings>(s, keys::TIMER_SETTINGS, &mut failure)
                .await
                .map(TimerSettings::clamped)
                .unwrap_or(defaults.timer),
            ambient: read_or_default(s, keys::AMBIENT_SOUND, &mut failure)
                .await
                .unwrap_or(defaults.ambient),
            volume: read_or_default::<f32>(s, keys::VOLUME, &mut failure)
                .await
                .map(|v| v.clamp(0.0, 1.0))
                .unwrap_or(defaults.volume),
            muted: read_or_default(s, keys::MUTED, &mut failure)
                .await
                .unwrap_or(defaults.muted),
            theme: read_or_default(s, keys::THEME, &mut failure)
                .await
                .unwrap_or(defaults.theme),
            current_task: read_or_default(s, keys::CURRENT_TASK, &mut failure)
                .await
                .unwrap_or(defaults.current_task),
            last_update_check: read_or_default(s, keys::LAST_UPDATE_CHECK, &mut failure).await,
            has_seen_shortcuts: read_or_default(s, keys::HAS_SEEN_SHORTCUTS, &mut failure)
                .await
                .unwrap_or(defaults.has_seen_shortcuts),
        };

        let settings = Self {
            store,
            data: RwLock::new(data),
        };
        (settings, failure)
    }

    pub fn timer(&self) -> TimerSettings {
        self.data.read().timer
    }

    pub async fn update_timer(&self, settings: TimerSettings) -> Result<TimerSettings> {
        let settings = settings.clamped();
        self.data.write().timer = settings;
        save_json(self.store.as_ref(), keys::TIMER_SETTINGS, &settings).await?;
        Ok(settings)
    }

    pub fn ambient(&self) -> AmbientSelection {
        self.data.read().ambient.clone()
    }

    pub async fn update_ambient(&self, selection: AmbientSelection) -> Result<()> {
        self.data.write().ambient = selection.clone();
        save_json(self.store.as_ref(), keys::AMBIENT_SOUND, &selection).await
    }

    pub fn volume(&self) -> f32 {
        self.data.read().volume
    }

    pub async fn update_volume(&self, volume: f32) -> Result<()> {
        let volume = volume.clamp(0.0, 1.0);
        self.data.write().volume = volume;
        save_json(self.store.as_ref(), keys::VOLUME, &volume).await
    }

    pub fn muted(&self) -> bool {
        self.data.read().muted
    }

    pub async fn update_muted(&self, muted: bool) -> Result<()> {
        self.data.write().muted = muted;
        save_json(self.store.as_ref(), keys::MUTED, &muted).await
    }

    pub fn theme(&self) -> Theme {
        self.data.read().theme
    }

    pub async fn update_theme(&self, theme: Theme) -> Result<()> {
        self.data.write().theme = theme;
        save_json(self.store.as_ref(), keys::THEME, &theme).await
    }

    pub fn current_task(&self) -> String {
        self.data.read().current_task.clone()
    }

    pub async fn update_current_task(&self, task: &str) -> Result<()> {
        let task = task.trim().to_string();
        self.data.write().current_task = task.clone();
        save_json(self.store.as_ref(), keys::CURRENT_TASK, &task).await
    }

    pub fn last_update_check(&self) -> Option<DateTime<Utc>> {
        self.data.read().last_update_check
    }

    pub async fn record_update_check(&self, at: DateTime<Utc>) -> Result<()> {
        self.data.write().last_update_check = Some(at);
        save_json(self.store.as_ref(), keys::LAST_UPDATE_CHECK, &at).await
    }

    pub fn has_seen_shortcuts(&self) -> bool {
        self.data.read().has_seen_shortcuts
    }

    pub async fn mark_shortcuts_seen(&self) -> Result<()> {
        self.data.write().has_seen_shortcuts = true;
        save_json(self.store.as_ref(), keys::HAS_SEEN_SHORTCUTS, &true).await
    }
}

async fn read_or_default<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
    failure: &mut Option<anyhow::Error>,
) -> Option<T> {
    match load_json(store, key).await {
        Ok(value) => value,
        Err(err) => {
            warn!("Using default for '{key}': {err:#}");
            failure.get_or_insert(err);
            None
        }
    }
}
