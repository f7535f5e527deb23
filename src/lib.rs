pub mod audio;
pub mod clock;
pub mod config;
pub mod db;
pub mod progress;
pub mod settings;
pub mod store;
pub mod timer;
pub mod utils;
pub mod view;
pub mod worker;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use log::{info, warn};

use audio::{AmbientCatalog, AmbientPlayer, AmbientSelection, AudioBackend, TrackLoader, UnlockPolicy};
use clock::{Clock, SystemClock};
use config::AppConfig;
use db::Database;
use progress::{load_progress, save_progress, ProgressRecord};
use settings::{SettingsStore, Theme, TimerSettings};
use store::{keys, load_json, KeyValueStore, MemoryStore};
use timer::{AdvancePolicy, Mode, SessionMachine, SessionSnapshot, SessionState, TimerController, TimerError};
use view::{render_all, LogView, ViewSink, NOTIFICATION_MS};
use worker::{CacheConfig, HttpNetwork, LogClientHost, RegisterOutcome, WorkerRegistration};

/// Minimum spacing between two update checks.
pub const UPDATE_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Everything the application context is built from.
pub struct AppDeps {
    pub store: Arc<dyn KeyValueStore>,
    pub backend: Arc<dyn AudioBackend>,
    pub loader: Arc<dyn TrackLoader>,
    pub view: Arc<dyn ViewSink>,
    pub clock: Arc<dyn Clock>,
    pub advance_policy: AdvancePolicy,
    pub unlock_policy: UnlockPolicy,
    /// Registration and the generation it should run, for update checks.
    pub registration: Option<(Arc<WorkerRegistration>, CacheConfig)>,
}

/// The single application instance. UI events call into it; it pushes state
/// back out through the [`ViewSink`].
pub struct AppContext {
    settings: Arc<SettingsStore>,
    timer: TimerController,
    ambient: Arc<AmbientPlayer>,
    view: Arc<dyn ViewSink>,
    clock: Arc<dyn Clock>,
    registration: Option<(Arc<WorkerRegistration>, CacheConfig)>,
}

impl AppContext {
    /// Loads preferences and progress, restores an interrupted session and
    /// renders the initial state. Unreadable storage falls back to defaults.
    pub async fn bootstrap(deps: AppDeps) -> Self {
        let AppDeps {
            store,
            backend,
            loader,
            view,
            clock,
            advance_policy,
            unlock_policy,
            registration,
        } = deps;

        let (settings, mut read_failure) = SettingsStore::load(store.clone()).await;
        let settings = Arc::new(settings);

        let today = clock.today();
        let progress = match load_progress(store.as_ref(), today).await {
            Ok(record) => record,
            Err(err) => {
                warn!("Starting with empty progress: {err:#}");
                read_failure.get_or_insert(err);
                ProgressRecord::fresh(today)
            }
        };
        // Write the reconciled record back so a second launch today does not
        // advance the streak again.
        let reconciled_saved = save_progress(store.as_ref(), &progress).await;

        let mut machine = SessionMachine::new(settings.timer(), progress, advance_policy);
        match load_json::<SessionSnapshot>(store.as_ref(), keys::SESSION).await {
            Ok(Some(snapshot)) => {
                if !machine.restore(&snapshot) {
                    warn!("Ignoring stale session snapshot {snapshot:?}");
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!("Could not read session snapshot: {err:#}");
                read_failure.get_or_insert(err);
            }
        }

        let ambient = Arc::new(AmbientPlayer::new(
            backend,
            loader,
            AmbientCatalog::default(),
            unlock_policy,
            settings.ambient(),
            settings.volume(),
            settings.muted(),
        ));

        let timer = TimerController::new(
            machine,
            ambient.clone(),
            store,
            view.clone(),
            clock.clone(),
        );
        if let Some(err) = read_failure {
            timer.report_storage_failure(err);
        }
        if let Err(err) = reconciled_saved {
            timer.report_storage_failure(err);
        }

        render_all(view.as_ref(), &timer.state().await);

        Self {
            settings,
            timer,
            ambient,
            view,
            clock,
            registration,
        }
    }

    pub fn timer(&self) -> &TimerController {
        &self.timer
    }

    pub fn ambient(&self) -> &Arc<AmbientPlayer> {
        &self.ambient
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub async fn state(&self) -> SessionState {
        self.timer.state().await
    }

    fn notify(&self, message: &str) {
        self.view.display_notification(message, NOTIFICATION_MS);
    }

    fn persisted(&self, result: Result<()>) {
        if let Err(err) = result {
            self.timer.report_storage_failure(err);
        }
    }

    /// Start/pause button. Counts as the gesture that unlocks audio.
    pub async fn toggle_start(&self) -> bool {
        self.ambient.unlock();
        self.timer.toggle_start().await
    }

    pub async fn reset(&self) {
        self.timer.reset().await;
    }

    pub async fn switch_mode(&self, mode: Mode) -> Result<(), TimerError> {
        let result = self.timer.switch_mode(mode).await;
        if let Err(err) = &result {
            self.notify(&err.to_string());
        }
        result
    }

    /// Stores the clamped durations and applies them to the timer.
    pub async fn update_settings(&self, requested: TimerSettings) -> TimerSettings {
        let applied = requested.clamped();
        self.persisted(self.settings.update_timer(applied).await.map(|_| ()));
        self.timer.update_settings(applied).await;
        applied
    }

    /// Keeps the user's choice persisted even when playback fails; the
    /// running player falls back to silence.
    pub async fn select_ambient(&self, selection: AmbientSelection) {
        self.ambient.unlock();
        self.persisted(self.settings.update_ambient(selection.clone()).await);

        let running = self.timer.is_running().await;
        if let Err(err) = self.ambient.select(selection, running).await {
            self.notify(&err.to_string());
        }
    }

    pub async fn set_volume(&self, volume: f32) -> f32 {
        let applied = self.ambient.set_volume(volume);
        self.persisted(self.settings.update_volume(applied).await);
        applied
    }

    pub async fn toggle_mute(&self) -> bool {
        let muted = self.ambient.toggle_mute();
        self.persisted(self.settings.update_muted(muted).await);
        muted
    }

    pub async fn preview_ambient(&self, track_id: &str) {
        self.ambient.unlock();
        if let Err(err) = self.ambient.preview(track_id).await {
            self.notify(&err.to_string());
        }
    }

    pub fn end_preview(&self) {
        self.ambient.end_preview();
    }

    pub async fn preload_audio(&self) -> usize {
        self.ambient.preload_all().await
    }

    pub async fn set_task(&self, task: &str) {
        self.persisted(self.settings.update_current_task(task).await);
    }

    pub async fn set_theme(&self, theme: Theme) {
        self.persisted(self.settings.update_theme(theme).await);
    }

    pub async fn mark_shortcuts_seen(&self) {
        self.persisted(self.settings.mark_shortcuts_seen().await);
    }

    /// Asks the worker registration for the configured cache generation, at
    /// most once per [`UPDATE_CHECK_INTERVAL`]. Returns `None` when skipped.
    pub async fn check_for_update(&self) -> Option<RegisterOutcome> {
        let (registration, cache) = self.registration.as_ref()?;

        let now = self.clock.now();
        if let Some(last) = self.settings.last_update_check() {
            let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
            if elapsed < UPDATE_CHECK_INTERVAL {
                return None;
            }
        }
        self.persisted(self.settings.record_update_check(now).await);

        match registration.register(cache.clone()).await {
            Ok(outcome) => {
                info!("Update check: {outcome:?}");
                Some(outcome)
            }
            Err(err) => {
                warn!("Update check failed: {err:#}");
                None
            }
        }
    }

    /// Page-unload equivalent: persists the in-flight session and silences audio.
    pub async fn shutdown(&self) {
        if let Err(err) = self.timer.persist().await {
            warn!("Failed to persist session on shutdown: {err:#}");
        }
        self.timer.shutdown().await;
    }
}

/// Headless entry point: SQLite in the data dir, network-backed cache worker,
/// logging view. Runs until Ctrl-C.
pub fn run() -> Result<()> {
    let (config, config_warnings) = AppConfig::load()?;
    utils::logging::init(config.debug);
    for warning in config_warnings {
        warn!("{warning}");
    }

    info!("FocusFlow starting up...");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(run_app(config))
}

async fn run_app(config: AppConfig) -> Result<()> {
    let (store, cache_storage): (Arc<dyn KeyValueStore>, Arc<dyn worker::CacheStorage>) =
        match Database::open_in(&config.data_dir) {
            Ok(database) => (Arc::new(database.clone()), Arc::new(database)),
            Err(err) => {
                warn!("Falling back to in-memory storage: {err:#}");
                (
                    Arc::new(MemoryStore::new()),
                    Arc::new(worker::MemoryCacheStorage::new()),
                )
            }
        };

    let registration = Arc::new(WorkerRegistration::new(
        config.origin.clone(),
        cache_storage,
        Arc::new(HttpNetwork::new()),
        Arc::new(LogClientHost),
    ));
    match registration.register(config.cache.clone()).await {
        Ok(outcome) => info!("Offline cache: {outcome:?}"),
        Err(err) => warn!("Offline cache unavailable: {err:#}"),
    }

    let app = Arc::new(
        AppContext::bootstrap(AppDeps {
            store,
            backend: Arc::new(audio::AudioEngineHandle::new()),
            loader: registration.clone(),
            view: Arc::new(LogView),
            clock: Arc::new(SystemClock),
            advance_policy: config.advance_policy,
            unlock_policy: config.unlock_policy,
            registration: Some((registration.clone(), config.cache.clone())),
        })
        .await,
    );

    let preloaded = app.preload_audio().await;
    info!("Preloaded {preloaded} ambient tracks");

    let updater = {
        let app = app.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(UPDATE_CHECK_INTERVAL);
            loop {
                interval.tick().await;
                app.check_for_update().await;
            }
        })
    };

    app.toggle_start().await;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    info!("Shutting down");
    updater.abort();
    app.shutdown().await;
    Ok(())
}
