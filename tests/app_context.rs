mod common;

use std::sync::Arc;

use common::{day, origin, FakeBackend, FakeClientHost, FakeLoader, FakeNetwork, RecordingView};
use focusflow_lib::{
    audio::{AmbientSelection, UnlockPolicy},
    clock::FixedClock,
    progress::ProgressRecord,
    settings::{Theme, TimerSettings},
    store::{keys, save_json, MemoryStore},
    timer::{AdvancePolicy, Mode, SessionSnapshot, TimerError},
    worker::{CacheConfig, MemoryCacheStorage, RegisterOutcome, WorkerRegistration},
    AppContext, AppDeps,
};

struct World {
    store: Arc<MemoryStore>,
    view: Arc<RecordingView>,
    backend: Arc<FakeBackend>,
    loader: Arc<FakeLoader>,
    clock: Arc<FixedClock>,
}

impl World {
    fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            view: Arc::new(RecordingView::default()),
            backend: Arc::new(FakeBackend::default()),
            loader: Arc::new(FakeLoader::default()),
            clock: Arc::new(FixedClock::at_date(day(2026, 3, 2))),
        }
    }

    fn deps(&self) -> AppDeps {
        AppDeps {
            store: self.store.clone(),
            backend: self.backend.clone(),
            loader: self.loader.clone(),
            view: self.view.clone(),
            clock: self.clock.clone(),
            advance_policy: AdvancePolicy::default(),
            unlock_policy: UnlockPolicy::RequireGesture,
            registration: None,
        }
    }

    async fn boot(&self) -> AppContext {
        AppContext::bootstrap(self.deps()).await
    }
}

fn stored_progress(store: &MemoryStore) -> ProgressRecord {
    serde_json::from_str(&store.raw(keys::PROGRESS).unwrap()).unwrap()
}

#[tokio::test]
async fn startup_extends_streak_once_per_day() {
    let world = World::new();
    let yesterday = ProgressRecord {
        date: day(2026, 3, 1),
        sessions_today: 3,
        focus_minutes_today: 75,
        streak_days: 4,
        cycles_completed: 0,
    };
    save_json(world.store.as_ref(), keys::PROGRESS, &yesterday)
        .await
        .unwrap();

    let app = world.boot().await;
    let state = app.state().await;
    assert_eq!(state.streak_days, 5);
    assert_eq!(state.sessions_today, 0);
    assert_eq!(stored_progress(&world.store).date, day(2026, 3, 2));

    let again = world.boot().await;
    assert_eq!(again.state().await.streak_days, 5);
    assert_eq!(world.view.last_stats().unwrap().streak, 5);
}

#[tokio::test]
async fn interrupted_session_is_restored_paused() {
    let world = World::new();
    let snapshot = SessionSnapshot {
        mode: Mode::ShortBreak,
        time_left_secs: 120,
        total_secs: 300,
        session_index: 2,
    };
    save_json(world.store.as_ref(), keys::SESSION, &snapshot)
        .await
        .unwrap();

    let app = world.boot().await;
    let state = app.state().await;

    assert_eq!(state.mode, Mode::ShortBreak);
    assert_eq!(state.time_left_secs, 120);
    assert_eq!(state.session_index, 2);
    assert!(!state.is_running);
    assert_eq!(world.view.last_time().as_deref(), Some("02:00"));
}

#[tokio::test]
async fn start_gesture_unlocks_saved_ambient() {
    let world = World::new();
    save_json(world.store.as_ref(), keys::AMBIENT_SOUND, "rain")
        .await
        .unwrap();

    let app = world.boot().await;
    assert!(!app.ambient().is_unlocked());

    assert!(app.toggle_start().await);

    assert!(app.ambient().is_unlocked());
    assert_eq!(world.backend.plays.lock().len(), 1);
    assert!(world.view.notifications().is_empty());
    app.shutdown().await;
}

#[tokio::test]
async fn failed_selection_stays_persisted_but_plays_silence() {
    let world = World::new();
    world.loader.fail("fireplace");
    let app = world.boot().await;
    app.toggle_start().await;

    app.select_ambient(AmbientSelection::Track("fireplace".into()))
        .await;

    assert_eq!(app.ambient().selection(), AmbientSelection::Silent);
    assert_eq!(
        app.settings().ambient(),
        AmbientSelection::Track("fireplace".into())
    );
    assert_eq!(world.store.raw(keys::AMBIENT_SOUND).as_deref(), Some("\"fireplace\""));
    assert_eq!(
        world.view.notifications(),
        vec!["Ambient sound unavailable: Fireplace".to_string()]
    );
    app.shutdown().await;
}

#[tokio::test]
async fn settings_are_clamped_persisted_and_applied() {
    let world = World::new();
    let app = world.boot().await;

    let applied = app.update_settings(TimerSettings::new(90, 0, 45)).await;

    assert_eq!(applied, TimerSettings::new(60, 1, 30));
    assert_eq!(app.state().await.total_secs, 3600);
    let stored: TimerSettings =
        serde_json::from_str(&world.store.raw(keys::TIMER_SETTINGS).unwrap()).unwrap();
    assert_eq!(stored, applied);
}

#[tokio::test]
async fn switching_mode_while_running_is_reported() {
    let world = World::new();
    let app = world.boot().await;
    app.toggle_start().await;

    let result = app.switch_mode(Mode::LongBreak).await;

    assert_eq!(result, Err(TimerError::SwitchWhileRunning));
    assert_eq!(world.view.notifications().len(), 1);
    app.shutdown().await;
}

#[tokio::test]
async fn preferences_are_written_through() {
    let world = World::new();
    let app = world.boot().await;

    app.set_theme(Theme::Dark).await;
    app.set_task("  outline chapter 3 ").await;
    assert_eq!(app.set_volume(0.3).await, 0.3);
    assert!(app.toggle_mute().await);
    app.mark_shortcuts_seen().await;

    let reloaded = world.boot().await;
    let settings = reloaded.settings();
    assert_eq!(settings.theme(), Theme::Dark);
    assert_eq!(settings.current_task(), "outline chapter 3");
    assert_eq!(settings.volume(), 0.3);
    assert!(settings.muted());
    assert!(settings.has_seen_shortcuts());
    assert!(reloaded.ambient().is_muted());
}

#[tokio::test]
async fn storage_outage_is_announced_once() {
    let world = World::new();
    let app = world.boot().await;
    world.store.set_fail_writes(true);

    app.set_theme(Theme::Light).await;
    app.set_task("anything").await;

    assert_eq!(world.view.notifications().len(), 1);
    assert_eq!(app.settings().theme(), Theme::Light);
}

#[tokio::test]
async fn shutdown_saves_the_session() {
    let world = World::new();
    let app = world.boot().await;
    app.switch_mode(Mode::LongBreak).await.unwrap();

    app.shutdown().await;

    let snapshot: SessionSnapshot =
        serde_json::from_str(&world.store.raw(keys::SESSION).unwrap()).unwrap();
    assert_eq!(snapshot.mode, Mode::LongBreak);
    assert_eq!(snapshot.time_left_secs, 15 * 60);
}

#[tokio::test]
async fn update_checks_are_rate_limited() {
    let world = World::new();
    let network = Arc::new(FakeNetwork::serving_app());
    let registration = Arc::new(WorkerRegistration::new(
        origin(),
        Arc::new(MemoryCacheStorage::new()),
        network,
        Arc::new(FakeClientHost::default()),
    ));
    let mut deps = world.deps();
    deps.registration = Some((registration.clone(), CacheConfig::default().with_version("v4")));
    let app = AppContext::bootstrap(deps).await;

    assert_eq!(
        app.check_for_update().await,
        Some(RegisterOutcome::Activated("v4".into()))
    );
    assert_eq!(app.check_for_update().await, None);

    world.clock.advance(chrono::Duration::minutes(61));
    assert_eq!(app.check_for_update().await, Some(RegisterOutcome::Unchanged));
    assert_eq!(registration.active_version().as_deref(), Some("v4"));
}

#[tokio::test]
async fn unavailable_storage_still_boots_on_defaults() {
    let world = World::new();
    world.store.set_fail_reads(true);
    world.store.set_fail_writes(true);

    let app = world.boot().await;

    let state = app.state().await;
    assert_eq!(state.mode, Mode::Focus);
    assert_eq!(state.time_left_secs, 25 * 60);
    assert_eq!(state.sessions_today, 0);
    assert_eq!(app.settings().timer(), TimerSettings::default());
    assert_eq!(
        world.view.notifications(),
        vec![focusflow_lib::timer::controller::STORAGE_WARNING.to_string()]
    );

    assert!(app.toggle_start().await);
    assert!(app.state().await.is_running);
    app.shutdown().await;
    assert_eq!(world.view.notifications().len(), 1);
}
