use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Result;
use tokio::{sync::Mutex, task::JoinHandle, time};
use tokio_util::task::TaskTracker;

use crate::{
    audio::AmbientPlayer,
    clock::Clock,
    progress::{save_progress, ProgressRecord},
    settings::TimerSettings,
    store::{keys, save_json, KeyValueStore},
    view::{render_all, render_countdown, ViewSink, NOTIFICATION_MS},
};
use crate::{log_debug, log_info, log_warn};

use super::{Mode, PhaseCompletion, SessionMachine, SessionSnapshot, SessionState, Tick, TimerError};

const ENABLE_LOGS: bool = true;

pub const STORAGE_WARNING: &str =
    "Progress couldn't be saved. It will be kept until you close the app.";

/// Drives a [`SessionMachine`] in real time: owns the 1 s ticker and applies
/// every side effect of a transition (audio, persistence, view).
#[derive(Clone)]
pub struct TimerController {
    machine: Arc<Mutex<SessionMachine>>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    completions: TaskTracker,
    tick_interval: Duration,
    ambient: Arc<AmbientPlayer>,
    store: Arc<dyn KeyValueStore>,
    view: Arc<dyn ViewSink>,
    clock: Arc<dyn Clock>,
    storage_warned: Arc<AtomicBool>,
}

impl TimerController {
    pub fn new(
        machine: SessionMachine,
        ambient: Arc<AmbientPlayer>,
        store: Arc<dyn KeyValueStore>,
        view: Arc<dyn ViewSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            machine: Arc::new(Mutex::new(machine)),
            ticker: Arc::new(Mutex::new(None)),
            completions: TaskTracker::new(),
            tick_interval: Duration::from_secs(1),
            ambient,
            store,
            view,
            clock,
            storage_warned: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub async fn state(&self) -> SessionState {
        self.machine.lock().await.state()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.machine.lock().await.snapshot()
    }

    pub async fn progress_record(&self) -> ProgressRecord {
        self.machine.lock().await.progress_record().clone()
    }

    pub async fn is_running(&self) -> bool {
        self.machine.lock().await.is_running()
    }

    /// Starts the countdown and the ambient track. Returns false when it was
    /// already running.
    pub async fn start(&self) -> bool {
        let state = {
            let mut machine = self.machine.lock().await;
            if !machine.start() {
                return false;
            }
            machine.state()
        };

        self.spawn_ticker().await;
        render_all(self.view.as_ref(), &state);
        log_info!("{} started with {}s left", state.mode.label(), state.time_left_secs);

        self.play_ambient().await;
        true
    }

    pub async fn pause(&self) -> bool {
        let state = {
            let mut machine = self.machine.lock().await;
            if !machine.pause() {
                return false;
            }
            machine.state()
        };

        self.cancel_ticker().await;
        self.ambient.pause();
        render_all(self.view.as_ref(), &state);
        log_debug!("Paused with {}s left", state.time_left_secs);
        true
    }

    /// Returns whether the timer is running afterwards.
    pub async fn toggle_start(&self) -> bool {
        if self.is_running().await {
            self.pause().await;
            false
        } else {
            self.start().await
        }
    }

    pub async fn reset(&self) {
        let state = {
            let mut machine = self.machine.lock().await;
            machine.reset();
            machine.state()
        };

        self.cancel_ticker().await;
        self.ambient.pause();
        render_all(self.view.as_ref(), &state);
    }

    pub async fn switch_mode(&self, mode: Mode) -> Result<(), TimerError> {
        let state = {
            let mut machine = self.machine.lock().await;
            machine.switch_mode(mode)?;
            machine.state()
        };
        render_all(self.view.as_ref(), &state);
        Ok(())
    }

    /// Applies new durations. A paused timer reloads the current phase; a
    /// running one keeps counting and picks them up on the next phase.
    pub async fn update_settings(&self, settings: TimerSettings) {
        let state = {
            let mut machine = self.machine.lock().await;
            machine.apply_settings(settings);
            machine.state()
        };
        render_all(self.view.as_ref(), &state);
    }

    /// Rolls the daily counters when the calendar day changed since the last
    /// completion. Returns whether anything changed.
    pub async fn reconcile_day(&self) -> bool {
        let today = self.clock.today();
        let (changed, state) = {
            let mut machine = self.machine.lock().await;
            (machine.reconcile_day(today), machine.state())
        };
        if changed {
            render_all(self.view.as_ref(), &state);
        }
        changed
    }

    /// Writes progress and the in-flight session, e.g. before the app goes away.
    pub async fn persist(&self) -> Result<()> {
        let (record, snapshot) = {
            let machine = self.machine.lock().await;
            (machine.progress_record().clone(), machine.snapshot())
        };
        save_progress(self.store.as_ref(), &record).await?;
        save_json(self.store.as_ref(), keys::SESSION, &snapshot).await
    }

    pub async fn shutdown(&self) {
        self.settle().await;
        self.cancel_ticker().await;
        self.ambient.stop();
    }

    /// Waits until every completed phase has finished its side effects.
    pub async fn settle(&self) {
        self.completions.close();
        self.completions.wait().await;
        self.completions.reopen();
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let controller = self.clone();
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + tick_interval, tick_interval);
            loop {
                interval.tick().await;
                if !controller.handle_tick().await {
                    break;
                }
            }
        });

        *ticker_guard = Some(handle);
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }

    /// One second elapsed. Returns whether the ticker should keep going.
    ///
    /// A completed phase keeps this ticker only when the next phase starts on
    /// its own. The completion side effects run on their own task so a pause
    /// or start in the meantime, which replaces the ticker, cannot cut them
    /// short.
    async fn handle_tick(&self) -> bool {
        let today = self.clock.today();
        let (tick, state) = {
            let mut machine = self.machine.lock().await;
            let tick = machine.tick(today);
            (tick, machine.state())
        };

        match tick {
            Tick::Idle => false,
            Tick::Running { .. } => {
                render_countdown(self.view.as_ref(), &state);
                true
            }
            Tick::Completed(completion) => {
                let started = completion.auto_start && self.machine.lock().await.start();
                let controller = self.clone();
                self.completions
                    .spawn(async move { controller.finish_phase(completion).await });
                started
            }
        }
    }

    async fn finish_phase(&self, completion: PhaseCompletion) {
        log_info!(
            "{} complete, next {} (auto start: {})",
            completion.finished.label(),
            completion.next.label(),
            completion.auto_start
        );

        if let Err(err) = self.persist_completion(&completion).await {
            self.report_storage_failure(err);
        }

        self.view
            .display_notification(completion.message(), NOTIFICATION_MS);
        self.ambient.chime();

        let state = self.state().await;
        render_all(self.view.as_ref(), &state);

        if state.is_running {
            self.play_ambient().await;
        } else {
            self.ambient.pause();
        }
    }

    async fn persist_completion(&self, completion: &PhaseCompletion) -> Result<()> {
        save_progress(self.store.as_ref(), &completion.record).await?;
        save_json(self.store.as_ref(), keys::SESSION, &completion.snapshot).await
    }

    /// Logs a failed write. Only the first failure reaches the view.
    pub fn report_storage_failure(&self, err: anyhow::Error) {
        log_warn!("Failed to persist progress: {err:#}");
        if !self.storage_warned.swap(true, Ordering::SeqCst) {
            self.view.display_notification(STORAGE_WARNING, NOTIFICATION_MS);
        }
    }

    async fn play_ambient(&self) {
        if let Err(err) = self.ambient.play().await {
            self.view.display_notification(&err.to_string(), NOTIFICATION_MS);
        }
    }
}
