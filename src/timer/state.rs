use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{progress::ProgressRecord, settings::TimerSettings};

/// Focus phases per cycle; the last one is followed by a long break.
pub const SESSIONS_PER_CYCLE: u8 = 4;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    #[default]
    Focus,
    ShortBreak,
    LongBreak,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Focus => "Focus",
            Mode::ShortBreak => "Short break",
            Mode::LongBreak => "Long break",
        }
    }
}

/// What happens once a phase completes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum AdvancePolicy {
    /// Every next phase waits for the user.
    Manual,
    /// Every next phase starts immediately.
    Always,
    /// Phases chain automatically; the timer rests after a long break.
    #[default]
    UntilLongBreakEnds,
}

impl AdvancePolicy {
    pub fn auto_start_after(&self, finished: Mode) -> bool {
        match self {
            AdvancePolicy::Manual => false,
            AdvancePolicy::Always => true,
            AdvancePolicy::UntilLongBreakEnds => finished != Mode::LongBreak,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("pause the timer before switching modes")]
    SwitchWhileRunning,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub mode: Mode,
    pub time_left_secs: u32,
    pub total_secs: u32,
    pub is_running: bool,
    pub session_index: u8,
    pub sessions_today: u32,
    pub focus_minutes_today: u32,
    pub streak_days: u32,
}

impl SessionState {
    /// Fraction of the current phase already elapsed, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.total_secs == 0 {
            return 0.0;
        }
        (1.0 - f64::from(self.time_left_secs) / f64::from(self.total_secs)).clamp(0.0, 1.0)
    }
}

/// The persisted part of an in-flight session, restored paused at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub mode: Mode,
    pub time_left_secs: u32,
    pub total_secs: u32,
    pub session_index: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseCompletion {
    pub finished: Mode,
    pub next: Mode,
    pub auto_start: bool,
    pub record: ProgressRecord,
    pub snapshot: SessionSnapshot,
}

impl PhaseCompletion {
    pub fn message(&self) -> &'static str {
        match (self.finished, self.next) {
            (Mode::Focus, Mode::LongBreak) => "Cycle complete! Enjoy a long break.",
            (Mode::Focus, _) => "Focus session complete! Time for a short break.",
            (Mode::LongBreak, _) => "Long break over. Ready for a new cycle?",
            _ => "Break over. Back to focus!",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    /// Timer is paused; nothing changed.
    Idle,
    Running { time_left_secs: u32 },
    Completed(PhaseCompletion),
}

/// Pure Pomodoro state machine. All I/O happens in the caller.
#[derive(Debug, Clone)]
pub struct SessionMachine {
    mode: Mode,
    time_left_secs: u32,
    total_secs: u32,
    is_running: bool,
    session_index: u8,
    settings: TimerSettings,
    progress: ProgressRecord,
    policy: AdvancePolicy,
}

impl SessionMachine {
    pub fn new(settings: TimerSettings, progress: ProgressRecord, policy: AdvancePolicy) -> Self {
        let total_secs = settings.seconds_for(Mode::Focus);
        Self {
            mode: Mode::Focus,
            time_left_secs: total_secs,
            total_secs,
            is_running: false,
            session_index: 1,
            settings,
            progress,
            policy,
        }
    }

    /// Restores a persisted snapshot. Snapshots that break the invariants are ignored.
    pub fn restore(&mut self, snapshot: &SessionSnapshot) -> bool {
        let index_ok = (1..=SESSIONS_PER_CYCLE).contains(&snapshot.session_index);
        if !index_ok || snapshot.total_secs == 0 || snapshot.time_left_secs > snapshot.total_secs
        {
            return false;
        }

        self.mode = snapshot.mode;
        self.total_secs = snapshot.total_secs;
        self.time_left_secs = snapshot.time_left_secs;
        self.session_index = snapshot.session_index;
        self.is_running = false;
        true
    }

    pub fn state(&self) -> SessionState {
        SessionState {
            mode: self.mode,
            time_left_secs: self.time_left_secs,
            total_secs: self.total_secs,
            is_running: self.is_running,
            session_index: self.session_index,
            sessions_today: self.progress.sessions_today,
            focus_minutes_today: self.progress.focus_minutes_today,
            streak_days: self.progress.streak_days,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.mode,
            time_left_secs: self.time_left_secs,
            total_secs: self.total_secs,
            session_index: self.session_index,
        }
    }

    pub fn progress_record(&self) -> &ProgressRecord {
        &self.progress
    }

    pub fn settings(&self) -> TimerSettings {
        self.settings
    }

    pub fn policy(&self) -> AdvancePolicy {
        self.policy
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Returns `false` when already running; a second start is a no-op.
    pub fn start(&mut self) -> bool {
        if self.is_running {
            return false;
        }
        if self.time_left_secs == 0 {
            self.time_left_secs = self.total_secs;
        }
        self.is_running = true;
        true
    }

    /// Returns `false` when already paused.
    pub fn pause(&mut self) -> bool {
        if !self.is_running {
            return false;
        }
        self.is_running = false;
        true
    }

    pub fn reset(&mut self) {
        self.is_running = false;
        self.time_left_secs = self.total_secs;
    }

    pub fn switch_mode(&mut self, target: Mode) -> Result<(), TimerError> {
        if self.is_running {
            return Err(TimerError::SwitchWhileRunning);
        }
        self.load_mode(target);
        Ok(())
    }

    /// Stores new lengths. A paused timer reloads its current phase right away;
    /// a running one keeps counting and picks them up at the next phase.
    pub fn apply_settings(&mut self, settings: TimerSettings) {
        self.settings = settings.clamped();
        if !self.is_running {
            self.load_mode(self.mode);
        }
    }

    /// Rolls the daily counters forward when the calendar day changed.
    pub fn reconcile_day(&mut self, today: NaiveDate) -> bool {
        if !self.progress.is_rollover(today) {
            return false;
        }
        self.progress = self.progress.reconcile(today);
        true
    }

    pub fn tick(&mut self, today: NaiveDate) -> Tick {
        if !self.is_running {
            return Tick::Idle;
        }

        self.time_left_secs = self.time_left_secs.saturating_sub(1);
        if self.time_left_secs == 0 {
            Tick::Completed(self.complete(today))
        } else {
            Tick::Running {
                time_left_secs: self.time_left_secs,
            }
        }
    }

    /// Ends the current phase and moves to the next one, paused.
    pub fn complete(&mut self, today: NaiveDate) -> PhaseCompletion {
        self.is_running = false;
        self.reconcile_day(today);

        let finished = self.mode;
        let next = match finished {
            Mode::Focus => {
                // Credit the phase that ran, even if settings changed meanwhile.
                self.progress.record_focus(self.total_secs / 60);
                if self.session_index >= SESSIONS_PER_CYCLE {
                    self.session_index = 1;
                    Mode::LongBreak
                } else {
                    self.session_index += 1;
                    Mode::ShortBreak
                }
            }
            Mode::ShortBreak => Mode::Focus,
            Mode::LongBreak => {
                self.progress.record_cycle();
                Mode::Focus
            }
        };
        self.progress.refresh_streak();
        self.load_mode(next);

        PhaseCompletion {
            finished,
            next,
            auto_start: self.policy.auto_start_after(finished),
            record: self.progress.clone(),
            snapshot: self.snapshot(),
        }
    }

    fn load_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.total_secs = self.settings.seconds_for(mode);
        self.time_left_secs = self.total_secs;
    }
}
