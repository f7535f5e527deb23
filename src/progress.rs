//! Daily progress counters and the streak they feed.
//!
//! One record exists per install. Its `date` marks the calendar day the
//! counters belong to; moving to a later day reconciles the streak and
//! clears the daily counters.

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::store::{keys, load_json, save_json, KeyValueStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub date: NaiveDate,
    pub sessions_today: u32,
    pub focus_minutes_today: u32,
    pub streak_days: u32,
    pub cycles_completed: u32,
}

impl ProgressRecord {
    pub fn fresh(today: NaiveDate) -> Self {
        Self {
            date: today,
            sessions_today: 0,
            focus_minutes_today: 0,
            streak_days: 0,
            cycles_completed: 0,
        }
    }

    /// Carries the record forward to `today`.
    ///
    /// Same day: unchanged. Previous day with at least one session: streak + 1.
    /// Previous day without sessions: streak broken. Any larger gap (or a date in
    /// the future): streak restarts at 1 only if today already has sessions.
    pub fn reconcile(&self, today: NaiveDate) -> Self {
        if self.date == today {
            return self.clone();
        }

        let gap_days = (today - self.date).num_days();
        let streak_days = if gap_days == 1 {
            if self.sessions_today > 0 {
                self.streak_days.saturating_add(1)
            } else {
                0
            }
        } else {
            // Today's counters start empty, so a broken streak lands on 0 here;
            // the first completion of the day lifts it back to 1.
            0
        };

        Self {
            date: today,
            sessions_today: 0,
            focus_minutes_today: 0,
            streak_days,
            cycles_completed: 0,
        }
    }

    pub fn is_rollover(&self, today: NaiveDate) -> bool {
        self.date != today
    }

    /// Counts one finished focus phase.
    pub fn record_focus(&mut self, minutes: u32) {
        self.sessions_today = self.sessions_today.saturating_add(1);
        self.focus_minutes_today = self.focus_minutes_today.saturating_add(minutes);
        self.refresh_streak();
    }

    pub fn record_cycle(&mut self) {
        self.cycles_completed = self.cycles_completed.saturating_add(1);
    }

    /// A day with sessions always counts towards the streak.
    pub fn refresh_streak(&mut self) {
        if self.sessions_today > 0 && self.streak_days == 0 {
            self.streak_days = 1;
        }
    }
}

/// Reads the persisted record and reconciles it against `today`.
pub async fn load_progress(store: &dyn KeyValueStore, today: NaiveDate) -> Result<ProgressRecord> {
    let stored: Option<ProgressRecord> = load_json(store, keys::PROGRESS).await?;
    Ok(match stored {
        Some(record) => record.reconcile(today),
        None => ProgressRecord::fresh(today),
    })
}

pub async fn save_progress(store: &dyn KeyValueStore, record: &ProgressRecord) -> Result<()> {
    save_json(store, keys::PROGRESS, record).await
}
