//! Ambient track selection, looped playback, hover previews and the chime.

use std::{collections::HashMap, sync::Arc, time::Duration};

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{
    channel::{AudioChannel, ChannelState},
    tracks::{AmbientCatalog, AmbientSelection, TrackInfo, TrackLoader},
    AudioBackend, AudioError, Output,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

pub const PREVIEW_DURATION: Duration = Duration::from_secs(3);

/// Whether non-silent playback must wait for a user gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum UnlockPolicy {
    #[default]
    RequireGesture,
    Eager,
}

struct AmbientState {
    selection: AmbientSelection,
    volume: f32,
    muted: bool,
    unlocked: bool,
    ambient: AudioChannel,
    preview: AudioChannel,
    preloaded: HashMap<String, Bytes>,
}

impl AmbientState {
    fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }
}

pub struct AmbientPlayer {
    backend: Arc<dyn AudioBackend>,
    loader: Arc<dyn TrackLoader>,
    catalog: AmbientCatalog,
    policy: UnlockPolicy,
    state: Mutex<AmbientState>,
    preview_cancel: Mutex<Option<CancellationToken>>,
}

impl AmbientPlayer {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        loader: Arc<dyn TrackLoader>,
        catalog: AmbientCatalog,
        policy: UnlockPolicy,
        selection: AmbientSelection,
        volume: f32,
        muted: bool,
    ) -> Self {
        Self {
            backend,
            loader,
            catalog,
            policy,
            state: Mutex::new(AmbientState {
                selection,
                volume: volume.clamp(0.0, 1.0),
                muted,
                unlocked: policy == UnlockPolicy::Eager,
                ambient: AudioChannel::new(),
                preview: AudioChannel::new(),
                preloaded: HashMap::new(),
            }),
            preview_cancel: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> UnlockPolicy {
        self.policy
    }

    pub fn catalog(&self) -> &AmbientCatalog {
        &self.catalog
    }

    pub fn selection(&self) -> AmbientSelection {
        self.state.lock().selection.clone()
    }

    pub fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    pub fn is_muted(&self) -> bool {
        self.state.lock().muted
    }

    pub fn is_unlocked(&self) -> bool {
        self.state.lock().unlocked
    }

    pub fn channel_state(&self) -> ChannelState {
        self.state.lock().ambient.state().clone()
    }

    pub fn preview_state(&self) -> ChannelState {
        self.state.lock().preview.state().clone()
    }

    /// Records the one-time user gesture that allows playback.
    pub fn unlock(&self) {
        let mut st = self.state.lock();
        if !st.unlocked {
            log_debug!("Ambient playback unlocked");
            st.unlocked = true;
        }
    }

    /// Switches the ambient track. Starts it right away when the timer runs.
    pub async fn select(
        &self,
        selection: AmbientSelection,
        timer_running: bool,
    ) -> Result<(), AudioError> {
        if let Some(id) = selection.track_id() {
            if self.catalog.get(id).is_none() {
                return Err(AudioError::Unavailable(id.to_string()));
            }
        }

        self.stop();
        self.state.lock().selection = selection.clone();

        if timer_running && selection != AmbientSelection::Silent {
            self.play().await
        } else {
            Ok(())
        }
    }

    /// Starts (or resumes) the selected track, looped.
    ///
    /// Any failure degrades the player to silent; the caller decides how to
    /// surface the returned error.
    pub async fn play(&self) -> Result<(), AudioError> {
        let (ticket, track, cached) = {
            let mut st = self.state.lock();
            let Some(id) = st.selection.track_id().map(str::to_string) else {
                return Ok(());
            };

            let resumable =
                matches!(st.ambient.state(), ChannelState::Paused { track } if *track == id);
            if resumable {
                st.ambient.resume();
                self.backend.resume(Output::Ambient);
                return Ok(());
            }
            let active = matches!(
                st.ambient.state(),
                ChannelState::Playing { track } | ChannelState::Loading { track } if *track == id
            );
            if active {
                return Ok(());
            }

            if !st.unlocked {
                log_info!("Ambient playback of '{id}' blocked until a user gesture");
                st.selection = AmbientSelection::Silent;
                return Err(AudioError::Blocked);
            }

            let Some(track) = self.catalog.get(&id).cloned() else {
                st.selection = AmbientSelection::Silent;
                return Err(AudioError::Unavailable(id));
            };

            let ticket = st.ambient.begin_load(&id);
            let cached = st.preloaded.get(&id).cloned();
            (ticket, track, cached)
        };

        let clip = match cached {
            Some(clip) => clip,
            None => match self.loader.load(&track).await {
                Ok(clip) => clip,
                Err(err) => {
                    let mut st = self.state.lock();
                    if st.ambient.fail(ticket) {
                        st.selection = AmbientSelection::Silent;
                        log_warn!("Ambient track '{}' failed to load: {err}", track.id);
                        return Err(err);
                    }
                    return Ok(());
                }
            },
        };

        let volume = {
            let mut st = self.state.lock();
            st.preloaded.insert(track.id.clone(), clip.clone());
            if !st.ambient.is_current(ticket) {
                log_debug!("Dropping superseded load of '{}'", track.id);
                return Ok(());
            }
            st.effective_volume()
        };

        let played = self.backend.play(Output::Ambient, clip, true, volume).await;

        let mut st = self.state.lock();
        if !st.ambient.is_current(ticket) {
            // Stopped while the output was starting; the stop may have
            // reached the backend before the clip did.
            if matches!(st.ambient.state(), ChannelState::Idle | ChannelState::Failed { .. }) {
                self.backend.stop(Output::Ambient);
            }
            return Ok(());
        }
        match played {
            Ok(()) => {
                st.ambient.finish_load(ticket);
                let current = st.effective_volume();
                if current != volume {
                    self.backend.set_volume(Output::Ambient, current);
                }
                log_info!("Ambient track '{}' playing", track.id);
                Ok(())
            }
            Err(err) => {
                st.ambient.fail(ticket);
                st.selection = AmbientSelection::Silent;
                log_warn!("Ambient track '{}' failed to play: {err}", track.id);
                Err(err)
            }
        }
    }

    /// Pauses the loop. A load still in flight is cancelled instead.
    pub fn pause(&self) {
        let mut st = self.state.lock();
        match st.ambient.state().clone() {
            ChannelState::Playing { .. } => {
                st.ambient.pause();
                self.backend.pause(Output::Ambient);
            }
            ChannelState::Loading { .. } => {
                st.ambient.stop();
                self.backend.stop(Output::Ambient);
            }
            _ => {}
        }
    }

    pub fn stop(&self) {
        let mut st = self.state.lock();
        st.ambient.stop();
        self.backend.stop(Output::Ambient);
    }

    pub fn set_volume(&self, volume: f32) -> f32 {
        let mut st = self.state.lock();
        st.volume = volume.clamp(0.0, 1.0);
        self.apply_volume(&st);
        st.volume
    }

    /// Returns the new mute flag.
    pub fn toggle_mute(&self) -> bool {
        let mut st = self.state.lock();
        st.muted = !st.muted;
        self.apply_volume(&st);
        st.muted
    }

    fn apply_volume(&self, st: &AmbientState) {
        let volume = st.effective_volume();
        self.backend.set_volume(Output::Ambient, volume);
        self.backend.set_volume(Output::Preview, volume);
    }

    /// Phase-complete chime on its own lane.
    pub fn chime(&self) {
        let volume = self.state.lock().effective_volume();
        if volume <= 0.0 {
            return;
        }
        if let Err(err) = self.backend.chime(volume) {
            log_warn!("Chime failed: {err}");
        }
    }

    /// Short one-shot playback for hover intent. Never touches the selection.
    pub async fn preview(self: &Arc<Self>, track_id: &str) -> Result<(), AudioError> {
        self.end_preview();

        let track = self
            .catalog
            .get(track_id)
            .cloned()
            .ok_or_else(|| AudioError::Unavailable(track_id.to_string()))?;

        let (ticket, cached) = {
            let mut st = self.state.lock();
            if !st.unlocked {
                return Err(AudioError::Blocked);
            }
            let ticket = st.preview.begin_load(&track.id);
            (ticket, st.preloaded.get(&track.id).cloned())
        };

        let clip = match cached {
            Some(clip) => clip,
            None => {
                let loaded = self.loader.load(&track).await;
                let mut st = self.state.lock();
                match loaded {
                    Ok(clip) => {
                        st.preloaded.insert(track.id.clone(), clip.clone());
                        clip
                    }
                    Err(err) => {
                        st.preview.fail(ticket);
                        return Err(err);
                    }
                }
            }
        };

        let volume = {
            let st = self.state.lock();
            if !st.preview.is_current(ticket) {
                return Ok(());
            }
            st.effective_volume()
        };

        let played = self.backend.play(Output::Preview, clip, false, volume).await;

        {
            let mut st = self.state.lock();
            if !st.preview.is_current(ticket) {
                if *st.preview.state() == ChannelState::Idle {
                    self.backend.stop(Output::Preview);
                }
                return Ok(());
            }
            if let Err(err) = played {
                st.preview.fail(ticket);
                return Err(err);
            }
            st.preview.finish_load(ticket);
        }

        let token = CancellationToken::new();
        *self.preview_cancel.lock() = Some(token.clone());

        let player = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(PREVIEW_DURATION) => player.end_preview(),
                _ = token.cancelled() => {}
            }
        });

        Ok(())
    }

    /// Stops a running preview (pointer left, or the time bound elapsed).
    pub fn end_preview(&self) {
        if let Some(token) = self.preview_cancel.lock().take() {
            token.cancel();
        }
        let mut st = self.state.lock();
        if *st.preview.state() != ChannelState::Idle {
            st.preview.stop();
            self.backend.stop(Output::Preview);
        }
    }

    /// Warms the in-memory clip cache. Per-track failures are skipped.
    pub async fn preload_all(&self) -> usize {
        let pending: Vec<TrackInfo> = {
            let st = self.state.lock();
            self.catalog
                .tracks()
                .iter()
                .filter(|t| !st.preloaded.contains_key(&t.id))
                .cloned()
                .collect()
        };

        let mut loaded = 0;
        for track in pending {
            match self.loader.load(&track).await {
                Ok(clip) => {
                    self.state.lock().preloaded.insert(track.id.clone(), clip);
                    loaded += 1;
                }
                Err(err) => log_warn!("Preload of '{}' skipped: {err}", track.id),
            }
        }
        loaded
    }
}
