#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use parking_lot::Mutex;
use tokio::sync::Notify;

use focusflow_lib::{
    audio::{
        AmbientCatalog, AmbientPlayer, AmbientSelection, AudioBackend, AudioError, Output,
        TrackInfo, TrackLoader, UnlockPolicy,
    },
    store::{KeyValueStore, MemoryStore},
    view::{StatsView, ViewSink},
    worker::{
        CacheConfig, ClientHost, ClientWindow, MemoryCacheStorage, Network, Notification, Request,
        Response,
    },
};

pub const ORIGIN: &str = "https://focus.example";

pub fn origin() -> reqwest::Url {
    reqwest::Url::parse(ORIGIN).unwrap()
}

pub fn get(path: &str) -> Request {
    Request::get(origin().join(path).unwrap())
}

pub fn navigate(path: &str) -> Request {
    Request::navigate(origin().join(path).unwrap())
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn body(response: &Response) -> String {
    String::from_utf8(response.body.to_vec()).unwrap()
}

/// Network fake keyed by URL path, with per-path call counters.
#[derive(Default)]
pub struct FakeNetwork {
    routes: Mutex<HashMap<String, Response>>,
    failing: Mutex<HashSet<String>>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves every shell asset and ambient track of the default config.
    pub fn serving_app() -> Self {
        let network = Self::new();
        let config = CacheConfig::default();
        for path in &config.shell_assets {
            network.serve(path, &format!("shell {path}"));
        }
        for path in &config.audio_assets {
            network.serve_audio(path, &format!("audio {path}"));
        }
        network
    }

    pub fn serve(&self, path: &str, body: &str) {
        self.routes.lock().insert(
            path.to_string(),
            Response::ok("text/plain", Bytes::from(body.to_string())),
        );
    }

    pub fn serve_audio(&self, path: &str, body: &str) {
        self.routes.lock().insert(
            path.to_string(),
            Response::ok("audio/mpeg", Bytes::from(body.to_string())),
        );
    }

    pub fn fail(&self, path: &str) {
        self.failing.lock().insert(path.to_string());
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls.lock().iter().filter(|p| p.as_str() == path).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let path = request.url.path().to_string();
        self.calls.lock().push(path.clone());

        if self.offline.load(Ordering::SeqCst) || self.failing.lock().contains(&path) {
            bail!("network unreachable for {path}");
        }
        Ok(self
            .routes
            .lock()
            .get(&path)
            .cloned()
            .unwrap_or_else(|| {
                Response::new(reqwest::StatusCode::NOT_FOUND, None, Bytes::new())
            }))
    }
}

/// Storage that refuses writes into one chosen partition.
#[derive(Default)]
pub struct FlakyStorage {
    pub inner: MemoryCacheStorage,
    refuse: Mutex<Option<String>>,
}

impl FlakyStorage {
    pub fn refuse_writes_to(&self, partition: &str) {
        *self.refuse.lock() = Some(partition.to_string());
    }
}

#[async_trait]
impl focusflow_lib::worker::CacheStorage for FlakyStorage {
    async fn open(&self, partition: &str) -> Result<()> {
        self.inner.open(partition).await
    }

    async fn lookup(&self, partition: &str, url: &str) -> Result<Option<Response>> {
        self.inner.lookup(partition, url).await
    }

    async fn store(&self, partition: &str, url: &str, response: &Response) -> Result<()> {
        if self.refuse.lock().as_deref() == Some(partition) {
            bail!("quota exceeded in {partition}");
        }
        self.inner.store(partition, url, response).await
    }

    async fn partitions(&self) -> Result<Vec<String>> {
        self.inner.partitions().await
    }

    async fn delete(&self, partition: &str) -> Result<bool> {
        self.inner.delete(partition).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayCall {
    pub output: Output,
    pub clip: Bytes,
    pub looped: bool,
    pub volume: f32,
}

#[derive(Default)]
pub struct FakeBackend {
    pub plays: Mutex<Vec<PlayCall>>,
    pub pauses: AtomicUsize,
    pub resumes: AtomicUsize,
    pub stops: Mutex<Vec<Output>>,
    pub volumes: Mutex<Vec<(Output, f32)>>,
    pub chimes: AtomicUsize,
    pub fail_play: AtomicBool,
    hold_play: AtomicBool,
    pub play_entered: Notify,
    pub play_release: Notify,
}

impl FakeBackend {
    pub fn plays_on(&self, output: Output) -> usize {
        self.plays.lock().iter().filter(|c| c.output == output).count()
    }

    pub fn chime_count(&self) -> usize {
        self.chimes.load(Ordering::SeqCst)
    }

    /// Makes every play wait for `play_release` before it is accepted.
    pub fn hold_plays(&self) {
        self.hold_play.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AudioBackend for FakeBackend {
    async fn play(
        &self,
        output: Output,
        clip: Bytes,
        looped: bool,
        volume: f32,
    ) -> Result<(), AudioError> {
        if self.hold_play.load(Ordering::SeqCst) {
            self.play_entered.notify_one();
            self.play_release.notified().await;
        }
        if self.fail_play.load(Ordering::SeqCst) {
            return Err(AudioError::Device("no output device".into()));
        }
        self.plays.lock().push(PlayCall {
            output,
            clip,
            looped,
            volume,
        });
        Ok(())
    }

    fn pause(&self, _output: Output) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
    }

    fn resume(&self, _output: Output) {
        self.resumes.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&self, output: Output) {
        self.stops.lock().push(output);
    }

    fn set_volume(&self, output: Output, volume: f32) {
        self.volumes.lock().push((output, volume));
    }

    fn chime(&self, _volume: f32) -> Result<(), AudioError> {
        self.chimes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Track loader that can fail chosen tracks or hold every load until released.
#[derive(Default)]
pub struct FakeLoader {
    failing: Mutex<HashSet<String>>,
    hold: AtomicBool,
    pub entered: Notify,
    pub release: Notify,
    pub loads: AtomicUsize,
}

impl FakeLoader {
    pub fn fail(&self, id: &str) {
        self.failing.lock().insert(id.to_string());
    }

    pub fn hold_loads(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrackLoader for FakeLoader {
    async fn load(&self, track: &TrackInfo) -> Result<Bytes, AudioError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.hold.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        if self.failing.lock().contains(&track.id) {
            return Err(AudioError::Unavailable(track.label.clone()));
        }
        Ok(Bytes::from(format!("clip:{}", track.id)))
    }
}

#[derive(Default)]
pub struct RecordingView {
    pub notifications: Mutex<Vec<String>>,
    pub stats: Mutex<Vec<StatsView>>,
    pub times: Mutex<Vec<String>>,
    pub progress: Mutex<Vec<f64>>,
}

impl RecordingView {
    pub fn notifications(&self) -> Vec<String> {
        self.notifications.lock().clone()
    }

    pub fn last_time(&self) -> Option<String> {
        self.times.lock().last().cloned()
    }

    pub fn last_stats(&self) -> Option<StatsView> {
        self.stats.lock().last().cloned()
    }
}

impl ViewSink for RecordingView {
    fn display_notification(&self, message: &str, _duration_ms: u64) {
        self.notifications.lock().push(message.to_string());
    }

    fn display_stats(&self, stats: &StatsView) {
        self.stats.lock().push(stats.clone());
    }

    fn display_time(&self, clock: &str) {
        self.times.lock().push(clock.to_string());
    }

    fn display_progress(&self, fraction: f64) {
        self.progress.lock().push(fraction);
    }
}

#[derive(Default)]
pub struct FakeClientHost {
    pub claims: Mutex<Vec<String>>,
    pub windows: Mutex<Vec<ClientWindow>>,
    pub focused: Mutex<Vec<String>>,
    pub opened: Mutex<Vec<String>>,
    pub notifications: Mutex<Vec<Notification>>,
}

impl FakeClientHost {
    pub fn with_window(id: &str) -> Self {
        let host = Self::default();
        host.windows.lock().push(ClientWindow {
            id: id.to_string(),
            url: format!("{ORIGIN}/"),
            focused: false,
        });
        host
    }
}

#[async_trait]
impl ClientHost for FakeClientHost {
    async fn claim(&self, version: &str) {
        self.claims.lock().push(version.to_string());
    }

    async fn windows(&self) -> Vec<ClientWindow> {
        self.windows.lock().clone()
    }

    async fn focus(&self, id: &str) -> Result<()> {
        self.focused.lock().push(id.to_string());
        Ok(())
    }

    async fn open_window(&self, url: &reqwest::Url) -> Result<()> {
        self.opened.lock().push(url.to_string());
        Ok(())
    }

    async fn show_notification(&self, notification: &Notification) -> Result<()> {
        self.notifications.lock().push(notification.clone());
        Ok(())
    }
}

pub fn player(
    backend: Arc<FakeBackend>,
    loader: Arc<FakeLoader>,
    policy: UnlockPolicy,
    selection: AmbientSelection,
) -> Arc<AmbientPlayer> {
    Arc::new(AmbientPlayer::new(
        backend,
        loader,
        AmbientCatalog::default(),
        policy,
        selection,
        0.5,
        false,
    ))
}

/// Preference store whose writes wait for `release_writes` while held.
#[derive(Default)]
pub struct GatedStore {
    pub inner: MemoryStore,
    hold: AtomicBool,
    pub entered: Notify,
    release: Notify,
}

impl GatedStore {
    pub fn hold_writes(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub fn release_writes(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.release.notify_one();
    }
}

#[async_trait]
impl KeyValueStore for GatedStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        if self.hold.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.put(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key).await
    }
}
