//! Offline cache manager: versioned cache generations, per-request caching
//! strategies, control messages and push notifications.

pub mod clients;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod messages;
pub mod network;
pub mod push;
pub mod storage;
pub mod strategy;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use reqwest::Url;
use tokio::sync::{oneshot, Mutex};
use tokio_util::task::TaskTracker;

pub use clients::{ClientHost, ClientWindow, LogClientHost, Notification, NotificationAction};
pub use config::CacheConfig;
pub use http::{Request, RequestMode, Response};
pub use lifecycle::{CacheWorker, InstallError, WorkerState};
pub use messages::ControlMessage;
pub use network::{HttpNetwork, Network};
pub use push::ClickOutcome;
pub use storage::{CacheStorage, MemoryCacheStorage};
pub use strategy::Strategy;

use crate::audio::{AudioError, TrackInfo, TrackLoader};
use crate::{log_info, log_warn};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The requested version is already in control.
    Unchanged,
    Activated(String),
    /// Installed, waiting for `SKIP_WAITING`.
    Waiting(String),
}

/// Tracks the generation in control and at most one installed generation
/// waiting behind it.
pub struct WorkerRegistration {
    origin: Url,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    clients: Arc<dyn ClientHost>,
    active: RwLock<Option<Arc<CacheWorker>>>,
    waiting: RwLock<Option<Arc<CacheWorker>>>,
    lifecycle: Mutex<()>,
    snoozes: TaskTracker,
}

impl WorkerRegistration {
    pub fn new(
        origin: Url,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        clients: Arc<dyn ClientHost>,
    ) -> Self {
        Self {
            origin,
            storage,
            network,
            clients,
            active: RwLock::new(None),
            waiting: RwLock::new(None),
            lifecycle: Mutex::new(()),
            snoozes: TaskTracker::new(),
        }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn active(&self) -> Option<Arc<CacheWorker>> {
        self.active.read().clone()
    }

    pub fn active_version(&self) -> Option<String> {
        self.active.read().as_ref().map(|w| w.version().to_string())
    }

    pub fn waiting_version(&self) -> Option<String> {
        self.waiting.read().as_ref().map(|w| w.version().to_string())
    }

    /// Installs a generation for `config`. A failed install leaves whatever
    /// was in control untouched.
    pub async fn register(&self, config: CacheConfig) -> Result<RegisterOutcome> {
        let _lifecycle = self.lifecycle.lock().await;

        if self.active_version().as_deref() == Some(config.version.as_str()) {
            return Ok(RegisterOutcome::Unchanged);
        }
        if self.waiting_version().as_deref() == Some(config.version.as_str()) {
            return Ok(RegisterOutcome::Waiting(config.version));
        }

        let version = config.version.clone();
        let skip_waiting = config.skip_waiting;
        let worker = Arc::new(CacheWorker::new(
            config,
            self.origin.clone(),
            self.storage.clone(),
            self.network.clone(),
        ));
        worker
            .install()
            .await
            .with_context(|| format!("cache generation {version} failed to install"))?;

        let has_active = self.active.read().is_some();
        if skip_waiting || !has_active {
            self.promote(worker).await?;
            Ok(RegisterOutcome::Activated(version))
        } else {
            if let Some(previous) = self.waiting.write().replace(worker) {
                previous.mark_redundant();
            }
            log_info!("Cache generation {version} waiting for activation");
            Ok(RegisterOutcome::Waiting(version))
        }
    }

    async fn promote(&self, worker: Arc<CacheWorker>) -> Result<()> {
        let deleted = worker.activate(self.clients.as_ref()).await?;
        log_info!(
            "Cache generation {} active, evicted {} stale partitions",
            worker.version(),
            deleted.len()
        );
        if let Some(previous) = self.active.write().replace(worker) {
            previous.mark_redundant();
        }
        Ok(())
    }

    /// Promotes the waiting generation, if any.
    pub async fn skip_waiting(&self) -> Result<bool> {
        let _lifecycle = self.lifecycle.lock().await;
        let Some(worker) = self.waiting.write().take() else {
            return Ok(false);
        };
        self.promote(worker).await?;
        Ok(true)
    }

    /// Routes a request through the active generation, or straight to the
    /// network while nothing is in control.
    pub async fn fetch(&self, request: &Request) -> Response {
        if let Some(worker) = self.active() {
            return worker.handle_fetch(request).await;
        }
        match self.network.fetch(request).await {
            Ok(response) => response,
            Err(err) => {
                log_warn!("Uncontrolled fetch of {} failed: {err:#}", request.url);
                if request.is_navigation() {
                    Response::offline_page()
                } else {
                    Response::service_unavailable()
                }
            }
        }
    }

    /// Handles a control message. Only `GET_VERSION` answers, on `reply`.
    pub async fn post_message(
        &self,
        message: ControlMessage,
        reply: Option<oneshot::Sender<String>>,
    ) -> Result<()> {
        match message {
            ControlMessage::SkipWaiting => {
                self.skip_waiting().await?;
            }
            ControlMessage::GetVersion => {
                let version = self.active_version().unwrap_or_default();
                match reply {
                    Some(tx) => {
                        if tx.send(version).is_err() {
                            log_warn!("GET_VERSION requester went away");
                        }
                    }
                    None => log_warn!("GET_VERSION posted without a reply channel"),
                }
            }
            ControlMessage::ClearCache => {
                let cleared = self.clear_caches().await?;
                log_info!("Cleared {cleared} cache partitions");
            }
        }
        Ok(())
    }

    /// Deletes every cache partition, current generation included.
    pub async fn clear_caches(&self) -> Result<usize> {
        let mut cleared = 0;
        for name in self.storage.partitions().await? {
            if self.storage.delete(&name).await? {
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    pub async fn push(&self, payload: Option<&[u8]>) -> Result<()> {
        let notification = push::notification_for(payload);
        self.clients.show_notification(&notification).await
    }

    /// Reacts to a click on the reminder notification. Snoozing re-shows it
    /// after `SNOOZE_DELAY`; anything else brings an app window forward.
    pub async fn notification_click(&self, action: Option<&str>) -> Result<ClickOutcome> {
        if action == Some(push::ACTION_SNOOZE) {
            let clients = self.clients.clone();
            self.snoozes.spawn(async move {
                tokio::time::sleep(push::SNOOZE_DELAY).await;
                let notification = push::notification_for(None);
                if let Err(err) = clients.show_notification(&notification).await {
                    log_warn!("Snoozed reminder failed: {err:#}");
                }
            });
            return Ok(ClickOutcome::Snoozed);
        }

        if let Some(window) = self.clients.windows().await.into_iter().next() {
            self.clients.focus(&window.id).await?;
            return Ok(ClickOutcome::Focused(window.id));
        }

        let start_url = self
            .active()
            .map(|w| w.config().start_url.clone())
            .unwrap_or_else(|| "/".to_string());
        let url = self
            .origin
            .join(&start_url)
            .with_context(|| format!("invalid start url {start_url}"))?;
        self.clients.open_window(&url).await?;
        Ok(ClickOutcome::Opened(url.to_string()))
    }

    /// Waits for background revalidation and pending snoozes.
    pub async fn settle(&self) {
        if let Some(worker) = self.active() {
            worker.settle_background().await;
        }
        self.snoozes.close();
        self.snoozes.wait().await;
        self.snoozes.reopen();
    }
}

#[async_trait]
impl TrackLoader for WorkerRegistration {
    async fn load(&self, track: &TrackInfo) -> Result<Bytes, AudioError> {
        let url = self
            .origin
            .join(&track.path)
            .map_err(|err| AudioError::Unavailable(format!("{}: {err}", track.label)))?;
        let response = self.fetch(&Request::get(url)).await;
        if response.is_success() && !response.body.is_empty() {
            Ok(response.body)
        } else {
            Err(AudioError::Unavailable(format!(
                "{} ({})",
                track.label, response.status
            )))
        }
    }
}
