use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use reqwest::{StatusCode, Url};
use thiserror::Error;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use super::{
    clients::ClientHost,
    config::CacheConfig,
    http::{Request, Response},
    network::Network,
    storage::CacheStorage,
    strategy::{classify, Strategy},
};
use crate::{log_debug, log_error, log_info, log_warn};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("invalid asset path '{path}': {message}")]
    InvalidPath { path: String, message: String },
    #[error("failed to fetch '{path}': {message}")]
    Fetch { path: String, message: String },
    #[error("'{path}' answered {status}")]
    Status { path: String, status: StatusCode },
    #[error("cache storage failed: {0}")]
    Storage(String),
}

/// One cache generation. Owns the `static-{version}` and `audio-{version}`
/// partitions and answers intercepted requests once activated.
pub struct CacheWorker {
    id: Uuid,
    config: CacheConfig,
    origin: Url,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    state: RwLock<WorkerState>,
    background: TaskTracker,
}

impl CacheWorker {
    pub fn new(
        config: CacheConfig,
        origin: Url,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            origin,
            storage,
            network,
            state: RwLock::new(WorkerState::Installing),
            background: TaskTracker::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read()
    }

    pub(crate) fn mark_redundant(&self) {
        *self.state.write() = WorkerState::Redundant;
    }

    fn set_state(&self, state: WorkerState) {
        *self.state.write() = state;
    }

    fn resolve(&self, path: &str) -> Result<Url, InstallError> {
        self.origin
            .join(path)
            .map_err(|err| InstallError::InvalidPath {
                path: path.to_string(),
                message: err.to_string(),
            })
    }

    /// Precaches the app shell (all-or-nothing) and then the ambient tracks
    /// (best-effort). A failed install leaves the worker redundant and no
    /// partial static partition behind.
    pub async fn install(&self) -> Result<(), InstallError> {
        self.set_state(WorkerState::Installing);
        log_info!("Installing cache generation {} ({})", self.config.version, self.id);

        let result = self.precache_shell().await;
        if let Err(err) = result {
            log_error!("Install of {} failed: {err}", self.config.version);
            self.mark_redundant();
            return Err(err);
        }

        self.precache_audio().await;

        self.set_state(WorkerState::Installed);
        log_info!("Cache generation {} installed", self.config.version);
        Ok(())
    }

    async fn precache_shell(&self) -> Result<(), InstallError> {
        // Fetch everything before touching storage so a network failure leaves nothing behind.
        let mut fetched = Vec::with_capacity(self.config.shell_assets.len());
        for path in &self.config.shell_assets {
            let request = Request::get(self.resolve(path)?);
            let response = self
                .network
                .fetch(&request)
                .await
                .map_err(|err| InstallError::Fetch {
                    path: path.clone(),
                    message: format!("{err:#}"),
                })?;
            if !response.is_success() {
                return Err(InstallError::Status {
                    path: path.clone(),
                    status: response.status,
                });
            }
            fetched.push((request.cache_key(), response));
        }

        let partition = self.config.static_partition();
        let stored: Result<()> = async {
            self.storage.open(&partition).await?;
            for (key, response) in &fetched {
                self.storage.store(&partition, key, response).await?;
            }
            Ok(())
        }
        .await;

        if let Err(err) = stored {
            if let Err(cleanup) = self.storage.delete(&partition).await {
                log_warn!("Rollback of {partition} failed: {cleanup:#}");
            }
            return Err(InstallError::Storage(format!("{err:#}")));
        }
        Ok(())
    }

    async fn precache_audio(&self) {
        let partition = self.config.audio_partition();
        if let Err(err) = self.storage.open(&partition).await {
            log_warn!("Skipping audio precache, cannot open {partition}: {err:#}");
            return;
        }

        let mut cached = 0usize;
        for path in &self.config.audio_assets {
            let url = match self.origin.join(path) {
                Ok(url) => url,
                Err(err) => {
                    log_warn!("Skipping audio asset {path}: {err}");
                    continue;
                }
            };
            let request = Request::get(url);
            match self.network.fetch(&request).await {
                Ok(response) if response.is_success() => {
                    match self.storage.store(&partition, &request.cache_key(), &response).await {
                        Ok(()) => cached += 1,
                        Err(err) => log_warn!("Failed to cache audio {path}: {err:#}"),
                    }
                }
                Ok(response) => log_warn!("Skipping audio {path}: status {}", response.status),
                Err(err) => log_warn!("Skipping audio {path}: {err:#}"),
            }
        }
        log_info!(
            "Precached {cached}/{} ambient tracks",
            self.config.audio_assets.len()
        );
    }

    /// Evicts every partition that does not belong to this generation and
    /// takes control of all open clients. Returns the deleted partition names.
    pub async fn activate(&self, clients: &dyn ClientHost) -> Result<Vec<String>> {
        self.set_state(WorkerState::Activating);

        let mut deleted = Vec::new();
        for name in self.storage.partitions().await? {
            if self.config.is_current_partition(&name) {
                continue;
            }
            if self.storage.delete(&name).await? {
                log_info!("Deleted stale cache partition {name}");
                deleted.push(name);
            }
        }

        clients.claim(&self.config.version).await;
        self.set_state(WorkerState::Activated);
        Ok(deleted)
    }

    /// Answers an intercepted request. Never fails: every error path resolves
    /// to a cached copy or a synthetic response.
    pub async fn handle_fetch(&self, request: &Request) -> Response {
        match classify(request, &self.origin, &self.config) {
            Strategy::Passthrough => self.passthrough(request).await,
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
            Strategy::NetworkFirst => self.network_first(request).await,
        }
    }

    async fn passthrough(&self, request: &Request) -> Response {
        match self.network.fetch(request).await {
            Ok(response) => response,
            Err(err) => {
                log_warn!("Passthrough fetch of {} failed: {err:#}", request.url);
                Response::service_unavailable()
            }
        }
    }

    async fn cache_first(&self, request: &Request) -> Response {
        let partition = self.config.audio_partition();
        let key = request.cache_key();

        if let Some(hit) = self.cached(&partition, &key).await {
            return hit;
        }

        match self.network.fetch(request).await {
            Ok(response) if response.is_success() => {
                self.put(&partition, &key, &response).await;
                response
            }
            Ok(response) => {
                log_warn!("Audio {} answered {}", request.url, response.status);
                Response::audio_unavailable()
            }
            Err(err) => {
                log_warn!("Audio {} unavailable offline: {err:#}", request.url);
                Response::audio_unavailable()
            }
        }
    }

    async fn stale_while_revalidate(&self, request: &Request) -> Response {
        let partition = self.config.static_partition();
        let key = request.cache_key();

        if let Some(hit) = self.cached(&partition, &key).await {
            self.spawn_revalidate(request.clone(), partition, key);
            return hit;
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.put(&partition, &key, &response).await;
                }
                response
            }
            Err(err) => {
                log_warn!("Shell {} unavailable: {err:#}", request.url);
                Response::offline_page()
            }
        }
    }

    fn spawn_revalidate(&self, request: Request, partition: String, key: String) {
        let storage = self.storage.clone();
        let network = self.network.clone();
        self.background.spawn(async move {
            match network.fetch(&request).await {
                Ok(fresh) if fresh.is_success() => {
                    if let Err(err) = storage.store(&partition, &key, &fresh).await {
                        log_warn!("Revalidation store for {key} failed: {err:#}");
                    }
                }
                Ok(fresh) => log_debug!("Revalidation of {key} answered {}", fresh.status),
                Err(err) => log_debug!("Revalidation of {key} failed: {err:#}"),
            }
        });
    }

    async fn network_first(&self, request: &Request) -> Response {
        let partition = self.config.static_partition();
        let key = request.cache_key();

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.put(&partition, &key, &response).await;
                }
                response
            }
            Err(err) => {
                log_debug!("Network-first fetch of {} failed: {err:#}", request.url);
                if let Some(hit) = self.cached(&partition, &key).await {
                    return hit;
                }
                if request.is_navigation() {
                    Response::offline_page()
                } else {
                    Response::service_unavailable()
                }
            }
        }
    }

    async fn cached(&self, partition: &str, key: &str) -> Option<Response> {
        match self.storage.lookup(partition, key).await {
            Ok(hit) => hit,
            Err(err) => {
                log_warn!("Cache lookup in {partition} failed: {err:#}");
                None
            }
        }
    }

    async fn put(&self, partition: &str, key: &str, response: &Response) {
        let result = async {
            self.storage.open(partition).await?;
            self.storage.store(partition, key, response).await
        }
        .await;
        if let Err(err) = result {
            log_warn!("Failed to cache {key} in {partition}: {err:#}");
        }
    }

    /// Waits for every in-flight background refresh to finish.
    pub async fn settle_background(&self) {
        self.background.close();
        self.background.wait().await;
        self.background.reopen();
    }
}
