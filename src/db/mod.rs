//! SQLite persistence on a dedicated thread. Backs both the preference store
//! and the offline response cache.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{error, info};
use parking_lot::Mutex;
use rusqlite::Connection;
use tokio::sync::oneshot;

mod helpers;
mod migrations;
pub mod repositories;

use migrations::run_migrations;
use repositories::{CacheRepository, KvRepository};

use crate::store::KeyValueStore;
use crate::worker::{CacheStorage, Response};

pub const DB_FILE_NAME: &str = "focusflow.db";

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.lock().take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("focusflow-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }
                if let Err(err) = conn.pragma_update(None, "foreign_keys", "ON") {
                    error!("Failed to enable foreign keys: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => task(&mut conn),
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .context("failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Database initialized at {}", db_path.display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    /// Opens `focusflow.db` inside `data_dir`.
    pub fn open_in(data_dir: &Path) -> Result<Self> {
        Self::new(data_dir.join(DB_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        self.inner
            .sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }
}

#[async_trait]
impl KeyValueStore for Database {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.execute(move |conn| KvRepository::new(conn).get(&key))
            .await
            .context("failed to read preference")
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        let key = key.to_string();
        self.execute(move |conn| KvRepository::new(conn).put(&key, &value))
            .await
            .context("failed to write preference")
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.execute(move |conn| KvRepository::new(conn).remove(&key))
            .await
            .context("failed to remove preference")
    }
}

#[async_trait]
impl CacheStorage for Database {
    async fn open(&self, partition: &str) -> Result<()> {
        let partition = partition.to_string();
        self.execute(move |conn| CacheRepository::new(conn).open(&partition))
            .await
    }

    async fn lookup(&self, partition: &str, url: &str) -> Result<Option<Response>> {
        let partition = partition.to_string();
        let url = url.to_string();
        self.execute(move |conn| CacheRepository::new(conn).lookup(&partition, &url))
            .await
    }

    async fn store(&self, partition: &str, url: &str, response: &Response) -> Result<()> {
        let partition = partition.to_string();
        let url = url.to_string();
        let response = response.clone();
        self.execute(move |conn| CacheRepository::new(conn).store(&partition, &url, &response))
            .await
    }

    async fn partitions(&self) -> Result<Vec<String>> {
        self.execute(|conn| CacheRepository::new(conn).partitions())
            .await
    }

    async fn delete(&self, partition: &str) -> Result<bool> {
        let partition = partition.to_string();
        self.execute(move |conn| CacheRepository::new(conn).delete(&partition))
            .await
    }
}
