use anyhow::Result;
use async_trait::async_trait;
use log::info;
use reqwest::Url;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientWindow {
    pub id: String,
    pub url: String,
    pub focused: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub tag: String,
    pub actions: Vec<NotificationAction>,
}

/// The pages and system surfaces a cache worker can reach.
#[async_trait]
pub trait ClientHost: Send + Sync {
    /// Takes control of every open page for the given cache generation.
    async fn claim(&self, version: &str);
    async fn windows(&self) -> Vec<ClientWindow>;
    async fn focus(&self, id: &str) -> Result<()>;
    async fn open_window(&self, url: &Url) -> Result<()>;
    async fn show_notification(&self, notification: &Notification) -> Result<()>;
}

/// Host for headless runs: no windows, notifications go to the log.
pub struct LogClientHost;

#[async_trait]
impl ClientHost for LogClientHost {
    async fn claim(&self, version: &str) {
        info!("Cache generation {version} now controls all clients");
    }

    async fn windows(&self) -> Vec<ClientWindow> {
        Vec::new()
    }

    async fn focus(&self, id: &str) -> Result<()> {
        info!("Focus client {id}");
        Ok(())
    }

    async fn open_window(&self, url: &Url) -> Result<()> {
        info!("Open window at {url}");
        Ok(())
    }

    async fn show_notification(&self, notification: &Notification) -> Result<()> {
        info!("[notification] {}: {}", notification.title, notification.body);
        Ok(())
    }
}
