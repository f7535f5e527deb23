use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::{audio::UnlockPolicy, timer::AdvancePolicy, utils::logging, worker::CacheConfig};

pub const DATA_DIR_ENV: &str = "FOCUSFLOW_DATA_DIR";
pub const ORIGIN_ENV: &str = "FOCUSFLOW_ORIGIN";
pub const CACHE_VERSION_ENV: &str = "FOCUSFLOW_CACHE_VERSION";
pub const CONFIG_FILE_NAME: &str = "config.json";

const DEFAULT_ORIGIN: &str = "http://localhost:8080";

/// Overrides read from `<data_dir>/config.json`. Every field is optional.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
struct FileConfig {
    origin: Option<String>,
    debug: Option<bool>,
    cache: Option<CacheConfig>,
    advance_policy: Option<AdvancePolicy>,
    unlock_policy: Option<UnlockPolicy>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub origin: Url,
    pub debug: bool,
    pub cache: CacheConfig,
    pub advance_policy: AdvancePolicy,
    pub unlock_policy: UnlockPolicy,
}

impl AppConfig {
    pub fn defaults(data_dir: PathBuf) -> Result<Self> {
        Ok(Self {
            data_dir,
            origin: Url::parse(DEFAULT_ORIGIN).context("invalid default origin")?,
            debug: false,
            cache: CacheConfig::default(),
            advance_policy: AdvancePolicy::default(),
            unlock_policy: UnlockPolicy::default(),
        })
    }

    /// Defaults, then `config.json` in the data dir, then environment variables.
    /// Also returns the problems that were skipped over, for logging once the
    /// logger is up.
    pub fn load() -> Result<(Self, Vec<String>)> {
        let data_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir(),
        };

        let mut config = Self::defaults(data_dir)?;
        let file = config.data_dir.join(CONFIG_FILE_NAME);
        let mut warnings = Vec::new();
        config.apply_file(&file, &mut warnings)?;
        config.apply_env()?;
        Ok((config, warnings))
    }

    fn apply_file(&mut self, path: &Path, warnings: &mut Vec<String>) -> Result<()> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()))
            }
        };

        let file: FileConfig = match serde_json::from_str(&raw) {
            Ok(file) => file,
            Err(err) => {
                warnings.push(format!("Ignoring unreadable {}: {err}", path.display()));
                return Ok(());
            }
        };

        if let Some(origin) = file.origin {
            self.origin =
                Url::parse(&origin).with_context(|| format!("invalid origin '{origin}'"))?;
        }
        if let Some(debug) = file.debug {
            self.debug = debug;
        }
        if let Some(cache) = file.cache {
            self.cache = cache;
        }
        if let Some(policy) = file.advance_policy {
            self.advance_policy = policy;
        }
        if let Some(policy) = file.unlock_policy {
            self.unlock_policy = policy;
        }
        Ok(())
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(origin) = std::env::var(ORIGIN_ENV) {
            self.origin = Url::parse(&origin)
                .with_context(|| format!("{ORIGIN_ENV} is not a valid URL: '{origin}'"))?;
        }
        if let Ok(version) = std::env::var(CACHE_VERSION_ENV) {
            let version = version.trim();
            if !version.is_empty() {
                self.cache.version = version.to_string();
            }
        }
        if logging::debug_requested() {
            self.debug = true;
        }
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
        .join(".focusflow")
}
