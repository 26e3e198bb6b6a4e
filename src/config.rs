//! Environment-backed runtime configuration.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use thiserror::Error;

use crate::library::scanner::ScanConfig;
use crate::models::SortMethod;

const DEFAULT_PAGE_SIZE: usize = 10;
const DEFAULT_NAV_COOLDOWN_MS: u64 = 200;
const DEFAULT_CACHE_CAPACITY: usize = 64;
const TRASH_DIR: &str = "trash";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a non-negative integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
    #[error("{key} must be at least 1")]
    ZeroValue { key: &'static str },
    #[error("{key} must be true or false, got {value:?}")]
    InvalidFlag { key: &'static str, value: String },
}

/// Runtime configuration for a gallery session.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryConfig {
    /// Images per grid page.
    pub page_size: usize,
    /// Initial collection order.
    pub sort_method: SortMethod,
    /// How long viewer navigation stays locked after an accepted move.
    pub navigation_cooldown: Duration,
    /// Entries kept by each listing cache.
    pub cache_capacity: usize,
    /// Optional override for where the database and rotation temp files live.
    pub data_dir: Option<PathBuf>,
    /// Where deleted images go; defaults to `trash` under the data dir.
    pub trash_dir: Option<PathBuf>,
    /// List dot-files when scanning directories.
    pub show_hidden: bool,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            sort_method: SortMethod::default(),
            navigation_cooldown: Duration::from_millis(DEFAULT_NAV_COOLDOWN_MS),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            data_dir: None,
            trash_dir: None,
            show_hidden: false,
        }
    }
}

impl GalleryConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let page_size = parse_positive("FOLIO_PAGE_SIZE", DEFAULT_PAGE_SIZE, &mut lookup)?;
        let cache_capacity =
            parse_positive("FOLIO_CACHE_CAPACITY", DEFAULT_CACHE_CAPACITY, &mut lookup)?;
        let cooldown_ms = match optional_trimmed_env("FOLIO_NAV_COOLDOWN_MS", &mut lookup) {
            Some(value) => value
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidNumber {
                    key: "FOLIO_NAV_COOLDOWN_MS",
                    value,
                })?,
            None => DEFAULT_NAV_COOLDOWN_MS,
        };
        let sort_method = optional_trimmed_env("FOLIO_SORT", &mut lookup)
            .map(|key| SortMethod::from_key(&key))
            .unwrap_or_default();
        let data_dir = optional_trimmed_env("FOLIO_DATA_DIR", &mut lookup).map(PathBuf::from);
        let trash_dir = optional_trimmed_env("FOLIO_TRASH_DIR", &mut lookup).map(PathBuf::from);
        let show_hidden = parse_flag("FOLIO_SHOW_HIDDEN", &mut lookup)?;

        Ok(Self {
            page_size,
            sort_method,
            navigation_cooldown: Duration::from_millis(cooldown_ms),
            cache_capacity,
            data_dir,
            trash_dir,
            show_hidden,
        })
    }

    /// Directory holding the database and rotation temp files.
    pub fn resolve_data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let proj_dirs =
            ProjectDirs::from("", "", "folio").context("Failed to determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn resolve_trash_dir(&self, data_dir: &Path) -> PathBuf {
        self.trash_dir
            .clone()
            .unwrap_or_else(|| data_dir.join(TRASH_DIR))
    }

    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            include_hidden: self.show_hidden,
            ..Default::default()
        }
    }
}

fn optional_trimmed_env<F>(key: &str, lookup: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_flag<F>(key: &'static str, lookup: &mut F) -> Result<bool, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(false);
    };
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag { key, value }),
    }
}

fn parse_positive<F>(key: &'static str, default: usize, lookup: &mut F) -> Result<usize, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(default);
    };
    let parsed = value
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidNumber { key, value })?;
    if parsed == 0 {
        return Err(ConfigError::ZeroValue { key });
    }
    Ok(parsed)
}
