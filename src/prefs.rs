// src/prefs.rs
//! User preferences persisted as one JSON file.
//!
//! A missing or corrupt file yields defaults (with a warning); nothing here
//! ever fails startup. Writes go to a temp file first and are renamed into
//! place.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::portfolio::PortfolioItem;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub favorites: Vec<String>,
    pub theme: Theme,
    /// Manually entered holdings.
    pub holdings: Vec<PortfolioItem>,
    pub last_wallet: Option<String>,
}

impl Preferences {
    /// Add or remove `id`; returns whether it is now a favorite.
    pub fn toggle_favorite(&mut self, id: &str) -> bool {
        let id = id.trim().to_lowercase();
        if let Some(pos) = self.favorites.iter().position(|f| *f == id) {
            self.favorites.remove(pos);
            false
        } else {
            self.favorites.push(id);
            true
        }
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        let id = id.trim().to_lowercase();
        self.favorites.iter().any(|f| *f == id)
    }
}

pub async fn load(path: &Path) -> Preferences {
    let raw = match fs::read_to_string(path).await {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(target: "prefs", path = %path.display(), "no preferences file; using defaults");
            return Preferences::default();
        }
        Err(e) => {
            warn!(target: "prefs", path = %path.display(), error = %e, "preferences unreadable; using defaults");
            return Preferences::default();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(p) => p,
        Err(e) => {
            warn!(target: "prefs", path = %path.display(), error = %e, "preferences corrupt; using defaults");
            Preferences::default()
        }
    }
}

pub async fn save(path: &Path, prefs: &Preferences) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
    }
    let json = serde_json::to_vec_pretty(prefs).context("serializing preferences")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)
        .await
        .with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .await
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

/// Preferences held in memory and written through on every change.
pub struct PrefsStore {
    path: PathBuf,
    current: Mutex<Preferences>,
}

impl PrefsStore {
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = load(&path).await;
        Self {
            path,
            current: Mutex::new(current),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn snapshot(&self) -> Preferences {
        self.current.lock().await.clone()
    }

    /// Apply `f` and persist. The in-memory copy only changes when the write
    /// succeeds.
    pub async fn update<R>(&self, f: impl FnOnce(&mut Preferences) -> R) -> Result<R> {
        let mut guard = self.current.lock().await;
        let mut next = guard.clone();
        let out = f(&mut next);
        save(&self.path, &next).await?;
        *guard = next;
        Ok(out)
    }
}
