use crate::favorites::FavoriteKey;
use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "tunebox";
const LOG_FILE: &str = "tunebox.log";
const DEFAULT_VOLUME: f32 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub music_dir: PathBuf,
    pub artwork_dir: PathBuf,
    pub config_dir: PathBuf,
    pub initial_volume: f32,
    pub favorite_key: FavoriteKey,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let value = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let home = value("HOME")
            .or_else(|| value("USERPROFILE"))
            .map(PathBuf::from);

        let music_dir = match value("TUNEBOX_MUSIC_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => home
                .as_ref()
                .map(|home| home.join("Music"))
                .context("neither TUNEBOX_MUSIC_DIR nor HOME is set")?,
        };
        let artwork_dir = value("TUNEBOX_ARTWORK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| music_dir.join("artwork"));
        let config_dir = match value("TUNEBOX_CONFIG_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => home
                .as_ref()
                .map(|home| home.join(".config").join(APP_DIR))
                .context("neither TUNEBOX_CONFIG_DIR nor HOME is set")?,
        };

        let initial_volume = match value("TUNEBOX_VOLUME") {
            Some(raw) => raw
                .trim()
                .parse::<f32>()
                .with_context(|| format!("TUNEBOX_VOLUME is not a number: {raw}"))?
                .clamp(0.0, 1.0),
            None => DEFAULT_VOLUME,
        };

        let favorite_key = match value("TUNEBOX_FAVORITES_KEY").as_deref().map(str::trim) {
            None | Some("name") => FavoriteKey::DisplayName,
            Some("index") => FavoriteKey::TrackIndex,
            Some(other) => anyhow::bail!("TUNEBOX_FAVORITES_KEY must be name or index, got {other}"),
        };

        Ok(Self {
            music_dir,
            artwork_dir,
            config_dir,
            initial_volume,
            favorite_key,
        })
    }

    pub fn log_path(&self) -> PathBuf {
        self.config_dir.join(LOG_FILE)
    }

    pub fn ensure_config_dir(&self) -> Result<&Path> {
        fs::create_dir_all(&self.config_dir)
            .with_context(|| format!("failed to create {}", self.config_dir.display()))?;
        Ok(&self.config_dir)
    }

    /// Artwork shown for the track at `index`.
    pub fn artwork_path(&self, index: usize) -> PathBuf {
        self.artwork_dir.join(format!("{index}.png"))
    }
}

pub fn normalize_path(path: &Path) -> PathBuf {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    strip_windows_verbatim_prefix(&canonical)
}

pub fn strip_windows_verbatim_prefix(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();

    if let Some(trimmed) = raw.strip_prefix(r"\\?\UNC\") {
        return PathBuf::from(format!(r"\\{trimmed}"));
    }

    if let Some(trimmed) = raw.strip_prefix(r"\\?\") {
        return PathBuf::from(trimmed);
    }

    path.to_path_buf()
}
