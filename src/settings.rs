//! Persisted key-value settings blob
//!
//! A flat JSON object shared with whatever front-end edits it. The engine
//! only reads the keys it cares about through [`Settings::apply_to`]; unknown
//! keys are preserved on save.

use crate::config::Config;
use crate::error::Result;
use crate::types::{OutputFormat, Quality};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};

/// Settings file contents plus the path they were loaded from
#[derive(Clone, Debug)]
pub struct Settings {
    values: Map<String, Value>,
    path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            values: default_values(),
            path: None,
        }
    }
}

fn default_values() -> Map<String, Value> {
    let defaults = json!({
        "default_download_path": "./downloads",
        "default_quality": "1080P",
        "default_video_format": "mp4",
        "default_audio_format": "mp3",
        "max_concurrent_downloads": 5,
        "download_cover": true,
        "auto_resume": true,
    });
    match defaults {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl Settings {
    /// Load settings from `path`, filling missing keys with defaults
    ///
    /// A missing or corrupt file yields the defaults (the latter is logged).
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut values = default_values();

        match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Map<String, Value>>(&bytes) {
                Ok(stored) => values.extend(stored),
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "settings file is corrupt, using defaults");
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to read settings, using defaults");
            }
        }

        Self {
            values,
            path: Some(path),
        }
    }

    /// Value for `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Set `key` to `value` (in memory; call [`save`](Self::save) to persist)
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Restore every default key (extra keys are dropped)
    pub fn reset_to_default(&mut self) {
        self.values = default_values();
    }

    /// Write the settings to the file they were loaded from
    pub async fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(&self.values)?;
        tokio::fs::write(path, json).await?;
        tracing::debug!(path = %path.display(), "settings saved");
        Ok(())
    }

    /// File backing these settings
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Copy the engine-relevant keys into `config`
    ///
    /// Values of the wrong type are ignored with a warning.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(dir) = self.str_value("default_download_path") {
            config.download.download_dir = PathBuf::from(dir);
        }
        if let Some(label) = self.str_value("default_quality") {
            config.download.default_quality = Quality::from_label(label);
        }
        if let Some(name) = self.str_value("default_video_format") {
            match OutputFormat::from_name(name).filter(|f| !f.is_audio()) {
                Some(format) => config.download.default_video_format = format,
                None => tracing::warn!(value = name, "ignoring unknown video format setting"),
            }
        }
        if let Some(name) = self.str_value("default_audio_format") {
            match OutputFormat::from_name(name).filter(|f| f.is_audio()) {
                Some(format) => config.download.default_audio_format = format,
                None => tracing::warn!(value = name, "ignoring unknown audio format setting"),
            }
        }
        match self.get("max_concurrent_downloads").and_then(Value::as_u64) {
            Some(n) if n > 0 => config.download.max_concurrent_downloads = n as usize,
            Some(_) => tracing::warn!("ignoring zero max_concurrent_downloads setting"),
            None => {}
        }
        if let Some(flag) = self.get("download_cover").and_then(Value::as_bool) {
            config.download.download_cover = flag;
        }
    }

    fn str_value(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }
}
