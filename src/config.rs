use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::session::SessionConfig;

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_MODEL_DIR: &str = "models";
const DEFAULT_MODEL: &str = "default.onnx";
const DEFAULT_FRAME_INTERVAL_MS: u64 = 33;
const DEFAULT_JPEG_QUALITY: u8 = 80;

#[derive(Debug, Deserialize, Default)]
struct SightlineConfigFile {
    listen_addr: Option<String>,
    model_dir: Option<String>,
    default_model: Option<String>,
    frame_interval_ms: Option<u64>,
    jpeg_quality: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct SightlineConfig {
    pub listen_addr: String,
    pub model_dir: String,
    pub default_model: String,
    pub frame_interval: Duration,
    pub jpeg_quality: u8,
}

impl SightlineConfig {
    /// Load configuration from the optional JSON file named by
    /// `SIGHTLINE_CONFIG`, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SIGHTLINE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => read_config_file(Path::new(path))?,
            None => SightlineConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SightlineConfigFile) -> Self {
        Self {
            listen_addr: file
                .listen_addr
                .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
            model_dir: file
                .model_dir
                .unwrap_or_else(|| DEFAULT_MODEL_DIR.to_string()),
            default_model: file
                .default_model
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            frame_interval: Duration::from_millis(
                file.frame_interval_ms.unwrap_or(DEFAULT_FRAME_INTERVAL_MS),
            ),
            jpeg_quality: file.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("SIGHTLINE_LISTEN_ADDR") {
            if !addr.trim().is_empty() {
                self.listen_addr = addr;
            }
        }
        if let Ok(dir) = std::env::var("SIGHTLINE_MODEL_DIR") {
            if !dir.trim().is_empty() {
                self.model_dir = dir;
            }
        }
        if let Ok(model) = std::env::var("SIGHTLINE_DEFAULT_MODEL") {
            if !model.trim().is_empty() {
                self.default_model = model;
            }
        }
        if let Ok(interval) = std::env::var("SIGHTLINE_FRAME_INTERVAL_MS") {
            let ms: u64 = interval.parse().map_err(|_| {
                anyhow!("SIGHTLINE_FRAME_INTERVAL_MS must be an integer number of milliseconds")
            })?;
            self.frame_interval = Duration::from_millis(ms);
        }
        if let Ok(quality) = std::env::var("SIGHTLINE_JPEG_QUALITY") {
            let quality: u8 = quality
                .parse()
                .map_err(|_| anyhow!("SIGHTLINE_JPEG_QUALITY must be an integer in 1..=100"))?;
            self.jpeg_quality = quality;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(anyhow!("jpeg_quality must be in 1..=100"));
        }
        if self.default_model.trim().is_empty() {
            return Err(anyhow!("default_model must not be empty"));
        }
        Ok(())
    }

    /// Session tunables derived from this config.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            default_model: self.default_model.clone(),
            frame_interval: self.frame_interval,
            jpeg_quality: self.jpeg_quality,
        }
    }
}

fn read_config_file(path: &Path) -> Result<SightlineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
