// config.rs — 用户配置（JSON，键名与旧版 config.json 兼容）

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "view360";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Window size multiplier applied to the aspect ratio presets.
    pub ratio_scale: f32,
    pub gamma_correct: bool,
    pub flip_image: bool,
    /// Bake equirectangular panoramas; when false, images are read as
    /// pre-laid-out cubemaps.
    pub need_gen_cube_map: bool,
    pub show_info: bool,
    pub show_grid: bool,
    pub min_fov: f32,
    pub max_fov: f32,
    pub step_fov: f32,
    pub default_fov: f32,
    pub inverse_wheel: bool,
    pub font_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ratio_scale: 50.0,
            gamma_correct: true,
            flip_image: true,
            need_gen_cube_map: true,
            show_info: true,
            show_grid: true,
            min_fov: 1.0,
            max_fov: 120.0,
            step_fov: 1.0,
            default_fov: 45.0,
            inverse_wheel: true,
            font_size: 10,
        }
    }
}

impl Config {
    /// Missing file yields the defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Like `load`, but logs failures and falls back to the defaults.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            log::warn!("load config {}: {}", path.display(), e);
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn clamp_fov(&self, fov: f32) -> f32 {
        fov.clamp(self.min_fov.min(self.max_fov), self.max_fov.max(self.min_fov))
    }
}

/// Per-user config directory for `app`, created on demand.
pub fn config_dir(app: &str) -> Option<PathBuf> {
    let base: Option<PathBuf> = if cfg!(windows) {
        std::env::var_os("LOCALAPPDATA").map(PathBuf::from)
    } else if cfg!(target_os = "macos") {
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join("Library/Application Support"))
    } else {
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
    };

    let dir = base?.join(app);
    if let Err(e) = std::fs::create_dir_all(&dir) {
        log::warn!("create config directory {}: {}", dir.display(), e);
        return None;
    }
    Some(dir)
}

/// `--config <path>`, else the per-user config file, else `./config.json`.
pub fn resolve_config_path() -> PathBuf {
    let mut it = std::env::args();
    while let Some(a) = it.next() {
        if a == "--config" {
            if let Some(v) = it.next() {
                return PathBuf::from(v);
            }
        }
    }

    config_dir(APP_NAME)
        .map(|dir| dir.join(CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
}
