use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)] // missing keys fall back to the defaults below
pub struct Config {
    /// JSON array of `{url, likes, comments}`; picture urls resolve
    /// against its directory.
    pub pictures: PathBuf,
    /// Backgrounds of the upload form, one is picked at random per reset.
    pub backgrounds: Vec<PathBuf>,
    pub image_load_timeout_ms: u64,
    pub page_size: usize,
    pub window_size: [f32; 2],
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pictures: PathBuf::from("data/pictures.json"),
            backgrounds: vec![
                PathBuf::from("img/logo-background-1.jpg"),
                PathBuf::from("img/logo-background-2.jpg"),
                PathBuf::from("img/logo-background-3.jpg"),
            ],
            image_load_timeout_ms: 15_000,
            page_size: 12,
            window_size: [800.0, 600.0],
        }
    }
}

impl Config {
    /// Reads the config at `path`; no path, or a file that does not exist,
    /// means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("config {} not found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(Error::io(path, e)),
        };
        let mut config: Self = serde_json::from_str(&text)?;
        config.page_size = config.page_size.max(1);
        Ok(config)
    }

    pub fn image_load_timeout(&self) -> Duration {
        Duration::from_millis(self.image_load_timeout_ms)
    }

    /// Directory picture urls are relative to.
    pub fn pictures_dir(&self) -> PathBuf {
        self.pictures
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }
}
