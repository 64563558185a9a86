use crate::constants::{DEFAULT_FFMPEG, FFMPEG_PATH_ENV};
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub transcoder_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            transcoder_path: PathBuf::from(DEFAULT_FFMPEG),
        }
    }
}

impl AppConfig {
    pub fn load() -> Self {
        let config = Self::from_override(std::env::var_os(FFMPEG_PATH_ENV));
        tracing::info!("Using transcoder: {}", config.transcoder_path.display());
        config
    }

    pub fn from_override(value: Option<OsString>) -> Self {
        match value {
            Some(path) if !path.is_empty() => Self {
                transcoder_path: PathBuf::from(path),
            },
            _ => Self::default(),
        }
    }
}
