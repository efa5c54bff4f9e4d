use std::env;

use crate::blob::BlobMode;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub blob_path: String,
    pub blob_mode: BlobMode,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var("SWITCHBOARD_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8888),
            blob_path: env::var("SWITCHBOARD_BLOB_PATH")
                .unwrap_or_else(|_| "video.webm".to_string()),
            blob_mode: env::var("SWITCHBOARD_BLOB_MODE")
                .ok()
                .and_then(|m| BlobMode::parse(&m))
                .unwrap_or(BlobMode::Overwrite),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8888,
            blob_path: "video.webm".to_string(),
            blob_mode: BlobMode::Overwrite,
        }
    }
}
