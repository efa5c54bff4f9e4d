use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// What to do with the sink file on each incoming blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobMode {
    /// Replace the file contents (reference behavior)
    Overwrite,
    /// Append to the file
    Append,
}

impl BlobMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "overwrite" => Some(Self::Overwrite),
            "append" => Some(Self::Append),
            _ => None,
        }
    }
}

/// Persistence sink for frames that are not protocol messages. Writes are
/// spawned so a slow or failing disk never stalls message dispatch; a
/// failed write is logged and otherwise swallowed.
pub struct BlobSink {
    path: PathBuf,
    mode: BlobMode,
}

impl BlobSink {
    pub fn new(path: impl Into<PathBuf>, mode: BlobMode) -> Self {
        Self {
            path: path.into(),
            mode,
        }
    }

    /// Fire-and-forget write of one opaque payload.
    pub fn store(&self, payload: Vec<u8>) {
        let path = self.path.clone();
        let mode = self.mode;
        tokio::spawn(async move {
            match write_blob(&path, mode, &payload).await {
                Ok(()) => debug!(
                    "persisted {} byte blob to {}",
                    payload.len(),
                    path.display()
                ),
                Err(err) => warn!(
                    "failed to persist {} byte blob to {}: {}",
                    payload.len(),
                    path.display(),
                    err
                ),
            }
        });
    }
}

async fn write_blob(path: &Path, mode: BlobMode, payload: &[u8]) -> std::io::Result<()> {
    match mode {
        BlobMode::Overwrite => tokio::fs::write(path, payload).await,
        BlobMode::Append => {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            file.write_all(payload).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("switchboard-blob-{tag}-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn parses_mode_names_case_insensitively() {
        assert_eq!(BlobMode::parse("overwrite"), Some(BlobMode::Overwrite));
        assert_eq!(BlobMode::parse("Append"), Some(BlobMode::Append));
        assert_eq!(BlobMode::parse("truncate"), None);
    }

    #[tokio::test]
    async fn overwrite_replaces_previous_contents() {
        let path = scratch_path("overwrite");
        write_blob(&path, BlobMode::Overwrite, b"first").await.unwrap();
        write_blob(&path, BlobMode::Overwrite, b"second").await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"second");
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn append_accumulates_contents() {
        let path = scratch_path("append");
        write_blob(&path, BlobMode::Append, b"first").await.unwrap();
        write_blob(&path, BlobMode::Append, b"second").await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"firstsecond");
        let _ = tokio::fs::remove_file(&path).await;
    }
}
