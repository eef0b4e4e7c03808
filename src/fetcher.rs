//! Resolves uploaded files to raw bytes through the chat transport

use crate::error::{BotError, Result};
use crate::transport::{FileRef, Transport};
use std::sync::Arc;
use tracing::debug;

/// Name used when neither the sender nor the platform supplies one
pub const FALLBACK_FILE_NAME: &str = "image.jpg";

/// Downloaded image ready to be forwarded
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub file_name: String,
}

/// Downloads uploaded images. One attempt, no retry.
#[derive(Clone)]
pub struct ImageFetcher {
    transport: Arc<dyn Transport>,
}

impl ImageFetcher {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Download the bytes behind `file`
    ///
    /// # Errors
    /// Always `BotError::Transport`: resolution or download failed, or the
    /// platform returned an empty file.
    pub async fn fetch(&self, file: &FileRef) -> Result<FetchedImage> {
        let downloaded = self.transport.download(file).await.map_err(|e| match e {
            BotError::Transport(cause) => BotError::transport(cause),
            other => BotError::transport_operation("download the uploaded image", &other),
        })?;

        if downloaded.bytes.is_empty() {
            return Err(BotError::transport(format!(
                "file {} downloaded with no content",
                file.file_id
            )));
        }

        let file_name = file
            .file_name
            .as_deref()
            .or(downloaded.file_name.as_deref())
            .map(sanitize_file_name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string());

        debug!(
            file_id = %file.file_id,
            bytes = downloaded.bytes.len(),
            file_name = %file_name,
            "Fetched uploaded image"
        );

        Ok(FetchedImage {
            bytes: downloaded.bytes,
            file_name,
        })
    }
}

/// Keep only the final path component and drop control characters
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    base.chars()
        .filter(|c| !c.is_control())
        .take(128)
        .collect::<String>()
        .trim()
        .to_string()
}
