//! Chat transport abstraction
//!
//! The workflow talks to the chat platform only through [`Transport`], so the
//! request state machine can run against Telegram in production and against
//! an in-memory double in tests.

use crate::error::Result;
use async_trait::async_trait;

/// Conversation that messages are delivered to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatRef(pub i64);

impl std::fmt::Display for ChatRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message previously sent by the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub chat: ChatRef,
    pub message_id: i32,
}

/// Opaque reference to an uploaded file, plus the name the sender declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub file_id: String,
    pub file_name: Option<String>,
}

impl FileRef {
    #[must_use]
    pub fn new<S: Into<String>>(file_id: S) -> Self {
        Self {
            file_id: file_id.into(),
            file_name: None,
        }
    }

    #[must_use]
    pub fn with_file_name<S: Into<String>>(mut self, name: S) -> Self {
        self.file_name = Some(name.into());
        self
    }
}

/// Raw bytes of a downloaded file
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub bytes: Vec<u8>,
    /// Name reported by the platform's file storage, if any
    pub file_name: Option<String>,
}

/// File sent back to the requester
#[derive(Debug, Clone)]
pub struct OutgoingDocument {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub caption: Option<String>,
}

/// Inline keyboards the bot attaches to messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyboard {
    /// Single "Remove BG" button that arms the session
    RemoveBackground,
}

/// Operations the bot needs from the chat platform
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send a text message, optionally with an inline keyboard
    async fn send_message(
        &self,
        chat: ChatRef,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef>;

    /// Replace the text of a message sent earlier
    async fn edit_message(&self, message: MessageRef, text: &str) -> Result<()>;

    /// Send a file as a document
    async fn send_document(&self, chat: ChatRef, document: OutgoingDocument) -> Result<MessageRef>;

    /// Show the "uploading document" activity indicator
    async fn send_upload_action(&self, chat: ChatRef) -> Result<()>;

    /// Resolve a file reference and download its bytes
    async fn download(&self, file: &FileRef) -> Result<DownloadedFile>;
}
