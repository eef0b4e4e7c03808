//! Test doubles for driving the request workflow without Telegram or remove.bg

#![allow(dead_code)]

use async_trait::async_trait;
use bgremove_bot::error::{BotError, Result};
use bgremove_bot::transport::{
    ChatRef, DownloadedFile, FileRef, Keyboard, MessageRef, OutgoingDocument, Transport,
};
use bgremove_bot::{BackgroundRemover, ProcessingOutcome, RequestWorkflow, Requester};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Smallest valid PNG signature, enough for byte comparisons
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-image-data";

/// Everything the workflow asked the transport to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Sent {
        chat: i64,
        message_id: i32,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Edited {
        message_id: i32,
        text: String,
    },
    Document {
        chat: i64,
        file_name: String,
        caption: Option<String>,
        bytes: Vec<u8>,
    },
    UploadAction {
        chat: i64,
    },
}

/// In-memory transport that records every call
#[derive(Default)]
pub struct RecordingTransport {
    events: Mutex<Vec<Event>>,
    files: Mutex<HashMap<String, std::result::Result<DownloadedFile, String>>>,
    next_message_id: AtomicI32,
    fail_documents: bool,
    fail_edits: bool,
    fail_sends: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport whose document uploads always fail
    pub fn failing_documents() -> Self {
        Self {
            fail_documents: true,
            ..Self::default()
        }
    }

    /// Transport whose message edits always fail
    pub fn failing_edits() -> Self {
        Self {
            fail_edits: true,
            ..Self::default()
        }
    }

    /// Transport that cannot send text messages
    pub fn failing_sends() -> Self {
        Self {
            fail_sends: true,
            ..Self::default()
        }
    }

    /// Make `file_id` downloadable with the given bytes
    pub fn with_file(self, file_id: &str, bytes: &[u8]) -> Self {
        self.files.lock().unwrap().insert(
            file_id.to_string(),
            Ok(DownloadedFile {
                bytes: bytes.to_vec(),
                file_name: Some(format!("{file_id}.jpg")),
            }),
        );
        self
    }

    /// Make downloads of `file_id` fail
    pub fn with_broken_file(self, file_id: &str, cause: &str) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(file_id.to_string(), Err(cause.to_string()));
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Texts of sent messages, in order
    pub fn sent_texts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Sent { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn documents(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|event| matches!(event, Event::Document { .. }))
            .collect()
    }

    pub fn edits(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Edited { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn upload_actions(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, Event::UploadAction { .. }))
            .count()
    }

    pub fn last_event(&self) -> Option<Event> {
        self.events().last().cloned()
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    fn next_id(&self) -> i32 {
        self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_message(
        &self,
        chat: ChatRef,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef> {
        if self.fail_sends {
            return Err(BotError::transport("Forbidden: bot was blocked by the user"));
        }
        let message_id = self.next_id();
        self.record(Event::Sent {
            chat: chat.0,
            message_id,
            text: text.to_string(),
            keyboard,
        });
        Ok(MessageRef { chat, message_id })
    }

    async fn edit_message(&self, message: MessageRef, text: &str) -> Result<()> {
        if self.fail_edits {
            return Err(BotError::transport("Bad Request: message to edit not found"));
        }
        self.record(Event::Edited {
            message_id: message.message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_document(&self, chat: ChatRef, document: OutgoingDocument) -> Result<MessageRef> {
        if self.fail_documents {
            return Err(BotError::transport("Request Entity Too Large"));
        }
        self.record(Event::Document {
            chat: chat.0,
            file_name: document.file_name,
            caption: document.caption,
            bytes: document.bytes,
        });
        Ok(MessageRef {
            chat,
            message_id: self.next_id(),
        })
    }

    async fn send_upload_action(&self, chat: ChatRef) -> Result<()> {
        self.record(Event::UploadAction { chat: chat.0 });
        Ok(())
    }

    async fn download(&self, file: &FileRef) -> Result<DownloadedFile> {
        match self.files.lock().unwrap().get(&file.file_id) {
            Some(Ok(downloaded)) => Ok(downloaded.clone()),
            Some(Err(cause)) => Err(BotError::transport(cause.clone())),
            None => Err(BotError::transport(format!(
                "Bad Request: file {} not found",
                file.file_id
            ))),
        }
    }
}

/// What a [`StubRemover`] does when called
#[derive(Debug, Clone)]
pub enum StubBehavior {
    Return(ProcessingOutcome),
    Panic(&'static str),
}

/// Background remover that answers after a fixed delay
pub struct StubRemover {
    behavior: StubBehavior,
    delay: Duration,
    calls: AtomicUsize,
    inputs: Mutex<Vec<(String, usize)>>,
}

impl StubRemover {
    pub fn returning(outcome: ProcessingOutcome, delay: Duration) -> Self {
        Self {
            behavior: StubBehavior::Return(outcome),
            delay,
            calls: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding(delay: Duration) -> Self {
        Self::returning(
            ProcessingOutcome::Success {
                bytes: PNG_BYTES.to_vec(),
                content_type: "image/png".to_string(),
            },
            delay,
        )
    }

    pub fn panicking(message: &'static str) -> Self {
        Self {
            behavior: StubBehavior::Panic(message),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// File names and sizes the remover was called with
    pub fn inputs(&self) -> Vec<(String, usize)> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackgroundRemover for StubRemover {
    async fn process(&self, image: Vec<u8>, file_name: &str) -> ProcessingOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs
            .lock()
            .unwrap()
            .push((file_name.to_string(), image.len()));

        tokio::time::sleep(self.delay).await;
        match &self.behavior {
            StubBehavior::Return(outcome) => outcome.clone(),
            StubBehavior::Panic(message) => panic!("{}", message),
        }
    }
}

/// Workflow wired to the given doubles
pub fn workflow(
    transport: &Arc<RecordingTransport>,
    remover: &Arc<StubRemover>,
    progress_interval: Duration,
) -> Arc<RequestWorkflow> {
    let transport: Arc<dyn Transport> = transport.clone();
    let remover: Arc<dyn BackgroundRemover> = remover.clone();
    Arc::new(RequestWorkflow::new(transport, remover, progress_interval))
}

pub fn alice() -> Requester {
    Requester::new(1001, 1001)
}

pub fn bob() -> Requester {
    Requester::new(2002, 2002)
}
