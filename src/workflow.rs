//! Per-request workflow
//!
//! ```text
//! Idle --arm--> Armed --image--> InFlight --teardown--> Idle
//! ```
//!
//! An image is only accepted in `Armed`. Entering `InFlight` claims the
//! session atomically, starts the progress reporter and runs fetch then
//! process. Whatever happens in there (a classified failure, an error, a
//! panic) the request then passes one teardown barrier: the reporter is
//! cancelled and awaited, the session is disarmed, and exactly one final
//! message is delivered.

use crate::client::BackgroundRemover;
use crate::error::{BotError, Result};
use crate::fetcher::{ImageFetcher, FALLBACK_FILE_NAME};
use crate::messages;
use crate::outcome::{output_file_name, OutcomeKind, ProcessingOutcome};
use crate::services::progress::{
    ProcessingStage, ProgressReporter, ProgressSink, ProgressUpdate, StageUpdater,
};
use crate::session::{ArmOutcome, BeginOutcome, RequesterId, SessionPhase, SessionStore};
use crate::tracing_config::spans;
use crate::transport::{ChatRef, FileRef, Keyboard, MessageRef, OutgoingDocument, Transport};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

/// Who sent an update, and where to answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub id: RequesterId,
    pub chat: ChatRef,
}

impl Requester {
    #[must_use]
    pub fn new(id: u64, chat: i64) -> Self {
        Self {
            id: RequesterId(id),
            chat: ChatRef(chat),
        }
    }
}

/// Why an image was turned away without processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The requester never armed the session
    NotArmed,
    /// Another image from the same requester is in flight
    Busy,
}

/// Summary of a request that reached the terminal state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub request_id: Uuid,
    pub outcome: OutcomeKind,
    /// Signals the progress reporter emitted before it was cancelled
    pub progress_signals: u64,
    /// Whether the final message reached the transport
    pub delivered: bool,
    pub elapsed: Duration,
}

/// What happened to an incoming image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowReport {
    Rejected(Rejection),
    Completed(Completion),
}

/// Drives requests from arming to the final message
pub struct RequestWorkflow {
    transport: Arc<dyn Transport>,
    sessions: SessionStore,
    fetcher: ImageFetcher,
    remover: Arc<dyn BackgroundRemover>,
    progress_interval: Duration,
}

impl RequestWorkflow {
    pub fn new(
        transport: Arc<dyn Transport>,
        remover: Arc<dyn BackgroundRemover>,
        progress_interval: Duration,
    ) -> Self {
        Self {
            fetcher: ImageFetcher::new(Arc::clone(&transport)),
            transport,
            sessions: SessionStore::new(),
            remover,
            progress_interval,
        }
    }

    /// Share an existing session store
    #[must_use]
    pub fn with_sessions(mut self, sessions: SessionStore) -> Self {
        self.sessions = sessions;
        self
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Welcome message with the "Remove BG" button
    pub async fn greet(&self, requester: Requester) -> Result<()> {
        self.transport
            .send_message(requester.chat, messages::WELCOME, Some(Keyboard::RemoveBackground))
            .await?;
        Ok(())
    }

    pub async fn help(&self, requester: Requester) -> Result<()> {
        self.transport
            .send_message(requester.chat, messages::HELP, None)
            .await?;
        Ok(())
    }

    /// Idle -> Armed
    pub async fn arm(&self, requester: Requester) -> Result<ArmOutcome> {
        let outcome = self.sessions.arm(requester.id);
        info!(requester_id = %requester.id, outcome = ?outcome, "Arm requested");

        let text = match outcome {
            ArmOutcome::Armed => messages::ARMED,
            ArmOutcome::AlreadyArmed => messages::ALREADY_ARMED,
            ArmOutcome::Busy => messages::BUSY,
        };
        self.transport.send_message(requester.chat, text, None).await?;
        Ok(outcome)
    }

    /// Armed -> Idle on user request. In-flight requests are not interrupted.
    pub async fn cancel(&self, requester: Requester) -> Result<SessionPhase> {
        let phase = self.sessions.withdraw(requester.id);
        debug!(requester_id = %requester.id, phase = ?phase, "Cancel requested");

        let text = match phase {
            SessionPhase::Armed => messages::CANCELLED,
            SessionPhase::InFlight => messages::BUSY,
            SessionPhase::Idle => messages::NOTHING_TO_CANCEL,
        };
        self.transport.send_message(requester.chat, text, None).await?;
        Ok(phase)
    }

    /// Any text that is not a command
    pub async fn handle_text(&self, requester: Requester) -> Result<()> {
        let text = match self.sessions.phase(requester.id) {
            SessionPhase::Idle => messages::UNRECOGNIZED,
            SessionPhase::Armed => messages::SEND_PHOTO_HINT,
            SessionPhase::InFlight => messages::BUSY,
        };
        self.transport.send_message(requester.chat, text, None).await?;
        Ok(())
    }

    /// A file that is not an image. Session state is left untouched.
    pub async fn reject_non_image(&self, requester: Requester) -> Result<()> {
        self.transport
            .send_message(requester.chat, messages::NOT_AN_IMAGE, None)
            .await?;
        Ok(())
    }

    /// Armed -> InFlight -> Terminal for one image
    ///
    /// Errors are only returned when a rejection message cannot be sent.
    /// Once the request is in flight every failure ends in a terminal message.
    pub async fn handle_image(&self, requester: Requester, file: FileRef) -> Result<WorkflowReport> {
        match self.sessions.begin(requester.id) {
            BeginOutcome::Started => {},
            BeginOutcome::NotArmed => {
                debug!(requester_id = %requester.id, "Image received while not armed");
                self.transport
                    .send_message(requester.chat, messages::NOT_ARMED, None)
                    .await?;
                return Ok(WorkflowReport::Rejected(Rejection::NotArmed));
            },
            BeginOutcome::Busy => {
                info!(requester_id = %requester.id, "Image received while another is in flight");
                self.transport
                    .send_message(requester.chat, messages::BUSY, None)
                    .await?;
                return Ok(WorkflowReport::Rejected(Rejection::Busy));
            },
        }

        let lease = InFlightLease {
            sessions: self.sessions.clone(),
            id: requester.id,
        };
        let request_id = Uuid::new_v4();
        let span = spans::request(&request_id, requester.id.0, requester.chat.0);

        let completion = self
            .run_in_flight(requester, file, lease, request_id)
            .instrument(span)
            .await;
        Ok(WorkflowReport::Completed(completion))
    }

    async fn run_in_flight(
        &self,
        requester: Requester,
        file: FileRef,
        lease: InFlightLease,
        request_id: Uuid,
    ) -> Completion {
        let started = Instant::now();
        info!(file_id = %file.file_id, "Request in flight");

        let status = match self
            .transport
            .send_message(requester.chat, messages::STATUS_STARTED, None)
            .await
        {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(error = %e, "Could not send status message, continuing without it");
                None
            },
        };

        let sink = Arc::new(ChatProgressSink {
            transport: Arc::clone(&self.transport),
            chat: requester.chat,
            status,
        });
        let progress = ProgressReporter::start(sink, self.progress_interval);
        let stage = progress.stage_updater();

        let fallback_name = file
            .file_name
            .clone()
            .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string());
        let (outcome, input_name) = match AssertUnwindSafe(self.attempt(&file, &stage))
            .catch_unwind()
            .await
        {
            Ok((outcome, name)) => (outcome, name.unwrap_or(fallback_name)),
            Err(panic) => {
                let cause = panic_message(panic.as_ref());
                error!(cause = %cause, "Request panicked");
                (ProcessingOutcome::InternalError { cause }, fallback_name)
            },
        };

        // Teardown barrier: nothing below may be skipped.
        let progress_signals = progress.cancel().await;
        lease.release();

        let kind = outcome.kind();
        let delivered = self.deliver(requester.chat, status, outcome, &input_name).await;
        let elapsed = started.elapsed();

        if kind == OutcomeKind::Success {
            info!(outcome = %kind, delivered, progress_signals, elapsed_ms = elapsed.as_millis() as u64, "Request finished");
        } else {
            warn!(outcome = %kind, delivered, progress_signals, elapsed_ms = elapsed.as_millis() as u64, "Request failed");
        }

        Completion {
            request_id,
            outcome: kind,
            progress_signals,
            delivered,
            elapsed,
        }
    }

    /// Fetch then process. Returns the outcome and, once known, the input name.
    async fn attempt(
        &self,
        file: &FileRef,
        stage: &StageUpdater,
    ) -> (ProcessingOutcome, Option<String>) {
        stage.set(ProcessingStage::Downloading);
        let image = match self.fetcher.fetch(file).await {
            Ok(image) => image,
            Err(BotError::Transport(cause)) => {
                return (ProcessingOutcome::TransportError { cause }, None);
            },
            Err(other) => {
                return (
                    ProcessingOutcome::InternalError {
                        cause: other.to_string(),
                    },
                    None,
                );
            },
        };

        stage.set(ProcessingStage::RemovingBackground);
        let outcome = self.remover.process(image.bytes, &image.file_name).await;
        (outcome, Some(image.file_name))
    }

    /// Send the one final message. Returns whether it reached the transport.
    async fn deliver(
        &self,
        chat: ChatRef,
        status: Option<MessageRef>,
        outcome: ProcessingOutcome,
        input_name: &str,
    ) -> bool {
        if let Some(status) = status {
            let label = if outcome.is_success() {
                messages::STATUS_DONE
            } else {
                messages::STATUS_FAILED
            };
            if let Err(e) = self.transport.edit_message(status, label).await {
                debug!(error = %e, "Could not finalize status message");
            }
        }

        match outcome {
            ProcessingOutcome::Success {
                bytes,
                content_type,
            } => {
                let document = OutgoingDocument {
                    file_name: output_file_name(input_name, &content_type),
                    bytes,
                    caption: Some(messages::SUCCESS_CAPTION.to_string()),
                };
                match self.transport.send_document(chat, document).await {
                    Ok(_) => true,
                    Err(e) => {
                        error!(error = %e, "Could not upload result");
                        if let Err(e) = self
                            .transport
                            .send_message(chat, messages::UPLOAD_FAILED, None)
                            .await
                        {
                            error!(error = %e, "Could not report upload failure");
                        }
                        false
                    },
                }
            },
            failure => {
                let text = failure
                    .failure_message()
                    .unwrap_or_else(|| messages::FAULT_APOLOGY.to_string());
                match self.transport.send_message(chat, &text, None).await {
                    Ok(_) => true,
                    Err(e) => {
                        error!(error = %e, "Could not deliver failure message");
                        false
                    },
                }
            },
        }
    }

    /// Last-resort handler for errors that escaped an update handler
    ///
    /// Logs, resets the requester's pending session and attempts an apology.
    /// Failures in here are logged and swallowed.
    pub async fn handle_fault(&self, requester: Option<Requester>, fault: &BotError) {
        error!(
            requester_id = ?requester.map(|r| r.id.0),
            error = %fault,
            "Unhandled fault in update handler"
        );

        let Some(requester) = requester else {
            return;
        };

        // An in-flight request holds a lease that disarms on teardown; only a
        // pending arm is reset here.
        let phase = self.sessions.withdraw(requester.id);
        debug!(phase = ?phase, "Session reset after fault");

        if let Err(e) = self
            .transport
            .send_message(requester.chat, messages::FAULT_APOLOGY, None)
            .await
        {
            warn!(error = %e, "Could not send apology");
        }
    }
}

/// Holds a requester in `InFlight`; releasing or dropping it disarms.
struct InFlightLease {
    sessions: SessionStore,
    id: RequesterId,
}

impl InFlightLease {
    fn release(self) {
        drop(self);
    }
}

impl Drop for InFlightLease {
    fn drop(&mut self) {
        self.sessions.disarm(self.id);
    }
}

/// Edits the status message and shows the upload indicator
struct ChatProgressSink {
    transport: Arc<dyn Transport>,
    chat: ChatRef,
    status: Option<MessageRef>,
}

#[async_trait]
impl ProgressSink for ChatProgressSink {
    async fn emit(&self, update: &ProgressUpdate) -> Result<()> {
        let action = self.transport.send_upload_action(self.chat).await;
        if let Some(status) = self.status {
            self.transport.edit_message(status, &update.label()).await?;
        }
        action
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
