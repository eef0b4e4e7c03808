//! Per-requester session state
//!
//! The only state shared between concurrent handlers. Every read-modify-write
//! of a requester's phase happens under one lock, so the Armed -> InFlight
//! transition is a compare-and-set: two images racing for the same armed
//! session cannot both win.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Stable identity of the person talking to the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequesterId(pub u64);

impl std::fmt::Display for RequesterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a requester is in the workflow
///
/// Absence from the store is `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Not expecting an image
    #[default]
    Idle,
    /// The next image will be processed
    Armed,
    /// An image is being processed; the armed flag stays set until teardown
    InFlight,
}

/// Result of an arming request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmOutcome {
    /// Session moved from idle to armed
    Armed,
    /// Session was already armed; nothing changed
    AlreadyArmed,
    /// A request is in flight; arming is refused until it finishes
    Busy,
}

/// Result of claiming an armed session for an incoming image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    /// Session moved from armed to in flight; the caller owns the request
    Started,
    /// No armed session; the image must be rejected
    NotArmed,
    /// Another image for this requester is already being processed
    Busy,
}

/// Concurrency-safe map of requester phases
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    phases: Arc<Mutex<HashMap<RequesterId, SessionPhase>>>,
}

impl SessionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Poisoning only means another handler panicked mid-update; the map itself
    // holds plain enums and stays consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<RequesterId, SessionPhase>> {
        self.phases.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arm the requester so the next image is processed
    pub fn arm(&self, id: RequesterId) -> ArmOutcome {
        let mut phases = self.lock();
        match phases.get(&id).copied().unwrap_or_default() {
            SessionPhase::Idle => {
                phases.insert(id, SessionPhase::Armed);
                ArmOutcome::Armed
            },
            SessionPhase::Armed => ArmOutcome::AlreadyArmed,
            SessionPhase::InFlight => ArmOutcome::Busy,
        }
    }

    /// Whether the armed flag is set (armed or in flight)
    #[must_use]
    pub fn is_armed(&self, id: RequesterId) -> bool {
        self.phase(id) != SessionPhase::Idle
    }

    /// Current phase of the requester
    #[must_use]
    pub fn phase(&self, id: RequesterId) -> SessionPhase {
        self.lock().get(&id).copied().unwrap_or_default()
    }

    /// Claim an armed session for an incoming image
    pub fn begin(&self, id: RequesterId) -> BeginOutcome {
        let mut phases = self.lock();
        match phases.get(&id).copied().unwrap_or_default() {
            SessionPhase::Idle => BeginOutcome::NotArmed,
            SessionPhase::Armed => {
                phases.insert(id, SessionPhase::InFlight);
                BeginOutcome::Started
            },
            SessionPhase::InFlight => BeginOutcome::Busy,
        }
    }

    /// Clear the armed flag. Idempotent; returns the phase that was replaced.
    pub fn disarm(&self, id: RequesterId) -> SessionPhase {
        self.lock().remove(&id).unwrap_or_default()
    }

    /// Withdraw an armed session that has not received an image yet
    ///
    /// In-flight sessions are left alone; their teardown disarms them.
    /// Returns the phase observed before the call.
    pub fn withdraw(&self, id: RequesterId) -> SessionPhase {
        let mut phases = self.lock();
        let phase = phases.get(&id).copied().unwrap_or_default();
        if phase == SessionPhase::Armed {
            phases.remove(&id);
        }
        phase
    }

    /// Number of requesters that are armed or in flight
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.lock().len()
    }
}
