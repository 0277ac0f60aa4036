//! Audio focus arbitration
//!
//! The session asks an [`AudioFocusArbiter`] for permission before it makes
//! a sound. Later changes to the grant (ducking, transient or permanent loss,
//! regain) arrive through the listener handed over with the request.

use async_trait::async_trait;
use std::fmt;
use std::sync::Mutex;
use tracing::{debug, info, warn};


const LOG_TARGET: &str = "r_mymusic::focus";

/// A change to an existing focus grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusChange {
    /// `transient == false` means the grant is gone for good.
    Lost { transient: bool, duckable: bool },
    Regained,
}

impl FocusChange {
    pub fn duck() -> Self {
        FocusChange::Lost { transient: true, duckable: true }
    }

    pub fn transient() -> Self {
        FocusChange::Lost { transient: true, duckable: false }
    }

    pub fn permanent() -> Self {
        FocusChange::Lost { transient: false, duckable: false }
    }
}

/// Identifies one successful focus request. Releasing it only affects that grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FocusGrant(u64);

impl FocusGrant {
    pub fn new(id: u64) -> Self {
        FocusGrant(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusRequestResult {
    Granted(FocusGrant),
    Denied,
}

impl FocusRequestResult {
    pub fn is_granted(self) -> bool {
        matches!(self, FocusRequestResult::Granted(_))
    }
}

/// Callback receiving changes for one grant. Must not block.
pub type FocusListener = Box<dyn Fn(FocusChange) + Send + Sync>;

#[async_trait]
pub trait AudioFocusArbiter: Send + Sync {
    /// Requests focus. On `Granted`, later changes are delivered to `listener`.
    async fn request(&self, listener: FocusListener) -> FocusRequestResult;

    /// Gives `grant` back. Releasing a grant that was already taken away,
    /// superseded or released is a no-op.
    async fn release(&self, grant: FocusGrant);
}

/// An ongoing interruption from another audio source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Interruption {
    transient: bool,
    duckable: bool,
}

struct Holder {
    id: u64,
    listener: FocusListener,
}

impl fmt::Debug for Holder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Holder").field("id", &self.id).finish()
    }
}

#[derive(Debug, Default)]
struct ArbiterState {
    holder: Option<Holder>,
    interruption: Option<Interruption>,
    next_id: u64,
}

/// In-process arbiter for hosts without a platform focus service.
///
/// There is at most one holder. A new request takes focus away from the
/// previous holder permanently. The host injects interruptions from other
/// audio sources with [`interrupt`](Self::interrupt) and ends them with
/// [`restore`](Self::restore). Requests made while a non-duckable
/// interruption is active are denied.
#[derive(Debug, Default)]
pub struct LocalFocusArbiter {
    state: Mutex<ArbiterState>,
}

impl LocalFocusArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether someone currently holds focus.
    pub fn is_held(&self) -> bool {
        self.state.lock().map(|s| s.holder.is_some()).unwrap_or(false)
    }

    /// Starts an interruption and notifies the holder. A permanent
    /// interruption also drops the holder.
    pub fn interrupt(&self, transient: bool, duckable: bool) {
        let Ok(mut state) = self.state.lock() else {
            warn!(target: LOG_TARGET, "Focus state poisoned, ignoring interruption.");
            return;
        };
        info!(target: LOG_TARGET, transient, duckable, "Audio focus interrupted.");
        state.interruption = if transient { Some(Interruption { transient, duckable }) } else { None };

        let change = FocusChange::Lost { transient, duckable };
        if transient {
            if let Some(holder) = state.holder.as_ref() {
                (holder.listener)(change);
            }
        } else if let Some(holder) = state.holder.take() {
            debug!(target: LOG_TARGET, holder = holder.id, "Holder lost focus permanently.");
            (holder.listener)(change);
        }
    }

    /// Ends the current interruption and tells the holder it may resume.
    pub fn restore(&self) {
        let Ok(mut state) = self.state.lock() else {
            warn!(target: LOG_TARGET, "Focus state poisoned, ignoring restore.");
            return;
        };
        if state.interruption.take().is_none() {
            debug!(target: LOG_TARGET, "Restore without an active interruption.");
            return;
        }
        info!(target: LOG_TARGET, "Audio focus interruption ended.");
        if let Some(holder) = state.holder.as_ref() {
            (holder.listener)(FocusChange::Regained);
        }
    }
}

#[async_trait]
impl AudioFocusArbiter for LocalFocusArbiter {
    async fn request(&self, listener: FocusListener) -> FocusRequestResult {
        let Ok(mut state) = self.state.lock() else {
            warn!(target: LOG_TARGET, "Focus state poisoned, denying request.");
            return FocusRequestResult::Denied;
        };

        if let Some(interruption) = state.interruption {
            if !interruption.duckable {
                info!(target: LOG_TARGET, "Focus request denied: non-duckable interruption active.");
                return FocusRequestResult::Denied;
            }
        }

        if let Some(previous) = state.holder.take() {
            debug!(target: LOG_TARGET, holder = previous.id, "Focus taken over by a new request.");
            (previous.listener)(FocusChange::permanent());
        }

        state.next_id += 1;
        let id = state.next_id;
        // A duckable interruption still in progress applies to the new holder too.
        if let Some(interruption) = state.interruption {
            listener(FocusChange::Lost { transient: interruption.transient, duckable: interruption.duckable });
        }
        state.holder = Some(Holder { id, listener });
        info!(target: LOG_TARGET, holder = id, "Focus granted.");
        FocusRequestResult::Granted(FocusGrant(id))
    }

    async fn release(&self, grant: FocusGrant) {
        let Ok(mut state) = self.state.lock() else {
            warn!(target: LOG_TARGET, "Focus state poisoned, release skipped.");
            return;
        };
        match state.holder.as_ref() {
            Some(holder) if holder.id == grant.id() => {
                state.holder = None;
                info!(target: LOG_TARGET, holder = grant.id(), "Focus released.");
            }
            _ => debug!(target: LOG_TARGET, grant = grant.id(), "Release of a grant no longer held, ignoring."),
        }
    }
}
