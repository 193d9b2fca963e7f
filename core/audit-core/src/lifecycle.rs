//! Session lifecycle controller.
//!
//! Turns the state machine's events into session store writes: one store call
//! per event, issued in emission order. A session whose record could not be
//! created is never closed, because there is no id to close.

use tracing::{error, info, warn};

use crate::detector::SessionDetectionState;
use crate::store::SessionStore;
use crate::types::{Endpoints, SessionEvent, SessionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleOutcome {
    /// No event this tick.
    Unchanged,
    /// A record was created for the opened session.
    Recorded(SessionId),
    /// The create was rejected or the session had no address pair; the
    /// session runs unrecorded.
    OpenDropped,
    /// The open record received its end time.
    Finalized(SessionId),
    /// The store rejected the close; the record stays open.
    CloseFailed(SessionId),
    /// The session closed without a record to finalize.
    CloseSuppressed,
}

#[derive(Debug)]
pub struct SessionLifecycle<S> {
    store: S,
}

impl<S: SessionStore> SessionLifecycle<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Applies one tick's event, updating `state.current_session_id`.
    pub fn apply(
        &self,
        state: &mut SessionDetectionState,
        event: Option<&SessionEvent>,
    ) -> LifecycleOutcome {
        match event {
            None => LifecycleOutcome::Unchanged,
            Some(SessionEvent::Opened { endpoints, at }) => {
                if let Some(previous) = state.current_session_id.take() {
                    warn!(
                        session_id = %previous,
                        "Session opened while a record was still tracked; previous record left open"
                    );
                }
                let Some(Endpoints { host_ip, client_ip }) = endpoints else {
                    error!(
                        start_time = %at.to_rfc3339(),
                        "RDP session has no IPv4 address pair; this session will not be stored"
                    );
                    return LifecycleOutcome::OpenDropped;
                };
                match self.store.create_session(host_ip, client_ip, *at) {
                    Ok(id) => {
                        info!(
                            session_id = %id,
                            host_ip = %host_ip,
                            client_ip = %client_ip,
                            start_time = %at.to_rfc3339(),
                            "RDP session opened"
                        );
                        state.current_session_id = Some(id);
                        LifecycleOutcome::Recorded(id)
                    }
                    Err(err) => {
                        error!(
                            error = %err,
                            host_ip = %host_ip,
                            client_ip = %client_ip,
                            start_time = %at.to_rfc3339(),
                            "Failed to record RDP session; this session will not be stored"
                        );
                        LifecycleOutcome::OpenDropped
                    }
                }
            }
            Some(SessionEvent::Closed { at }) => {
                let Some(id) = state.current_session_id.take() else {
                    warn!(
                        end_time = %at.to_rfc3339(),
                        "RDP session closed without a stored record; skipping close"
                    );
                    return LifecycleOutcome::CloseSuppressed;
                };
                match self.store.close_session(id, *at) {
                    Ok(()) => {
                        info!(
                            session_id = %id,
                            end_time = %at.to_rfc3339(),
                            "RDP session closed"
                        );
                        LifecycleOutcome::Finalized(id)
                    }
                    Err(err) => {
                        error!(
                            error = %err,
                            session_id = %id,
                            end_time = %at.to_rfc3339(),
                            "Failed to close RDP session record; it will remain open"
                        );
                        LifecycleOutcome::CloseFailed(id)
                    }
                }
            }
        }
    }
}
