//! Session detection state machine.
//!
//! Converts the per-tick "is port 3389 active?" signal into discrete
//! open/close events. A session opens on the first active sample and closes
//! only after `miss_threshold` consecutive inactive samples, so transient
//! empty reads from the connection table do not split a session.
//!
//! ```text
//! Idle     --active-->                        Active    (emit Opened)
//! Active   --active-->                        Active
//! Active   --inactive, misses < threshold-->  Draining
//! Draining --active-->                        Active    (misses reset)
//! Draining --inactive, misses < threshold-->  Draining
//! Active/Draining --inactive, misses == threshold--> Idle (emit Closed)
//! ```
//!
//! `advance` is a pure function of the current state and one sample.

use chrono::{DateTime, Utc};

use crate::types::{ConnectionSample, SessionEvent, SessionId};

pub const DEFAULT_MISS_THRESHOLD: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Active,
    Draining,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Active => "active",
            Phase::Draining => "draining",
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, Phase::Idle)
    }
}

/// Process-wide detection state, owned exclusively by the ticker.
///
/// `current_session_id` is written only by the lifecycle controller; it stays
/// `None` through an open phase whose record could not be created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDetectionState {
    pub phase: Phase,
    pub miss_count: u8,
    pub current_session_id: Option<SessionId>,
}

/// Number of consecutive inactive samples that ends a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Debounce {
    miss_threshold: u8,
}

impl Debounce {
    /// A threshold of zero is treated as one: a session always survives
    /// until at least one inactive sample is seen.
    pub fn new(miss_threshold: u8) -> Self {
        Self {
            miss_threshold: miss_threshold.max(1),
        }
    }

    pub fn miss_threshold(&self) -> u8 {
        self.miss_threshold
    }
}

impl Default for Debounce {
    fn default() -> Self {
        Self::new(DEFAULT_MISS_THRESHOLD)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: SessionDetectionState,
    pub event: Option<SessionEvent>,
}

pub fn advance(
    state: &SessionDetectionState,
    sample: &ConnectionSample,
    now: DateTime<Utc>,
    debounce: Debounce,
) -> Transition {
    let session_id = state.current_session_id;

    match (state.phase, sample) {
        (Phase::Idle, ConnectionSample::Active { endpoints }) => Transition {
            state: SessionDetectionState {
                phase: Phase::Active,
                miss_count: 0,
                current_session_id: session_id,
            },
            event: Some(SessionEvent::Opened {
                endpoints: endpoints.clone(),
                at: now,
            }),
        },
        (Phase::Idle, ConnectionSample::Inactive) => Transition {
            state: SessionDetectionState {
                phase: Phase::Idle,
                miss_count: 0,
                current_session_id: session_id,
            },
            event: None,
        },
        // Addresses from later samples are ignored once a session is open.
        (Phase::Active | Phase::Draining, ConnectionSample::Active { .. }) => Transition {
            state: SessionDetectionState {
                phase: Phase::Active,
                miss_count: 0,
                current_session_id: session_id,
            },
            event: None,
        },
        (Phase::Active | Phase::Draining, ConnectionSample::Inactive) => {
            let misses = state.miss_count.saturating_add(1);
            if misses >= debounce.miss_threshold() {
                Transition {
                    state: SessionDetectionState {
                        phase: Phase::Idle,
                        miss_count: 0,
                        current_session_id: session_id,
                    },
                    event: Some(SessionEvent::Closed { at: now }),
                }
            } else {
                Transition {
                    state: SessionDetectionState {
                        phase: Phase::Draining,
                        miss_count: misses,
                        current_session_id: session_id,
                    },
                    event: None,
                }
            }
        }
    }
}
