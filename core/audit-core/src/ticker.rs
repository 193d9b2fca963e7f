//! Sequential tick driver.
//!
//! Owns the only [`SessionDetectionState`] and runs the whole pipeline to
//! completion once per tick. A tick that overruns the interval delays the
//! next one; ticks never overlap.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::MonitorSettings;
use crate::detector::{advance, Debounce, Phase, SessionDetectionState};
use crate::extractor::extract;
use crate::lifecycle::{LifecycleOutcome, SessionLifecycle};
use crate::provider::ConnectionTableProvider;
use crate::store::SessionStore;
use crate::types::{ConnectionSample, SessionEvent};

const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub sample_active: bool,
    pub phase: Phase,
    pub miss_count: u8,
    pub event: Option<SessionEvent>,
    pub outcome: LifecycleOutcome,
}

#[derive(Debug)]
pub struct Ticker<P, S> {
    provider: P,
    lifecycle: SessionLifecycle<S>,
    debounce: Debounce,
    rdp_port: u16,
    state: SessionDetectionState,
}

impl<P: ConnectionTableProvider, S: SessionStore> Ticker<P, S> {
    pub fn new(provider: P, store: S, settings: &MonitorSettings) -> Self {
        Self {
            provider,
            lifecycle: SessionLifecycle::new(store),
            debounce: settings.debounce(),
            rdp_port: settings.rdp_port,
            state: SessionDetectionState::default(),
        }
    }

    pub fn state(&self) -> &SessionDetectionState {
        &self.state
    }

    pub fn store(&self) -> &S {
        self.lifecycle.store()
    }

    /// Takes one sample. Provider failures count as an inactive sample so an
    /// outage drains and eventually closes an open session.
    pub fn sample(&self) -> ConnectionSample {
        match self.provider.connections() {
            Ok(entries) => extract(&entries, self.rdp_port),
            Err(err) => {
                warn!(error = %err, "Failed to read connection table; treating tick as inactive");
                ConnectionSample::Inactive
            }
        }
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> TickReport {
        let sample = self.sample();
        let transition = advance(&self.state, &sample, now, self.debounce);
        self.state = transition.state;
        let outcome = self
            .lifecycle
            .apply(&mut self.state, transition.event.as_ref());

        debug!(
            active = sample.is_active(),
            phase = self.state.phase.as_str(),
            miss_count = self.state.miss_count,
            "Tick"
        );

        TickReport {
            sample_active: sample.is_active(),
            phase: self.state.phase,
            miss_count: self.state.miss_count,
            event: transition.event,
            outcome,
        }
    }

    /// Ticks every `interval` until `shutdown` is set, then returns the number
    /// of ticks run. An in-flight tick always completes; an open session is
    /// left without an end time.
    pub fn run(&mut self, interval: Duration, shutdown: &AtomicBool) -> u64 {
        let mut ticks = 0u64;
        while !shutdown.load(Ordering::SeqCst) {
            let started = Instant::now();
            self.tick(Utc::now());
            ticks = ticks.saturating_add(1);

            let deadline = started + interval;
            loop {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                thread::sleep((deadline - now).min(SHUTDOWN_POLL));
            }
        }

        if self.state.phase.is_open() {
            info!(
                session_id = ?self.state.current_session_id,
                phase = self.state.phase.as_str(),
                "Stopping with an RDP session in progress; its record keeps no end time"
            );
        }
        ticks
    }
}
