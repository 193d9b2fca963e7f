//! # rdp-audit-core
//!
//! Detects remote-desktop sessions by sampling the host's TCP connection
//! table once per tick and records each session's start and end time.
//!
//! ## Pipeline
//!
//! Each tick flows strictly downward:
//!
//! ```text
//! ConnectionTableProvider -> extract -> advance -> SessionLifecycle -> SessionStore
//! ```
//!
//! - **Synchronous**: no async runtime. The [`Ticker`] runs ticks back to back
//!   on the calling thread and never overlaps them.
//! - **Pure core**: [`extract`] and [`advance`] perform no I/O; all side effects
//!   live in the provider, the lifecycle controller and the store.
//! - **Nothing is fatal after startup**: provider failures become inactive
//!   samples and store failures are logged and dropped.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rdp_audit_core::{load_config, CommandConnectionProvider, SqliteSessionStore, Ticker};
//!
//! let config = load_config(None)?;
//! let store = SqliteSessionStore::open(config.db_path()?)?;
//! let provider = CommandConnectionProvider::from_settings(&config.provider);
//! let mut ticker = Ticker::new(provider, store, &config.monitor);
//! let report = ticker.tick(chrono::Utc::now());
//! ```

pub mod config;
pub mod detector;
pub mod error;
pub mod extractor;
pub mod lifecycle;
pub mod provider;
pub mod store;
pub mod ticker;
pub mod types;

pub use config::{
    audit_dir, default_config_path, load_config, AuditConfig, LoggingSettings, MonitorSettings,
    ProviderSettings, StoreSettings,
};
pub use detector::{advance, Debounce, Phase, SessionDetectionState, Transition};
pub use error::{ConfigError, ProviderError, StoreError};
pub use extractor::extract;
pub use lifecycle::{LifecycleOutcome, SessionLifecycle};
pub use provider::{CommandConnectionProvider, ConnectionTableProvider};
pub use store::{SessionFilter, SessionStore, SqliteSessionStore};
pub use ticker::{TickReport, Ticker};
pub use types::*;
