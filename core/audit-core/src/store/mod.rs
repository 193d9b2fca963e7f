//! Durable session records.
//!
//! The lifecycle controller only needs the two write operations of
//! [`SessionStore`]; reporting tools use the read helpers on
//! [`SqliteSessionStore`] directly.

mod sqlite;

pub use sqlite::SqliteSessionStore;

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::StoreError;
use crate::types::SessionId;

pub trait SessionStore {
    /// Inserts a new open record and returns its store-assigned id.
    fn create_session(
        &self,
        host_ip: &str,
        client_ip: &str,
        start_time: DateTime<Utc>,
    ) -> Result<SessionId, StoreError>;

    /// Sets the end time of an open record. A record is closed at most once.
    fn close_session(&self, id: SessionId, end_time: DateTime<Utc>) -> Result<(), StoreError>;
}

impl<S: SessionStore + ?Sized> SessionStore for Arc<S> {
    fn create_session(
        &self,
        host_ip: &str,
        client_ip: &str,
        start_time: DateTime<Utc>,
    ) -> Result<SessionId, StoreError> {
        (**self).create_session(host_ip, client_ip, start_time)
    }

    fn close_session(&self, id: SessionId, end_time: DateTime<Utc>) -> Result<(), StoreError> {
        (**self).close_session(id, end_time)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub open_only: bool,
    pub limit: Option<usize>,
}
