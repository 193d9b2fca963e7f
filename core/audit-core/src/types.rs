//! Shared data types for the detection pipeline and the session store.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;

/// Well-known RDP listener port.
pub const DEFAULT_RDP_PORT: u16 = 3389;

/// Store-assigned identifier of a [`SessionRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Udp,
}

impl Transport {
    /// Parses a protocol column label such as `TCP`, `tcp`, `tcp4` or `udp6`.
    pub fn from_label(label: &str) -> Option<Self> {
        let lower = label.to_ascii_lowercase();
        match lower.trim_end_matches(['4', '6']) {
            "tcp" => Some(Transport::Tcp),
            "udp" => Some(Transport::Udp),
            _ => None,
        }
    }
}

/// One row of the host's connection table as reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEntry {
    pub transport: Transport,
    pub local_address: String,
    pub local_port: u16,
    pub remote_address: String,
    pub remote_port: u16,
    pub state: String,
}

impl ConnectionEntry {
    pub fn is_established(&self) -> bool {
        self.state.eq_ignore_ascii_case("ESTABLISHED")
    }

    pub fn touches_port(&self, port: u16) -> bool {
        self.local_port == port || self.remote_port == port
    }
}

/// Host (local) and client (remote) IPv4 addresses of an RDP connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub host_ip: String,
    pub client_ip: String,
}

impl Endpoints {
    pub fn new(host_ip: impl Into<String>, client_ip: impl Into<String>) -> Self {
        Self {
            host_ip: host_ip.into(),
            client_ip: client_ip.into(),
        }
    }
}

/// The minimal fact extracted from one connection table snapshot.
///
/// A sample is active whenever an ESTABLISHED TCP connection touches the RDP
/// port. `endpoints` is `None` when no such connection has an IPv4 address
/// pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSample {
    Inactive,
    Active { endpoints: Option<Endpoints> },
}

impl ConnectionSample {
    pub fn active(host_ip: impl Into<String>, client_ip: impl Into<String>) -> Self {
        ConnectionSample::Active {
            endpoints: Some(Endpoints::new(host_ip, client_ip)),
        }
    }

    pub fn active_without_endpoints() -> Self {
        ConnectionSample::Active { endpoints: None }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionSample::Active { .. })
    }
}

/// Lifecycle event emitted by the state machine, at most one per tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Opened {
        endpoints: Option<Endpoints>,
        at: DateTime<Utc>,
    },
    Closed {
        at: DateTime<Utc>,
    },
}

/// A persisted session. `end_time` is `None` while the session is open, or
/// forever if the monitor stopped (or the close write failed) mid-session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub host_ip: String,
    pub client_ip: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl SessionRecord {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Length of the session, measured up to `now` for records without an end.
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        let end = self.end_time.unwrap_or(now);
        end.signed_duration_since(self.start_time)
            .max(Duration::zero())
    }
}
