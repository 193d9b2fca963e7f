//! Connection table acquisition.

mod netstat;

pub use netstat::{parse_connection_table, CommandConnectionProvider};

use crate::error::ProviderError;
use crate::types::ConnectionEntry;

/// Returns the TCP connections visible to the host at the time of the call.
pub trait ConnectionTableProvider: Send {
    fn connections(&self) -> Result<Vec<ConnectionEntry>, ProviderError>;
}
