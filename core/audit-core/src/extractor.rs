use std::net::{IpAddr, Ipv4Addr};

use tracing::trace;

use crate::types::{ConnectionEntry, ConnectionSample, Endpoints, Transport};

/// Reduces a connection table snapshot to a single [`ConnectionSample`].
///
/// The sample is active when any entry is TCP, ESTABLISHED and has `port` on
/// either end. The first such entry whose endpoints are both IPv4 supplies
/// the host (local) and client (remote) addresses; IPv4-mapped IPv6
/// addresses (`::ffff:a.b.c.d`) count as IPv4.
pub fn extract(connections: &[ConnectionEntry], port: u16) -> ConnectionSample {
    let mut matching = connections
        .iter()
        .filter(|entry| {
            entry.transport == Transport::Tcp && entry.touches_port(port) && entry.is_established()
        })
        .peekable();

    if matching.peek().is_none() {
        return ConnectionSample::Inactive;
    }

    let endpoints = matching.find_map(|entry| {
        match (ipv4(&entry.local_address), ipv4(&entry.remote_address)) {
            (Some(host), Some(client)) => {
                Some(Endpoints::new(host.to_string(), client.to_string()))
            }
            _ => {
                trace!(
                    local = %entry.local_address,
                    remote = %entry.remote_address,
                    "Connection entry has no IPv4 address pair"
                );
                None
            }
        }
    });

    ConnectionSample::Active { endpoints }
}

fn ipv4(address: &str) -> Option<Ipv4Addr> {
    match address.parse::<IpAddr>().ok()? {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(v6) => v6.to_ipv4_mapped(),
    }
}
