use std::net::Ipv4Addr;
use std::process::Command;

use tracing::trace;

use super::ConnectionTableProvider;
use crate::config::ProviderSettings;
use crate::error::ProviderError;
use crate::types::{ConnectionEntry, Transport};

/// Runs a `netstat`-style command and parses its output.
#[derive(Debug, Clone)]
pub struct CommandConnectionProvider {
    command: String,
    args: Vec<String>,
}

impl CommandConnectionProvider {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    pub fn from_settings(settings: &ProviderSettings) -> Self {
        Self::new(settings.command.clone(), settings.args.clone())
    }

    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

impl ConnectionTableProvider for CommandConnectionProvider {
    fn connections(&self) -> Result<Vec<ConnectionEntry>, ProviderError> {
        let output = Command::new(&self.command)
            .args(&self.args)
            .output()
            .map_err(|source| ProviderError::Spawn {
                command: self.command_line(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProviderError::CommandFailed {
                command: self.command_line(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(parse_connection_table(&String::from_utf8_lossy(
            &output.stdout,
        )))
    }
}

/// Parses netstat output from Windows, Linux or BSD/macOS.
///
/// Header lines and lines that do not carry a protocol, two endpoints and a
/// state are skipped.
pub fn parse_connection_table(output: &str) -> Vec<ConnectionEntry> {
    output
        .lines()
        .filter_map(|line| {
            let entry = parse_line(line);
            if entry.is_none() && !line.trim().is_empty() {
                trace!(line = %line.trim(), "Skipping connection table line");
            }
            entry
        })
        .collect()
}

fn parse_line(line: &str) -> Option<ConnectionEntry> {
    let mut tokens = line.split_whitespace();
    let transport = Transport::from_label(tokens.next()?)?;
    let rest: Vec<&str> = tokens.collect();

    let mut endpoints = rest
        .iter()
        .enumerate()
        .filter_map(|(index, token)| split_endpoint(token).map(|endpoint| (index, endpoint)));
    let (_, (local_address, local_port)) = endpoints.next()?;
    let (remote_index, (remote_address, remote_port)) = endpoints.next()?;

    // Trailing columns (PID, program) vary by platform; the state always
    // follows the remote endpoint.
    let state = rest
        .get(remote_index + 1)
        .filter(|token| token.chars().all(|c| c.is_ascii_alphabetic() || c == '_'))?;

    Some(ConnectionEntry {
        transport,
        local_address,
        local_port,
        remote_address,
        remote_port,
        state: state.to_ascii_uppercase(),
    })
}

fn split_endpoint(token: &str) -> Option<(String, u16)> {
    if let Some(rest) = token.strip_prefix('[') {
        let (address, port) = rest.split_once("]:")?;
        return Some((address.to_string(), port.parse().ok()?));
    }

    if let Some((address, port)) = token.rsplit_once(':') {
        if address.is_empty() {
            return None;
        }
        return Some((address.to_string(), port.parse().ok()?));
    }

    // BSD netstat separates the port with a dot: 10.0.0.5.3389
    let (address, port) = token.rsplit_once('.')?;
    address.parse::<Ipv4Addr>().ok()?;
    Some((address.to_string(), port.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_windows_netstat() {
        let raw = "
Active Connections

  Proto  Local Address          Foreign Address        State
  TCP    10.0.0.5:3389          203.0.113.9:51234      ESTABLISHED
  TCP    10.0.0.5:49710         52.96.0.1:443          TIME_WAIT
  TCP    [::1]:3389             [::1]:50001            ESTABLISHED
";
        let entries = parse_connection_table(raw);
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries[0],
            ConnectionEntry {
                transport: Transport::Tcp,
                local_address: "10.0.0.5".to_string(),
                local_port: 3389,
                remote_address: "203.0.113.9".to_string(),
                remote_port: 51234,
                state: "ESTABLISHED".to_string(),
            }
        );
        assert_eq!(entries[1].state, "TIME_WAIT");
        assert_eq!(entries[2].local_address, "::1");
        assert_eq!(entries[2].remote_port, 50001);
    }

    #[test]
    fn parses_linux_netstat() {
        let raw = "\
Active Internet connections (w/o servers)
Proto Recv-Q Send-Q Local Address           Foreign Address         State
tcp        0      0 10.0.0.5:3389           203.0.113.9:51234       ESTABLISHED
tcp6       0      0 :::3389                 :::*                    LISTEN
tcp        0     36 10.0.0.5:22             198.51.100.4:60022      ESTABLISHED
";
        let entries = parse_connection_table(raw);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].local_port, 3389);
        assert_eq!(entries[0].remote_address, "203.0.113.9");
        assert_eq!(entries[1].local_port, 22);
    }

    #[test]
    fn parses_bsd_netstat() {
        let raw = "\
Active Internet connections
Proto Recv-Q Send-Q  Local Address          Foreign Address        (state)
tcp4       0      0  10.0.0.5.3389          203.0.113.9.51234      ESTABLISHED
tcp4       0      0  *.3389                 *.*                    LISTEN
";
        let entries = parse_connection_table(raw);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].local_address, "10.0.0.5");
        assert_eq!(entries[0].local_port, 3389);
        assert_eq!(entries[0].remote_address, "203.0.113.9");
        assert_eq!(entries[0].remote_port, 51234);
    }

    #[test]
    fn parses_dual_stack_ipv4_mapped_endpoints() {
        let raw = "tcp6       0      0 ::ffff:10.0.0.5:3389    ::ffff:203.0.113.9:51234 ESTABLISHED\n";
        let entries = parse_connection_table(raw);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].transport, Transport::Tcp);
        assert_eq!(entries[0].local_address, "::ffff:10.0.0.5");
        assert_eq!(entries[0].local_port, 3389);
        assert_eq!(entries[0].remote_address, "::ffff:203.0.113.9");
        assert_eq!(entries[0].remote_port, 51234);
        assert_eq!(entries[0].state, "ESTABLISHED");
    }

    #[test]
    fn state_is_taken_after_remote_endpoint() {
        let raw = "  TCP    10.0.0.5:3389   203.0.113.9:51234   ESTABLISHED     1234\n";
        let entries = parse_connection_table(raw);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].state, "ESTABLISHED");
    }

    #[test]
    fn skips_garbage_lines() {
        let raw = "garbage\nTCP only-one-token\nTCP 10.0.0.5:3389\nTCP 10.0.0.5:99999 1.2.3.4:5 ESTABLISHED\n";
        assert!(parse_connection_table(raw).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn command_provider_parses_stdout() {
        let provider = CommandConnectionProvider::new(
            "sh",
            vec![
                "-c".to_string(),
                "printf 'tcp 0 0 10.0.0.5:3389 203.0.113.9:51234 ESTABLISHED\\n'".to_string(),
            ],
        );
        let entries = provider.connections().expect("connections");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].remote_address, "203.0.113.9");
    }

    #[cfg(unix)]
    #[test]
    fn command_provider_reports_non_zero_exit() {
        let provider =
            CommandConnectionProvider::new("sh", vec!["-c".to_string(), "exit 3".to_string()]);
        let err = provider.connections().expect_err("exit status");
        assert!(matches!(err, ProviderError::CommandFailed { .. }));
    }

    #[test]
    fn command_provider_reports_missing_binary() {
        let provider = CommandConnectionProvider::new("rdp-audit-no-such-binary", Vec::new());
        let err = provider.connections().expect_err("missing binary");
        assert!(matches!(err, ProviderError::Spawn { .. }));
    }
}
