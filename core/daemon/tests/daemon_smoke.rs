#![cfg(unix)]

use rdp_audit_core::{SessionFilter, SqliteSessionStore};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const RDP_LINE: &str =
    "tcp        0      0 10.0.0.5:3389           203.0.113.9:51234       ESTABLISHED\n";

struct DaemonGuard {
    child: Child,
}

impl Drop for DaemonGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn write_config(home: &Path, table: &str) -> PathBuf {
    let path = home.join("config.toml");
    let script = format!("printf '{}'", table.replace('\n', "\\n"));
    let config = format!(
        r#"[monitor]
tick_interval_ms = 50

[provider]
command = "sh"
args = ["-c", "{script}"]

[logging]
log_dir = "{logs}"
"#,
        logs = home.join("logs").display(),
    );
    fs::write(&path, config).expect("Failed to write config");
    path
}

fn daemon(home: &Path, config: &Path, db: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_rdp-audit-daemon"));
    command
        .env("HOME", home)
        .arg("--config")
        .arg(config)
        .arg("--db")
        .arg(db);
    command
}

fn run_once(home: &Path, config: &Path, db: &Path) -> Output {
    daemon(home, config, db)
        .arg("--once")
        .output()
        .expect("Failed to run rdp-audit-daemon")
}

#[test]
fn single_tick_records_open_session() {
    let home = TempDir::new().expect("Failed to create temp home");
    let config = write_config(home.path(), RDP_LINE);
    let db = home.path().join("sessions.db");

    let output = run_once(home.path(), &config, &db);
    assert!(
        output.status.success(),
        "daemon failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let store = SqliteSessionStore::open(db).expect("Failed to open session db");
    let records = store
        .list_sessions(&SessionFilter::default())
        .expect("Failed to list sessions");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].host_ip, "10.0.0.5");
    assert_eq!(records[0].client_ip, "203.0.113.9");
    assert!(records[0].end_time.is_none());
}

#[test]
fn dual_stack_listener_records_ipv4_addresses() {
    let home = TempDir::new().expect("Failed to create temp home");
    let config = write_config(
        home.path(),
        "tcp6       0      0 ::ffff:10.0.0.5:3389    ::ffff:203.0.113.9:51234 ESTABLISHED\n",
    );
    let db = home.path().join("sessions.db");

    let output = run_once(home.path(), &config, &db);
    assert!(output.status.success());

    let store = SqliteSessionStore::open(db).expect("Failed to open session db");
    let records = store
        .list_sessions(&SessionFilter::default())
        .expect("Failed to list sessions");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].host_ip, "10.0.0.5");
    assert_eq!(records[0].client_ip, "203.0.113.9");
}

#[test]
fn idle_tick_writes_nothing() {
    let home = TempDir::new().expect("Failed to create temp home");
    let config = write_config(home.path(), "");
    let db = home.path().join("sessions.db");

    let output = run_once(home.path(), &config, &db);
    assert!(output.status.success());

    let store = SqliteSessionStore::open(db).expect("Failed to open session db");
    assert_eq!(store.open_session_count().expect("count"), 0);
}

#[test]
fn invalid_config_exits_nonzero() {
    let home = TempDir::new().expect("Failed to create temp home");
    let config = home.path().join("config.toml");
    fs::write(&config, "[monitor]\nmiss_threshold = 0\n").expect("Failed to write config");

    let output = run_once(home.path(), &config, &home.path().join("sessions.db"));
    assert!(!output.status.success());
}

#[test]
fn sigterm_stops_the_daemon_cleanly() {
    let home = TempDir::new().expect("Failed to create temp home");
    let config = write_config(home.path(), RDP_LINE);
    let db = home.path().join("sessions.db");

    let child = daemon(home.path(), &config, &db)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn rdp-audit-daemon");
    let mut guard = DaemonGuard { child };

    let store = SqliteSessionStore::open(db).expect("Failed to open session db");
    let deadline = Instant::now() + Duration::from_secs(5);
    while store.open_session_count().unwrap_or(0) == 0 {
        assert!(Instant::now() < deadline, "daemon never recorded a session");
        sleep(Duration::from_millis(25));
    }

    let status = Command::new("kill")
        .arg("-TERM")
        .arg(guard.child.id().to_string())
        .status()
        .expect("Failed to run kill");
    assert!(status.success());

    let deadline = Instant::now() + Duration::from_secs(5);
    let status = loop {
        if let Some(status) = guard.child.try_wait().expect("Failed to poll daemon") {
            break status;
        }
        assert!(Instant::now() < deadline, "daemon ignored SIGTERM");
        sleep(Duration::from_millis(25));
    };
    assert!(status.success());
    assert_eq!(store.open_session_count().expect("count"), 1);
}
