//! Shutdown flag set by Ctrl-C, SIGINT, SIGTERM or a Windows console close.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Installs the process-wide handler and returns the flag it sets.
///
/// The handler only flips the flag; the ticker finishes its in-flight tick
/// before it observes the request.
pub fn install() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })?;
    Ok(shutdown)
}
