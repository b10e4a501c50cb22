//! Human-facing status messages.
//!
//! Every dispatch outcome and every watchdog transition produces one line of
//! text for the operator. The transport is up to the [`Notifier`]
//! implementation; tracing diagnostics are kept separate from these messages.

use std::io::Write;

/// Receives human-readable status strings.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Writes each message as one line on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, message: &str) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{}", message);
    }
}

/// Discards messages.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _message: &str) {}
}
