//! Ctrl+C handling: the handler only sets a flag and wakes waiters.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tokio::sync::Notify;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static INTERRUPT_NOTIFY: OnceLock<Notify> = OnceLock::new();

#[derive(Debug)]
pub struct InterruptedError;

impl std::fmt::Display for InterruptedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interrupted")
    }
}

impl std::error::Error for InterruptedError {}

/// Installs the Ctrl+C handler. A second Ctrl+C exits immediately.
///
/// # Errors
/// Returns an error if a handler is already installed.
pub fn init() -> Result<()> {
    ctrlc::set_handler(trigger).context("Failed to set Ctrl+C handler")
}

fn trigger() {
    if INTERRUPTED.swap(true, Ordering::SeqCst) {
        std::process::exit(130);
    }
    INTERRUPT_NOTIFY.get_or_init(Notify::new).notify_waiters();
}

pub fn is_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Waits until Ctrl+C is pressed.
pub async fn wait_for_interrupt() {
    loop {
        let notified = INTERRUPT_NOTIFY.get_or_init(Notify::new).notified();
        if is_interrupted() {
            return;
        }
        notified.await;
    }
}
