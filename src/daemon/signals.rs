//! Signal dispatch for the daemon process
//!
//! Handlers run in async-signal context, so they do nothing but set a flag;
//! the main loop drains the flags at the top of each tick. SIGTERM, SIGINT
//! and SIGTSTP all map to the single "end" action; SIGUSR1/SIGUSR2 request a
//! status dump.

use std::sync::atomic::{AtomicBool, Ordering};

use libc::c_int;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

use super::DaemonError;

static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);
static STATUS_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_stop(_signum: c_int) {
    STOP_REQUESTED.store(true, Ordering::SeqCst);
}

extern "C" fn on_status(_signum: c_int) {
    STATUS_REQUESTED.store(true, Ordering::SeqCst);
}

/// Install the daemon's handlers. Call once, after the pid lock is held.
pub fn install() -> Result<(), DaemonError> {
    let stop = SigAction::new(SigHandler::Handler(on_stop), SaFlags::SA_RESTART, SigSet::empty());
    let status =
        SigAction::new(SigHandler::Handler(on_status), SaFlags::SA_RESTART, SigSet::empty());

    for signal in [Signal::SIGTERM, Signal::SIGINT, Signal::SIGTSTP] {
        unsafe { sigaction(signal, &stop) }?;
    }
    for signal in [Signal::SIGUSR1, Signal::SIGUSR2] {
        unsafe { sigaction(signal, &status) }?;
    }
    Ok(())
}

/// Whether a stop has been requested. Sticky: once set it stays set until
/// the process exits.
pub fn stop_requested() -> bool {
    STOP_REQUESTED.load(Ordering::SeqCst)
}

/// Consume a pending status request.
pub fn take_status_request() -> bool {
    STATUS_REQUESTED.swap(false, Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Flags only; the sigaction plumbing needs a real process and is covered
    // by running the daemon.
    #[test]
    fn test_status_flag_is_consumed() {
        STATUS_REQUESTED.store(true, Ordering::SeqCst);
        assert!(take_status_request());
        assert!(!take_status_request());
    }

    #[test]
    fn test_stop_flag_is_sticky() {
        STOP_REQUESTED.store(true, Ordering::SeqCst);
        assert!(stop_requested());
        assert!(stop_requested());
        STOP_REQUESTED.store(false, Ordering::SeqCst);
    }
}
