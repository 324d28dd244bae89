//! Interrupt handling.
//!
//! The first SIGINT only raises a flag: the scheduler stops admitting new
//! steps, lets in-flight toolchain processes finish, and reports aggregate
//! failure.  The handler then restores the default disposition so a second
//! interrupt kills the process outright.

use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

pub fn was_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

#[cfg(unix)]
mod unix {
    use super::INTERRUPTED;
    use std::sync::atomic::Ordering;

    fn sigint_action(handler: libc::sighandler_t) {
        // Safety: registering a signal handler is libc unsafe code.
        unsafe {
            let mut sa: libc::sigaction = std::mem::zeroed();
            sa.sa_sigaction = handler;
            libc::sigaction(libc::SIGINT, &sa, std::ptr::null_mut());
        }
    }

    extern "C" fn sigint_handler(_sig: libc::c_int) {
        INTERRUPTED.store(true, Ordering::SeqCst);
        sigint_action(libc::SIG_DFL as libc::sighandler_t);
    }

    pub fn register() {
        sigint_action(sigint_handler as extern "C" fn(libc::c_int) as libc::sighandler_t);
    }
}

#[cfg(unix)]
pub use unix::register;

#[cfg(not(unix))]
pub fn register() {}
