//! Ctrl-C handling.
//!
//! SIGINT does not kill the process. It raises a flag that long running
//! operations poll between steps, so they can clean up before exiting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

use crate::error::{Error, Result};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigint(_: nix::libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Route SIGINT into the process-wide interrupt flag.
pub fn install_interrupt_handler() -> Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(on_sigint),
        SaFlags::empty(),
        SigSet::empty(),
    );
    // SAFETY: the handler only stores into an atomic.
    unsafe { sigaction(Signal::SIGINT, &action) }
        .map_err(|e| Error::io("failed to install SIGINT handler", e.into()))?;
    Ok(())
}

#[derive(Debug, Clone)]
enum Flag {
    Process,
    Local(Arc<AtomicBool>),
}

/// Cancellation token handed to every pipeline.
#[derive(Debug, Clone)]
pub struct Cancellation {
    flag: Flag,
}

impl Cancellation {
    /// Token tied to the SIGINT flag.
    pub fn interrupt() -> Self {
        Self {
            flag: Flag::Process,
        }
    }

    /// Token that is only cancelled through [`Cancellation::cancel`].
    pub fn manual() -> Self {
        Self {
            flag: Flag::Local(Arc::new(AtomicBool::new(false))),
        }
    }

    pub fn cancel(&self) {
        match &self.flag {
            Flag::Process => INTERRUPTED.store(true, Ordering::SeqCst),
            Flag::Local(flag) => flag.store(true, Ordering::SeqCst),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match &self.flag {
            Flag::Process => INTERRUPTED.load(Ordering::SeqCst),
            Flag::Local(flag) => flag.load(Ordering::SeqCst),
        }
    }

    /// `Err(Error::Cancelled)` once cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}
