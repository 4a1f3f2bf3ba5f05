// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Abort handling before the handoff.
//!
//! A termination request during bootstrap ends the process at once with
//! `128 + signo`. Nothing is cleaned up: documents are written atomically, so
//! an abort never leaves a partial file behind. `exec` resets caught signals
//! to their defaults, so the gateway starts with normal signal behavior.

use anyhow::{Context, Result};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

const ABORT_SIGNALS: [Signal; 4] = [Signal::SIGTERM, Signal::SIGINT, Signal::SIGHUP, Signal::SIGQUIT];

/// Shell convention for "terminated by signal"
pub const fn abort_exit_code(signo: libc::c_int) -> libc::c_int {
    128 + signo
}

extern "C" fn abort_on_signal(signo: libc::c_int) {
    // async-signal-safe: _exit only
    unsafe { libc::_exit(abort_exit_code(signo)) }
}

pub fn install_abort_handlers() -> Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(abort_on_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );
    for signal in ABORT_SIGNALS {
        // SAFETY: the handler only calls _exit, which is async-signal-safe
        unsafe { sigaction(signal, &action) }
            .with_context(|| format!("Failed to install {} handler", signal.as_str()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_exit_codes() {
        assert_eq!(abort_exit_code(libc::SIGTERM), 143);
        assert_eq!(abort_exit_code(libc::SIGINT), 130);
        assert_eq!(abort_exit_code(libc::SIGHUP), 129);
        assert_eq!(abort_exit_code(libc::SIGQUIT), 131);
    }
}
