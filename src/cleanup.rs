//! Program-exit safety net for spawned process groups
//!
//! Every spawned child registers its process group here; a hook installed
//! once per program via `atexit` kills whatever is still registered when the
//! supervising program exits normally. `terminate()` deregisters its group,
//! so the hook only ever fires for handles the caller forgot to close. This
//! is the primary guard against orphaned descendants outliving the program;
//! `Drop` on the handle is a best-effort bonus, not a guarantee.

#![allow(unsafe_code)]

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::sync::{Mutex, Once, PoisonError};
use tracing::debug;

static INSTALL_HOOK: Once = Once::new();
static GROUPS: Mutex<Vec<i32>> = Mutex::new(Vec::new());

/// Track `pgid` for kill-on-exit, installing the exit hook on first use
pub(crate) fn register(pgid: Pid) {
    INSTALL_HOOK.call_once(|| {
        // Safety: kill_registered_groups is a plain extern "C" fn that
        // cannot unwind across the FFI boundary.
        unsafe {
            libc::atexit(kill_registered_groups);
        }
    });

    groups().push(pgid.as_raw());
    debug!("Registered process group {} for exit cleanup", pgid);
}

/// Stop tracking `pgid`; called when a handle is terminated explicitly
pub(crate) fn unregister(pgid: Pid) {
    groups().retain(|&g| g != pgid.as_raw());
    debug!("Deregistered process group {} from exit cleanup", pgid);
}

fn groups() -> std::sync::MutexGuard<'static, Vec<i32>> {
    GROUPS.lock().unwrap_or_else(PoisonError::into_inner)
}

extern "C" fn kill_registered_groups() {
    // Runs during process teardown: no logging, no panicking, ignore every
    // delivery failure.
    let groups = match GROUPS.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    for &pgid in groups.iter() {
        let _ = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
    }
}

#[cfg(test)]
pub(crate) fn registered_groups() -> Vec<i32> {
    groups().clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_unregister_round_trip() {
        // Values no real process will use; other tests may hold entries of
        // their own concurrently, so only check for our sentinels.
        let a = Pid::from_raw(8_000_101);
        let b = Pid::from_raw(8_000_102);

        register(a);
        register(b);
        let snapshot = registered_groups();
        assert!(snapshot.contains(&a.as_raw()));
        assert!(snapshot.contains(&b.as_raw()));

        unregister(a);
        let snapshot = registered_groups();
        assert!(!snapshot.contains(&a.as_raw()));
        assert!(snapshot.contains(&b.as_raw()));

        unregister(b);
        assert!(!registered_groups().contains(&b.as_raw()));
    }

    #[test]
    fn unregister_unknown_group_is_a_no_op() {
        unregister(Pid::from_raw(8_000_999));
    }
}
