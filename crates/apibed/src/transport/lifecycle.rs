//! Bounded shutdown helpers for the emulator process.

use std::process::{Child, ExitStatus};
use std::sync::{Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::TRANSPORT_TARGET;

/// How often shutdown re-checks a lock or the child's exit status.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How the child left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shutdown {
    /// Exited on its own within the grace period.
    Exited(ExitStatus),
    /// Still running at the deadline and killed.
    Killed,
}

/// Acquires `mutex`, giving up once `deadline` passes.
///
/// Poisoned locks are recovered; shutdown must proceed even after a panic.
pub(crate) fn lock_until<T>(mutex: &Mutex<T>, deadline: Instant) -> Option<MutexGuard<'_, T>> {
    loop {
        match mutex.try_lock() {
            Ok(guard) => return Some(guard),
            Err(TryLockError::Poisoned(poison)) => return Some(poison.into_inner()),
            Err(TryLockError::WouldBlock) => {
                if Instant::now() >= deadline {
                    return None;
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

/// Waits for the child to exit until `deadline`, then kills and reaps it.
pub(crate) fn wait_or_kill(child: &mut Child, deadline: Instant) -> Shutdown {
    let pid = child.id();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(target: TRANSPORT_TARGET, pid, ?status, "emulator exited");
                return Shutdown::Exited(status);
            }
            Ok(None) if Instant::now() < deadline => thread::sleep(POLL_INTERVAL),
            Ok(None) => {
                warn!(
                    target: TRANSPORT_TARGET,
                    pid,
                    "emulator did not exit within the grace period, killing it"
                );
                kill(child);
                return Shutdown::Killed;
            }
            Err(error) => {
                warn!(
                    target: TRANSPORT_TARGET,
                    pid,
                    error = %error,
                    "failed to check emulator status, killing it"
                );
                kill(child);
                return Shutdown::Killed;
            }
        }
    }
}

fn kill(child: &mut Child) {
    if let Err(error) = child.kill() {
        debug!(target: TRANSPORT_TARGET, error = %error, "kill failed");
    }
    if let Err(error) = child.wait() {
        warn!(target: TRANSPORT_TARGET, error = %error, "failed to reap emulator");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::process::Command;

    use super::*;

    #[test]
    fn prompt_exit_is_reported_with_status() {
        let mut child = Command::new("true").spawn().expect("spawn true");
        let deadline = Instant::now() + Duration::from_secs(5);

        let outcome = wait_or_kill(&mut child, deadline);

        assert!(matches!(outcome, Shutdown::Exited(status) if status.success()));
    }

    #[test]
    fn lingering_child_is_killed_at_deadline() {
        let mut child = Command::new("sleep").arg("30").spawn().expect("spawn sleep");
        let started = Instant::now();

        let outcome = wait_or_kill(&mut child, started + Duration::from_millis(200));

        assert_eq!(outcome, Shutdown::Killed);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(child.try_wait().expect("status").is_some());
    }

    #[test]
    fn lock_until_gives_up_on_a_held_lock() {
        let mutex = Mutex::new(());
        let _held = mutex.lock().expect("lock");

        let acquired = lock_until(&mutex, Instant::now() + Duration::from_millis(60));

        assert!(acquired.is_none());
    }

    #[test]
    fn lock_until_returns_free_lock_immediately() {
        let mutex = Mutex::new(7);
        let guard = lock_until(&mutex, Instant::now()).expect("free lock");
        assert_eq!(*guard, 7);
    }
}
