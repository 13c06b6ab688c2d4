use std::thread;
use std::time::{Duration, Instant};
use tracing::trace;

use crate::error::ReplacementError;

/// How often [`wait_for_exit`] re-checks the process
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Whether a process with this id currently exists.
///
/// Works for any process, not only children of the caller.
pub fn is_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    platform::is_alive(pid)
}

/// Block until `pid` is gone or `timeout` elapses
pub fn wait_for_exit(pid: u32, timeout: Duration) -> Result<(), ReplacementError> {
    let deadline = Instant::now() + timeout;

    loop {
        if !is_alive(pid) {
            return Ok(());
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(ReplacementError::ParentTimeout { pid, timeout });
        }
        trace!(pid, "Process still running");
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

#[cfg(unix)]
mod platform {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    pub fn is_alive(pid: u32) -> bool {
        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        // A null signal only checks that the target exists
        match kill(Pid::from_raw(raw), None) {
            Ok(()) => true,
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }
}

#[cfg(windows)]
mod platform {
    use std::process::{Command, Stdio};

    pub fn is_alive(pid: u32) -> bool {
        let output = Command::new("tasklist")
            .args(["/FI", &format!("PID eq {}", pid), "/FO", "CSV", "/NH"])
            .stderr(Stdio::null())
            .output();

        let Ok(output) = output else {
            return false;
        };
        if !output.status.success() {
            return false;
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout.contains(&format!(",\"{}\"", pid))
            && !stdout.to_ascii_lowercase().contains("no tasks are running")
    }
}

#[cfg(not(any(unix, windows)))]
mod platform {
    pub fn is_alive(_pid: u32) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_own_process_is_alive() {
        assert!(is_alive(std::process::id()));
    }

    #[test]
    fn test_pid_zero_is_not_alive() {
        assert!(!is_alive(0));
        assert!(wait_for_exit(0, Duration::from_millis(10)).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_out_of_range_pid_is_not_alive() {
        assert!(!is_alive(u32::MAX));
    }

    #[cfg(unix)]
    #[test]
    fn test_wait_returns_once_parent_exits() {
        use std::process::Command;

        let mut parent = Command::new("sleep").arg("0.3").spawn().unwrap();
        let pid = parent.id();
        // Reap in the background so the pid does not linger as a zombie
        let reaper = thread::spawn(move || parent.wait());

        let started = Instant::now();
        wait_for_exit(pid, Duration::from_secs(2)).unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!is_alive(pid));

        reaper.join().unwrap().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_wait_times_out_while_parent_lives() {
        use std::process::Command;

        let mut parent = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = parent.id();

        let started = Instant::now();
        let result = wait_for_exit(pid, Duration::from_secs(2));
        let waited = started.elapsed();

        parent.kill().unwrap();
        parent.wait().unwrap();

        match result {
            Err(ReplacementError::ParentTimeout { pid: p, timeout }) => {
                assert_eq!(p, pid);
                assert_eq!(timeout, Duration::from_secs(2));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(waited >= Duration::from_secs(2));
    }
}
