use std::io;

use tokio::process::Child;

/// Signals the supervisor delivers to simulation processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Graceful termination request (`SIGTERM`).
    Terminate,
    /// Forceful kill (`SIGKILL`).
    Kill,
}

impl Signal {
    pub fn name(self) -> &'static str {
        match self {
            Signal::Terminate => "SIGTERM",
            Signal::Kill => "SIGKILL",
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        /// Deliver `signal` to the process `pid`.
        pub fn send_signal(pid: u32, signal: Signal) -> io::Result<()> {
            let raw_pid = libc::pid_t::try_from(pid)
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
            let raw_signal = match signal {
                Signal::Terminate => libc::SIGTERM,
                Signal::Kill => libc::SIGKILL,
            };
            let rc = unsafe { libc::kill(raw_pid, raw_signal) };
            if rc != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }
    } else {
        pub fn send_signal(_pid: u32, signal: Signal) -> io::Result<()> {
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("{} is not supported on this platform", signal.name()),
            ))
        }
    }
}

/// Ask the child to stop, then kill and reap it.
pub async fn kill_graceful(child: &mut Child) -> io::Result<()> {
    if let Some(pid) = child.id() {
        let _ = send_signal(pid, Signal::Terminate);
    }
    child.kill().await
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn kill_graceful_reaps_child() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .unwrap();
        kill_graceful(&mut child).await.unwrap();
        let status = child.wait().await.unwrap();
        assert!(!status.success());
    }

    #[test]
    fn signal_to_missing_process_fails() {
        // pid_max on Linux is at most 2^22.
        let err = send_signal(4_194_304 + 1, Signal::Terminate).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ESRCH));
    }
}
