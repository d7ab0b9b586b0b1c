//! Graceful termination of the supervised child.

use std::io;
use tokio::process::Child;

/// Ask the child to exit.
///
/// Sends SIGTERM on Unix. Other platforms have no graceful equivalent, so
/// the child is killed outright. A child that has already been reaped is
/// left alone.
#[cfg(unix)]
pub fn terminate(child: &mut Child) -> io::Result<()> {
    let Some(pid) = child.id() else {
        return Ok(());
    };

    let res = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if res == 0 {
        Ok(())
    } else {
        let err = io::Error::last_os_error();
        // ESRCH: exited between the id() check and the signal
        if err.raw_os_error() == Some(libc::ESRCH) {
            Ok(())
        } else {
            Err(err)
        }
    }
}

#[cfg(not(unix))]
pub fn terminate(child: &mut Child) -> io::Result<()> {
    child.start_kill()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::Stdio;
    use tokio::process::Command;

    #[tokio::test]
    async fn test_terminate_sends_sigterm() {
        let mut child = Command::new("sleep")
            .arg("30")
            .stdout(Stdio::null())
            .spawn()
            .unwrap();

        terminate(&mut child).unwrap();
        let status = child.wait().await.unwrap();

        assert_eq!(status.signal(), Some(libc::SIGTERM));
        assert_eq!(status.code(), None);
    }

    #[tokio::test]
    async fn test_terminate_after_exit_is_noop() {
        let mut child = Command::new("true").spawn().unwrap();
        child.wait().await.unwrap();

        assert!(terminate(&mut child).is_ok());
    }
}
