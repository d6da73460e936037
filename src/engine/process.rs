// ABOUTME: Child process construction and process-group signalling
// ABOUTME: Runs rendered commands in their own group so cancellation reaches every descendant

use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::template::RenderedCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillSignal {
    /// SIGTERM, lets the command clean up
    Term,
    /// SIGKILL
    Kill,
}

#[cfg(unix)]
impl KillSignal {
    fn as_libc_signal(self) -> libc::c_int {
        match self {
            KillSignal::Term => libc::SIGTERM,
            KillSignal::Kill => libc::SIGKILL,
        }
    }
}

/// Build the shell invocation for `rendered`.
///
/// stdin is closed, stdout and stderr are piped, and on Unix the child
/// leads a new process group whose id equals its pid.
pub fn build_command(shell: &str, rendered: &RenderedCommand, working_dir: Option<&Path>) -> Command {
    let argv = rendered.shell_argv(shell);
    let mut command = Command::new(&argv[0]);
    command
        .args(&argv[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = working_dir {
        command.current_dir(dir);
    }

    #[cfg(unix)]
    command.process_group(0);

    command
}

/// Signal every process in the group led by `pgid`. A group that no
/// longer exists is not an error.
#[cfg(unix)]
pub fn signal_process_group(pgid: u32, signal: KillSignal) -> io::Result<()> {
    let result = unsafe { libc::killpg(pgid as libc::pid_t, signal.as_libc_signal()) };
    if result == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(err);
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn signal_process_group(_pgid: u32, _signal: KillSignal) -> io::Result<()> {
    Ok(())
}

/// SIGTERM the group, wait up to `grace`, then SIGKILL and reap.
pub async fn terminate(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    let Some(pgid) = child.id() else {
        // Already reaped
        return child.wait().await;
    };

    signal_process_group(pgid, KillSignal::Term)?;
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => {
            // Descendants may outlive the group leader
            signal_process_group(pgid, KillSignal::Kill)?;
            status
        }
        Err(_) => {
            debug!("Process group {} ignored SIGTERM, sending SIGKILL", pgid);
            signal_process_group(pgid, KillSignal::Kill)?;
            #[cfg(not(unix))]
            child.start_kill()?;
            child.wait().await
        }
    }
}

/// POSIX shells exit 126 when the program is not executable and 127 when
/// it is not found.
pub fn is_start_failure(status: &ExitStatus) -> bool {
    matches!(status.code(), Some(126) | Some(127))
}

/// Human readable description of how a process ended
pub fn describe_exit(status: &ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exited with code {}", code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("terminated by signal {}", signal);
        }
    }
    "terminated abnormally".to_string()
}
