//! Child processes owned by the trainer.
//!
//! A [`ManagedProcess`] is asked to stop politely first (`SIGTERM`), then killed once its grace
//! period is over. A process that was not cleaned up is terminated on drop.
//!
//! # Platform
//!
//! `SIGTERM` is delivered through the `kill` utility, so the polite step only exists on Unix.
//! Elsewhere the `kill` invocation fails, a debug event is logged, and the process is killed
//! outright once its grace period is over.

use std::ffi::OsStr;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{Result, TrainerError};

/// Grace period used when a process is dropped without being terminated.
const DROP_GRACE: Duration = Duration::from_millis(100);

fn create_process(
    command: &Path,
    args: &[String],
    env: &[(String, String)],
    allow_stderr: bool,
) -> std::io::Result<Child> {
    let mut cmd = Command::new(command);
    cmd.args(args)
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::null());
    if !allow_stderr {
        cmd.stderr(Stdio::null());
    }
    cmd.spawn()
}

/// A spawned OS process.
#[derive(Debug)]
pub struct ManagedProcess {
    name: String,
    child: Child,
    exit: Option<ExitStatus>,
    cleaned_up: bool,
}

impl ManagedProcess {
    /// Spawns `command` with `args` and extra environment variables.
    ///
    /// Stdin and stdout are discarded; stderr is inherited only when `allow_stderr` is set.
    ///
    /// # Errors
    /// [`TrainerError::Launch`] when the program cannot be started.
    pub fn launch(
        name: &str,
        command: impl AsRef<Path>,
        args: &[String],
        env: &[(String, String)],
        allow_stderr: bool,
    ) -> Result<ManagedProcess> {
        let command = command.as_ref();
        let child =
            create_process(command, args, env, allow_stderr).map_err(|source| TrainerError::Launch {
                name: name.to_string(),
                source,
            })?;
        info!(name, pid = child.id(), command = %command.display(), "process launched");
        debug!(name, ?args);
        Ok(ManagedProcess {
            name: name.to_string(),
            child,
            exit: None,
            cleaned_up: false,
        })
    }

    /// Name given at launch
    pub fn name(&self) -> &str {
        &self.name
    }

    /// OS process id
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Exit status if the process has exited, without blocking.
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        if self.exit.is_none() {
            self.exit = self.child.try_wait()?;
        }
        Ok(self.exit)
    }

    /// Exit status seen by the last poll
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit
    }

    /// True while the process runs
    pub fn is_alive(&mut self) -> bool {
        matches!(self.try_wait(), Ok(None))
    }

    fn wait_until(&mut self, deadline: Instant) -> Result<Option<ExitStatus>> {
        loop {
            if let Some(status) = self.try_wait()? {
                return Ok(Some(status));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    fn send_sigterm(&self) {
        let pid = self.child.id().to_string();
        let sent = Command::new("kill")
            .args([OsStr::new("-TERM"), OsStr::new(&pid)])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if !matches!(sent, Ok(status) if status.success()) {
            debug!(name = %self.name, "could not send SIGTERM");
        }
    }

    /// Stops the process: `SIGTERM`, wait up to `grace`, then kill.
    ///
    /// Terminating an exited process only reaps it. Safe to call several times.
    pub fn terminate(&mut self, grace: Duration) -> Result<ExitStatus> {
        if let Some(status) = self.try_wait()? {
            self.cleaned_up = true;
            return Ok(status);
        }
        self.send_sigterm();
        if let Some(status) = self.wait_until(Instant::now() + grace)? {
            info!(name = %self.name, %status, "process terminated");
            self.cleaned_up = true;
            return Ok(status);
        }
        warn!(name = %self.name, ?grace, "process ignored SIGTERM, killing it");
        self.child.kill()?;
        let status = self.child.wait()?;
        self.exit = Some(status);
        self.cleaned_up = true;
        Ok(status)
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        if !self.cleaned_up {
            if let Err(e) = self.terminate(DROP_GRACE) {
                warn!(name = %self.name, "could not terminate process on drop: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sleeper(secs: &str) -> ManagedProcess {
        ManagedProcess::launch("sleeper", "sleep", &[secs.to_string()], &[], false).unwrap()
    }

    #[test]
    fn terminate_stops_a_running_process() {
        let mut p = sleeper("30");
        assert!(p.is_alive());
        let start = Instant::now();
        let status = p.terminate(Duration::from_secs(2)).unwrap();
        assert!(!status.success());
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(!p.is_alive());
        // second call only reports the status
        assert_eq!(p.terminate(Duration::ZERO).unwrap(), status);
    }

    #[test]
    fn process_ignoring_sigterm_is_killed_after_grace() {
        let args = ["-c".to_string(), "trap '' TERM; exec sleep 30".to_string()];
        let mut p = ManagedProcess::launch("stubborn", "sh", &args, &[], false).unwrap();
        // let the shell install its trap
        std::thread::sleep(Duration::from_millis(200));
        let grace = Duration::from_millis(300);
        let start = Instant::now();
        let status = p.terminate(grace).unwrap();
        assert!(start.elapsed() >= grace);
        assert!(!status.success());
        assert!(!p.is_alive());
    }

    #[test]
    fn exited_process_is_reported() {
        let mut p = ManagedProcess::launch("true", "true", &[], &[], false).unwrap();
        let status = p.wait_until(Instant::now() + Duration::from_secs(5)).unwrap();
        assert!(status.is_some_and(|s| s.success()));
        assert!(!p.is_alive());
    }

    #[test]
    fn environment_is_passed() {
        let env = [("HFO_MARKER".to_string(), "7".to_string())];
        let args = ["-c".to_string(), "test \"$HFO_MARKER\" = 7".to_string()];
        let mut p = ManagedProcess::launch("env_check", "sh", &args, &env, false).unwrap();
        let status = p.wait_until(Instant::now() + Duration::from_secs(5)).unwrap();
        assert!(status.is_some_and(|s| s.success()));
    }

    #[test]
    fn missing_program_is_a_launch_error() {
        let err = ManagedProcess::launch("ghost", "/nonexistent/hfo_binary", &[], &[], false)
            .unwrap_err();
        assert!(matches!(err, TrainerError::Launch { ref name, .. } if name == "ghost"));
    }

    #[test]
    fn drop_terminates() {
        let p = sleeper("30");
        let pid = p.id();
        drop(p);
        let alive = Command::new("kill")
            .args(["-0", &pid.to_string()])
            .stderr(Stdio::null())
            .status()
            .unwrap();
        assert!(!alive.success());
    }
}
