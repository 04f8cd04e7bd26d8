use std::io;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;

use tracing::{info, warn};
use triage_core::config::BootstrapConfig;
use triage_core::errors::BootstrapError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchedServer {
    pub pid: u32,
    pub program: PathBuf,
}

/// Starts the inference server. Must return without waiting for it to become ready.
pub trait ServerLauncher: Send + Sync {
    fn launch(&self) -> Result<LaunchedServer, BootstrapError>;
}

/// Spawns `executable args...` detached from the caller, with stdio discarded.
#[derive(Clone, Debug)]
pub struct ProcessLauncher {
    executable: String,
    args: Vec<String>,
}

impl ProcessLauncher {
    pub fn new<I, S>(executable: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { executable: executable.into(), args: args.into_iter().map(Into::into).collect() }
    }

    pub fn from_config(config: &BootstrapConfig) -> Self {
        Self::new(config.executable.clone(), config.args.clone())
    }

    fn not_found(&self) -> BootstrapError {
        BootstrapError::ExecutableNotFound { executable: self.executable.clone() }
    }
}

impl ServerLauncher for ProcessLauncher {
    fn launch(&self) -> Result<LaunchedServer, BootstrapError> {
        let program = which::which(&self.executable).map_err(|_| self.not_found())?;

        let mut command = Command::new(&program);
        command.args(&self.args).stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
        detach(&mut command);

        let child = command.spawn().map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => self.not_found(),
            _ => BootstrapError::Launch { executable: self.executable.clone(), source },
        })?;
        let pid = child.id();

        info!(
            event_name = "bootstrap.launch.spawned",
            program = %program.display(),
            pid,
            "spawned inference server"
        );
        reap_in_background(child);
        Ok(LaunchedServer { pid, program })
    }
}

/// Waits on the server from a detached thread so an early exit is collected instead of
/// lingering as a zombie. The thread does not keep the caller alive.
fn reap_in_background(mut child: Child) {
    let pid = child.id();
    let spawned = thread::Builder::new().name(format!("reap-{pid}")).spawn(move || {
        match child.wait() {
            Ok(status) => info!(
                event_name = "bootstrap.server.exited",
                pid,
                status = %status,
                "inference server process exited"
            ),
            Err(error) => warn!(
                event_name = "bootstrap.server.wait_failed",
                pid,
                error = %error,
                "could not wait on inference server process"
            ),
        }
    });

    if let Err(error) = spawned {
        warn!(
            event_name = "bootstrap.server.reaper_unavailable",
            pid,
            error = %error,
            "could not start reaper thread; the server will not be collected on exit"
        );
    }
}

#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;

    // New process group, so terminal signals aimed at the caller do not reach the server.
    command.process_group(0);
}

#[cfg(windows)]
fn detach(command: &mut Command) {
    use std::os::windows::process::CommandExt;

    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn detach(_command: &mut Command) {}

#[cfg(test)]
mod tests {
    use triage_core::errors::BootstrapError;

    use super::{ProcessLauncher, ServerLauncher};

    #[test]
    fn missing_executable_is_reported_without_spawning() {
        let launcher = ProcessLauncher::new("triage-definitely-not-installed-binary", ["serve"]);

        let error = launcher.launch().expect_err("executable is missing");

        assert!(matches!(
            error,
            BootstrapError::ExecutableNotFound { ref executable }
                if executable == "triage-definitely-not-installed-binary"
        ));
    }

    #[cfg(unix)]
    #[test]
    fn launch_returns_immediately_with_pid() {
        let launcher = ProcessLauncher::new("sh", ["-c", "exit 0"]);

        let launched = launcher.launch().expect("sh is on PATH");

        assert!(launched.pid > 0);
        assert!(launched.program.ends_with("sh"));
    }

    #[cfg(unix)]
    #[test]
    fn exited_server_is_collected() {
        use std::path::Path;
        use std::time::{Duration, Instant};

        if !Path::new("/proc/self").exists() {
            return;
        }
        let launcher = ProcessLauncher::new("sh", ["-c", "exit 0"]);

        let launched = launcher.launch().expect("sh is on PATH");

        // A zombie keeps its /proc entry until it is waited on.
        let proc_entry = format!("/proc/{}", launched.pid);
        let deadline = Instant::now() + Duration::from_secs(5);
        while Path::new(&proc_entry).exists() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(!Path::new(&proc_entry).exists(), "pid {} was never collected", launched.pid);
    }

    #[cfg(unix)]
    #[test]
    fn launch_does_not_wait_for_a_running_server() {
        use std::time::{Duration, Instant};

        let launcher = ProcessLauncher::new("sh", ["-c", "sleep 2"]);
        let started = Instant::now();

        launcher.launch().expect("sh is on PATH");

        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
