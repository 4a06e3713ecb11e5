// src/recipe/kitchen/runner.rs

//! Execution of individual build commands
//!
//! The [`CommandRunner`] trait is the seam between the kitchen and the
//! processes it starts, so the phase logic can be exercised without a
//! compiler toolchain.

use crate::error::{Error, Result};
use crate::recipe::BuildPhase;
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::fs::{self, File};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// How long to wait for a killed process group to disappear
const GROUP_EXIT_GRACE: Duration = Duration::from_secs(2);

/// One command to run on behalf of a build phase
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec<'a> {
    pub phase: BuildPhase,
    /// Shell snippet with placeholders already substituted
    pub command: &'a str,
    pub workdir: &'a Path,
    pub env: &'a [(String, String)],
    /// File that receives the combined stdout and stderr
    pub log_path: &'a Path,
}

/// What a finished (or killed) command left behind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; None if the process was killed or timed out
    pub exit_status: Option<i32>,
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_status == Some(0)
    }
}

/// Runs build commands
pub trait CommandRunner: Send + Sync {
    /// Run `spec` to completion
    ///
    /// A non-zero exit is reported through [`CommandOutput::exit_status`];
    /// `Err` means the command could not be started at all.
    fn run(&self, spec: &CommandSpec<'_>) -> Result<CommandOutput>;
}

/// Runs commands with `/bin/sh -c`, killing them after a timeout
///
/// Each command gets its own process group. Whatever the shell started is
/// killed with it, so nothing a command spawned outlives the command.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    timeout: Duration,
}

impl ShellRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, spec: &CommandSpec<'_>) -> Result<CommandOutput> {
        debug!("[{}] {}", spec.phase, spec.command);

        let log = File::create(spec.log_path).map_err(|e| {
            Error::IoError(format!(
                "Failed to create log file {}: {}",
                spec.log_path.display(),
                e
            ))
        })?;
        let log_err = log.try_clone()?;

        // Output goes to a file rather than a pipe so a chatty build cannot
        // block on a full pipe while we wait on it
        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg(spec.command)
            .current_dir(spec.workdir)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .process_group(0)
            .spawn()
            .map_err(|e| {
                Error::IoError(format!("Failed to run {} command: {}", spec.phase, e))
            })?;

        let group = Pid::from_raw(child.id() as i32);
        let exit_status = match child.wait_timeout(self.timeout)? {
            Some(status) => {
                // Background jobs left behind by the shell
                kill_group(group);
                status.code()
            }
            None => {
                warn!(
                    "{} command timed out after {} seconds, killing it",
                    spec.phase,
                    self.timeout.as_secs()
                );
                // The shell must be reaped before the group can empty
                let _ = killpg(group, Signal::SIGKILL);
                let _ = child.wait();
                kill_group(group);
                None
            }
        };

        let output = String::from_utf8_lossy(&fs::read(spec.log_path)?).into_owned();
        Ok(CommandOutput {
            exit_status,
            output,
        })
    }
}

/// SIGKILL every process in `group` and wait until none is left
fn kill_group(group: Pid) {
    if killpg(group, Signal::SIGKILL) == Err(Errno::ESRCH) {
        return;
    }
    let deadline = Instant::now() + GROUP_EXIT_GRACE;
    while killpg(group, None) != Err(Errno::ESRCH) {
        if Instant::now() >= deadline {
            warn!("Processes of group {} are still exiting", group);
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}
