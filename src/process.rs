//! Synchronous execution of one toolchain command line.
//!
//! A worker owns exactly one of these blocking calls at a time; that is the
//! whole job of a worker thread.

use std::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Success,
    Interrupted,
    Failure,
}

/// Captured result of one external process.
pub struct CommandOutput {
    pub termination: Termination,
    /// Interleaved stdout and stderr.
    pub output: Vec<u8>,
}

/// Runs a command line through the shell and waits for it to exit.
/// Returns Err only when the process could not be spawned at all; a failing
/// command is a normal `CommandOutput`.
pub fn run_command(cmdline: &str) -> anyhow::Result<CommandOutput> {
    let out = shell_command(cmdline).output()?;

    let mut output = Vec::new();
    output.extend_from_slice(&out.stdout);
    output.extend_from_slice(&out.stderr);

    let termination = if out.status.success() {
        Termination::Success
    } else {
        categorize_failure(&out.status, &mut output)
    };

    Ok(CommandOutput {
        termination,
        output,
    })
}

#[cfg(unix)]
fn shell_command(cmdline: &str) -> Command {
    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c").arg(cmdline);
    cmd
}

#[cfg(windows)]
fn shell_command(cmdline: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/c").arg(cmdline);
    cmd
}

#[cfg(unix)]
fn categorize_failure(status: &std::process::ExitStatus, output: &mut Vec<u8>) -> Termination {
    use std::io::Write;
    use std::os::unix::process::ExitStatusExt;
    match status.signal() {
        Some(libc::SIGINT) => {
            let _ = write!(output, "interrupted");
            Termination::Interrupted
        }
        Some(sig) => {
            let _ = write!(output, "signal {}", sig);
            Termination::Failure
        }
        None => Termination::Failure,
    }
}

#[cfg(windows)]
fn categorize_failure(_status: &std::process::ExitStatus, _output: &mut Vec<u8>) -> Termination {
    Termination::Failure
}
