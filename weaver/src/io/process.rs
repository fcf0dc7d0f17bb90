//! Child process helpers for talking to the editor launcher.
//!
//! Two shapes are needed: a bounded call that must finish (opening a file),
//! and a launch that may legitimately keep running (bringing up a window).

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Captured output of a bounded child process.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: Option<ExitStatus>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.is_some_and(|s| s.success())
    }

    /// First line of stderr, for log messages.
    pub fn stderr_summary(&self) -> String {
        String::from_utf8_lossy(&self.stderr)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}

/// What happened to a launched child within the launch window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// The launcher finished on its own.
    Exited(ExitStatus),
    /// Still running when the window closed; left running.
    StillRunning,
}

/// Run a command to completion, killing it if `timeout` elapses.
///
/// stdout/stderr are drained on reader threads so a chatty child cannot block
/// on a full pipe; at most `output_limit_bytes` of each are kept.
#[instrument(skip_all, fields(timeout_ms = timeout.as_millis() as u64))]
pub fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(program = ?cmd.get_program(), "spawning child process");
    let mut child = cmd.spawn().context("spawn command")?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let (status, timed_out) = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => (Some(status), false),
        None => {
            warn!(timeout_ms = timeout.as_millis() as u64, "command timed out, killing");
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?;
            (None, true)
        }
    };

    let stdout = join_output(stdout_handle).context("join stdout")?;
    let stderr = join_output(stderr_handle).context("join stderr")?;

    debug!(exit_code = ?status.and_then(|s| s.code()), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

/// Spawn a command and give it `window` to either exit or settle.
///
/// Output is discarded. A child still running after `window` is not killed.
#[instrument(skip_all, fields(window_ms = window.as_millis() as u64))]
pub fn launch(mut cmd: Command, window: Duration) -> Result<LaunchOutcome> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    debug!(program = ?cmd.get_program(), "launching child process");
    let mut child = cmd.spawn().context("spawn launcher")?;
    match child.wait_timeout(window).context("wait for launcher")? {
        Some(status) => {
            debug!(exit_code = ?status.code(), "launcher exited");
            Ok(LaunchOutcome::Exited(status))
        }
        None => {
            debug!(pid = child.id(), "launcher still running, detaching");
            reap_in_background(child);
            Ok(LaunchOutcome::StillRunning)
        }
    }
}

/// Wait for a detached child on its own thread so it never lingers as a zombie.
fn reap_in_background(mut child: Child) -> thread::JoinHandle<Option<ExitStatus>> {
    thread::spawn(move || match child.wait() {
        Ok(status) => {
            debug!(exit_code = ?status.code(), "detached launcher exited");
            Some(status)
        }
        Err(err) => {
            warn!(err = %err, "wait for detached launcher");
            None
        }
    })
}

fn join_output(handle: thread::JoinHandle<Result<Vec<u8>>>) -> Result<Vec<u8>> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..n.min(remaining)]);
    }

    Ok(buf)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_bounded_output() {
        let out = run_with_timeout(
            sh("printf 'hello world'; printf 'oops\\nmore' >&2"),
            Duration::from_secs(5),
            5,
        )
        .expect("run");
        assert!(out.success());
        assert_eq!(out.stdout, b"hello");
        assert_eq!(out.stderr_summary(), "oops");
    }

    #[test]
    fn kills_on_timeout() {
        let out =
            run_with_timeout(sh("exec sleep 5"), Duration::from_millis(100), 100).expect("run");
        assert!(out.timed_out);
        assert!(!out.success());
    }

    #[test]
    fn launch_reports_exit_status() {
        let outcome = launch(sh("exit 3"), Duration::from_secs(5)).expect("launch");
        match outcome {
            LaunchOutcome::Exited(status) => assert_eq!(status.code(), Some(3)),
            LaunchOutcome::StillRunning => panic!("expected exit"),
        }
    }

    #[test]
    fn launch_leaves_long_runner_alone() {
        let outcome = launch(sh("sleep 1"), Duration::from_millis(50)).expect("launch");
        assert_eq!(outcome, LaunchOutcome::StillRunning);
    }

    #[test]
    fn detached_child_is_reaped() {
        let child = sh("sleep 0.1; exit 4").spawn().expect("spawn");
        let status = reap_in_background(child).join().expect("join");
        assert_eq!(status.and_then(|s| s.code()), Some(4));
    }

    #[test]
    fn missing_program_is_an_error() {
        let err = launch(
            Command::new("weaver-definitely-not-installed"),
            Duration::from_millis(50),
        )
        .unwrap_err();
        assert!(err.to_string().contains("spawn launcher"));
    }
}
