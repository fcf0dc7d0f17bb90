//! Ordered strategies for bringing the editor up at session start.
//!
//! The first strategy launches the editor directly; the fallback goes through
//! the platform shell, which resolves launchers that are shell shims or
//! aliases on `PATH`. Strategies are tried in order until one succeeds.

use std::process::Command;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{info, warn};

use crate::io::process::{LaunchOutcome, launch};
use crate::io::workspace::validate_executable;

pub trait ReachabilityStrategy {
    fn name(&self) -> &'static str;
    fn attempt(&self) -> Result<()>;
}

/// Try each strategy in order; true as soon as one succeeds.
pub fn confirm_with(strategies: &[Box<dyn ReachabilityStrategy>]) -> bool {
    for strategy in strategies {
        match strategy.attempt() {
            Ok(()) => {
                info!(strategy = strategy.name(), "editor reachable");
                return true;
            }
            Err(err) => {
                warn!(
                    strategy = strategy.name(),
                    err = %format!("{err:#}"),
                    "reachability strategy failed"
                );
            }
        }
    }
    false
}

fn check_launch(outcome: LaunchOutcome) -> Result<()> {
    match outcome {
        LaunchOutcome::StillRunning => Ok(()),
        LaunchOutcome::Exited(status) if status.success() => Ok(()),
        LaunchOutcome::Exited(status) => {
            Err(anyhow!("launcher exited with status {:?}", status.code()))
        }
    }
}

/// Spawn the editor executable with its launch arguments.
pub struct DirectLaunch {
    pub executable: String,
    pub args: Vec<String>,
    pub window: Duration,
}

impl ReachabilityStrategy for DirectLaunch {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn attempt(&self) -> Result<()> {
        let mut cmd = Command::new(&self.executable);
        cmd.args(&self.args);
        check_launch(launch(cmd, self.window)?)
    }
}

/// Launch the editor through `sh -c` (or `cmd /C start` on Windows).
pub struct ShellLaunch {
    pub executable: String,
    pub args: Vec<String>,
    pub window: Duration,
}

impl ShellLaunch {
    fn command_line(&self) -> Result<String> {
        let mut line = self.executable.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        validate_executable(&line)?;
        Ok(line)
    }
}

impl ReachabilityStrategy for ShellLaunch {
    fn name(&self) -> &'static str {
        "shell"
    }

    fn attempt(&self) -> Result<()> {
        let line = self.command_line()?;
        let cmd = if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(format!("start \"\" {line}"));
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(line);
            cmd
        };
        check_launch(launch(cmd, self.window)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Fixed {
        ok: bool,
        calls: Rc<Cell<u32>>,
    }

    impl ReachabilityStrategy for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn attempt(&self) -> Result<()> {
            self.calls.set(self.calls.get() + 1);
            if self.ok {
                Ok(())
            } else {
                Err(anyhow!("unreachable"))
            }
        }
    }

    fn fixed(ok: bool) -> (Box<dyn ReachabilityStrategy>, Rc<Cell<u32>>) {
        let calls = Rc::new(Cell::new(0));
        let strategy = Fixed {
            ok,
            calls: Rc::clone(&calls),
        };
        (Box::new(strategy), calls)
    }

    #[test]
    fn fallback_runs_only_when_primary_fails() {
        let (primary, primary_calls) = fixed(true);
        let (fallback, fallback_calls) = fixed(true);
        assert!(confirm_with(&[primary, fallback]));
        assert_eq!(primary_calls.get(), 1);
        assert_eq!(fallback_calls.get(), 0);

        let (primary, primary_calls) = fixed(false);
        let (fallback, fallback_calls) = fixed(true);
        assert!(confirm_with(&[primary, fallback]));
        assert_eq!(primary_calls.get(), 1);
        assert_eq!(fallback_calls.get(), 1);
    }

    #[test]
    fn all_failing_is_unreachable() {
        let (primary, _) = fixed(false);
        let (fallback, fallback_calls) = fixed(false);
        assert!(!confirm_with(&[primary, fallback]));
        assert_eq!(fallback_calls.get(), 1);
        assert!(!confirm_with(&[]));
    }

    #[test]
    fn shell_launch_refuses_metacharacters() {
        let shell = ShellLaunch {
            executable: "code".to_string(),
            args: vec!["--new-window;reboot".to_string()],
            window: Duration::from_millis(10),
        };
        let err = shell.attempt().unwrap_err();
        assert!(err.to_string().contains("metacharacter"));
    }

    #[cfg(unix)]
    #[test]
    fn direct_launch_checks_exit_status() {
        let ok = DirectLaunch {
            executable: "true".to_string(),
            args: vec!["--new-window".to_string()],
            window: Duration::from_secs(5),
        };
        ok.attempt().expect("true launches");

        let failing = DirectLaunch {
            executable: "false".to_string(),
            args: Vec::new(),
            window: Duration::from_secs(5),
        };
        assert!(failing.attempt().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn shell_launch_runs_through_sh() {
        let shell = ShellLaunch {
            executable: "true".to_string(),
            args: vec!["--new-window".to_string()],
            window: Duration::from_secs(5),
        };
        shell.attempt().expect("sh launches");
    }
}
