//! Test-only drivers and fixtures.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;

use crate::core::error::DriveFailure;
use crate::core::types::Identifier;
use crate::io::config::{WeaverConfig, write_config};
use crate::io::driver::DriveAdapter;
use crate::session::SessionConfig;

/// Drive adapter that replays scripted outcomes instead of touching an editor.
///
/// Once the script runs out, `fallback` decides every further outcome.
pub struct ScriptedDriver {
    reachable: bool,
    script: RefCell<VecDeque<bool>>,
    fallback: bool,
    calls: Cell<u32>,
    names: RefCell<Vec<String>>,
}

impl ScriptedDriver {
    pub fn new(reachable: bool, script: Vec<bool>, fallback: bool) -> Self {
        Self {
            reachable,
            script: RefCell::new(script.into()),
            fallback,
            calls: Cell::new(0),
            names: RefCell::new(Vec::new()),
        }
    }

    pub fn always_ok() -> Self {
        Self::new(true, Vec::new(), true)
    }

    pub fn always_failing() -> Self {
        Self::new(true, Vec::new(), false)
    }

    pub fn unreachable() -> Self {
        Self::new(false, Vec::new(), true)
    }

    /// Replay `results` in order, then keep failing.
    pub fn from_results(results: Vec<bool>) -> Self {
        Self::new(true, results, false)
    }

    pub fn materialize_calls(&self) -> u32 {
        self.calls.get()
    }

    /// Names passed to `materialize`, in call order.
    pub fn materialized_names(&self) -> Vec<String> {
        self.names.borrow().clone()
    }
}

impl DriveAdapter for ScriptedDriver {
    fn confirm_reachable(&self) -> bool {
        self.reachable
    }

    fn materialize(&self, identifier: &Identifier, _body: &str) -> Result<(), DriveFailure> {
        self.calls.set(self.calls.get() + 1);
        self.names.borrow_mut().push(identifier.name.clone());
        let ok = self
            .script
            .borrow_mut()
            .pop_front()
            .unwrap_or(self.fallback);
        if ok {
            Ok(())
        } else {
            Err(DriveFailure::UnexpectedState("scripted failure".to_string()))
        }
    }
}

/// Session bounds with no pauses and a generous deadline.
pub fn quick_config(max_consecutive_failures: u32) -> SessionConfig {
    SessionConfig {
        duration: Duration::from_secs(60),
        loop_interval: Duration::ZERO,
        retry_delay: Duration::ZERO,
        max_consecutive_failures,
    }
}

/// Temporary working directory with a weaver config that never sleeps.
pub struct TestWorkspace {
    temp: tempfile::TempDir,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn output_dir(&self) -> PathBuf {
        self.path().join("generated_files")
    }

    /// Config pointing at this workspace, using `executable` as the editor.
    pub fn config(&self, executable: &str) -> WeaverConfig {
        let mut cfg = WeaverConfig {
            duration_secs: 0,
            loop_interval_ms: 0,
            retry_delay_ms: 0,
            output_dir: self.output_dir(),
            ..WeaverConfig::default()
        };
        cfg.editor.executable = executable.to_string();
        cfg.editor.settle_delay_ms = 0;
        cfg.editor.launch_timeout_ms = 2_000;
        cfg
    }

    /// Write `cfg` to `weaver.toml` in the workspace and return its path.
    pub fn write_config(&self, cfg: &WeaverConfig) -> Result<PathBuf> {
        let path = self.path().join("weaver.toml");
        write_config(&path, cfg)?;
        Ok(path)
    }
}
