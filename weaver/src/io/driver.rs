//! Drive adapter abstraction and the editor-backed implementation.
//!
//! The [`DriveAdapter`] trait decouples the session controller from whatever
//! actually makes artifacts appear in the editor. Tests use scripted drivers
//! that return predetermined outcomes without touching a real editor.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;
use std::thread;

use tracing::{debug, info, instrument, warn};

use crate::core::error::DriveFailure;
use crate::core::types::Identifier;
use crate::io::config::EditorConfig;
use crate::io::process::run_with_timeout;
use crate::io::reachability::{DirectLaunch, ReachabilityStrategy, ShellLaunch, confirm_with};

const OPEN_OUTPUT_LIMIT_BYTES: usize = 16 * 1024;

/// Actions against the target application.
pub trait DriveAdapter {
    /// Best-effort check that the application responds, trying fallbacks internally.
    fn confirm_reachable(&self) -> bool;

    /// Make the named artifact with `body` exist in the application.
    fn materialize(&self, identifier: &Identifier, body: &str) -> Result<(), DriveFailure>;
}

/// Drives an editor through its command-line launcher.
///
/// Artifacts are written to disk and then opened in the running editor
/// window, so the editor always shows what was produced.
pub struct EditorDriver {
    editor: EditorConfig,
    strategies: Vec<Box<dyn ReachabilityStrategy>>,
}

impl EditorDriver {
    /// Driver with the default strategy order: direct launch, then shell.
    pub fn new(editor: &EditorConfig) -> Self {
        let strategies: Vec<Box<dyn ReachabilityStrategy>> = vec![
            Box::new(DirectLaunch {
                executable: editor.executable.clone(),
                args: editor.launch_args.clone(),
                window: editor.launch_timeout(),
            }),
            Box::new(ShellLaunch {
                executable: editor.executable.clone(),
                args: editor.launch_args.clone(),
                window: editor.launch_timeout(),
            }),
        ];
        Self::with_strategies(editor, strategies)
    }

    pub fn with_strategies(
        editor: &EditorConfig,
        strategies: Vec<Box<dyn ReachabilityStrategy>>,
    ) -> Self {
        Self {
            editor: editor.clone(),
            strategies,
        }
    }

    fn open_in_editor(&self, path: &Path) -> Result<(), DriveFailure> {
        let mut cmd = Command::new(&self.editor.executable);
        cmd.args(&self.editor.open_args).arg(path);
        let timeout = self.editor.open_timeout();
        let output = run_with_timeout(cmd, timeout, OPEN_OUTPUT_LIMIT_BYTES).map_err(|err| {
            let action = format!("open {}", path.display());
            match err.downcast::<std::io::Error>() {
                Ok(source) => DriveFailure::io(action, source),
                Err(err) => DriveFailure::UnexpectedState(format!("{action}: {err:#}")),
            }
        })?;
        if output.timed_out {
            return Err(DriveFailure::Timeout {
                action: format!("open {}", path.display()),
                timeout,
            });
        }
        if !output.success() {
            return Err(DriveFailure::UnexpectedState(format!(
                "editor exited with status {:?}: {}",
                output.status.and_then(|s| s.code()),
                output.stderr_summary()
            )));
        }
        Ok(())
    }

    fn open_and_verify(&self, path: &Path, expected_len: usize) -> Result<(), DriveFailure> {
        if self.editor.open_in_editor {
            self.open_in_editor(path)?;
        }
        thread::sleep(self.editor.settle_delay());
        verify_artifact(path, expected_len)
    }
}

impl DriveAdapter for EditorDriver {
    fn confirm_reachable(&self) -> bool {
        info!(executable = %self.editor.executable, "confirming editor is reachable");
        confirm_with(&self.strategies)
    }

    #[instrument(skip_all, fields(name = %identifier.name))]
    fn materialize(&self, identifier: &Identifier, body: &str) -> Result<(), DriveFailure> {
        write_artifact(&identifier.path, body)?;

        if let Err(err) = self.open_and_verify(&identifier.path, body.len()) {
            discard_artifact(&identifier.path);
            return Err(err);
        }
        debug!(bytes = body.len(), "artifact materialized");
        Ok(())
    }
}

/// Remove an artifact whose materialization failed, so only counted
/// successes stay on disk.
fn discard_artifact(path: &Path) {
    if let Err(err) = fs::remove_file(path)
        && err.kind() != ErrorKind::NotFound
    {
        warn!(path = %path.display(), err = %err, "could not remove failed artifact");
    }
}

/// Write `body` to `path` via a temp file and rename; refuses to overwrite.
pub fn write_artifact(path: &Path, body: &str) -> Result<(), DriveFailure> {
    if path.exists() {
        return Err(DriveFailure::UnexpectedState(format!(
            "{} already exists",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|err| DriveFailure::io(format!("create {}", parent.display()), err))?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);
    fs::write(tmp_path, body)
        .map_err(|err| DriveFailure::io(format!("write {}", tmp_path.display()), err))?;
    fs::rename(tmp_path, path).map_err(|err| {
        warn!(path = %path.display(), "rename failed, removing temp file");
        let _ = fs::remove_file(tmp_path);
        DriveFailure::io(format!("rename into {}", path.display()), err)
    })
}

fn verify_artifact(path: &Path, expected_len: usize) -> Result<(), DriveFailure> {
    let meta = fs::metadata(path).map_err(|err| {
        DriveFailure::io(format!("verify {}", path.display()), err)
    })?;
    if meta.len() != expected_len as u64 {
        return Err(DriveFailure::UnexpectedState(format!(
            "{} is {} bytes, expected {expected_len}",
            path.display(),
            meta.len()
        )));
    }
    Ok(())
}
