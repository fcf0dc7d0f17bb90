//! Output directory and environment checks run before a session starts.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use tracing::{debug, info};

use crate::io::config::WeaverConfig;

const MAX_EXECUTABLE_LEN: usize = 500;
const WRITE_PROBE_NAME: &str = ".weaver_write_probe";

static SHELL_META_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[&|;`$()<>\r\n]").expect("valid shell metacharacter regex"));

/// Reject executable names that could smuggle shell syntax into a launch.
///
/// The shell fallback hands the executable to `sh -c` / `cmd /C`, so this
/// check is what keeps that path safe.
pub fn validate_executable(executable: &str) -> Result<()> {
    if executable.trim().is_empty() {
        return Err(anyhow!("editor executable must not be empty"));
    }
    if executable.len() > MAX_EXECUTABLE_LEN {
        return Err(anyhow!(
            "editor executable is {} bytes, limit is {MAX_EXECUTABLE_LEN}",
            executable.len()
        ));
    }
    if let Some(m) = SHELL_META_RE.find(executable) {
        return Err(anyhow!(
            "editor executable contains shell metacharacter {:?}",
            m.as_str()
        ));
    }
    Ok(())
}

/// Create the output directory if needed and prove it is writable.
pub fn ensure_output_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create output dir {}", dir.display()))?;
    let probe = dir.join(WRITE_PROBE_NAME);
    fs::write(&probe, b"probe")
        .with_context(|| format!("no write permission in {}", dir.display()))?;
    fs::remove_file(&probe).with_context(|| format!("remove {}", probe.display()))?;
    debug!(dir = %dir.display(), "output dir writable");
    Ok(())
}

/// Names of existing artifacts in `dir` with the given extension.
///
/// Used to seed the identifier registry so a new session never reuses a
/// name left on disk. A missing directory yields no names.
pub fn existing_artifact_names(dir: &Path, extension: &str) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let suffix = format!(".{extension}");
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        if let Some(name) = entry.file_name().to_str()
            && name.ends_with(&suffix)
        {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Everything `weaver check` verifies; also run before every session.
pub fn check_environment(cfg: &WeaverConfig) -> Result<()> {
    cfg.validate().context("invalid configuration")?;
    validate_executable(&cfg.editor.executable)?;
    ensure_output_dir(&cfg.output_dir)?;
    if let Some(path) = &cfg.catalog_path
        && !path.is_file()
    {
        return Err(anyhow!("catalog file {} not found", path.display()));
    }
    info!(
        executable = %cfg.editor.executable,
        output_dir = %cfg.output_dir.display(),
        "environment check passed"
    );
    Ok(())
}
