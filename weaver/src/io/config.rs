//! Session configuration stored as TOML (default `weaver.toml`).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::content::TRUNCATION_MARKER;
use crate::core::identifier::{DEFAULT_SAFE_CHARS, IdentifierPolicy};

/// Upper bound on a single session.
pub const MAX_DURATION_SECS: u64 = 24 * 60 * 60;
/// Shortest session `--hours` is clamped to.
pub const MIN_REQUESTED_HOURS: f64 = 0.1;

/// Weaver configuration (TOML).
///
/// Missing fields fall back to defaults, so a partial file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WeaverConfig {
    /// Total wall-clock budget for the session.
    pub duration_secs: u64,

    /// Pause after a successful iteration.
    pub loop_interval_ms: u64,

    /// Pause after a failed iteration.
    pub retry_delay_ms: u64,

    /// Abort once this many iterations fail back to back.
    pub max_consecutive_failures: u32,

    /// Ceiling on a rendered artifact body, in bytes.
    pub max_body_bytes: usize,

    /// Where artifacts are written.
    pub output_dir: PathBuf,

    /// Optional TOML catalog replacing the built-in topics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<PathBuf>,

    pub identifiers: IdentifierConfig,

    pub editor: EditorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IdentifierConfig {
    pub extension: String,
    pub max_filename_len: usize,
    pub max_path_len: usize,
    pub max_base_len: usize,
    pub safe_chars: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EditorConfig {
    /// Editor command-line launcher (e.g. `code`).
    pub executable: String,
    /// Arguments used to bring up an editor window at startup.
    pub launch_args: Vec<String>,
    /// Arguments placed before the artifact path when opening it.
    pub open_args: Vec<String>,
    pub launch_timeout_ms: u64,
    pub open_timeout_ms: u64,
    /// Wait after each editor action before checking its effect.
    pub settle_delay_ms: u64,
    pub open_in_editor: bool,
}

impl Default for WeaverConfig {
    fn default() -> Self {
        Self {
            duration_secs: 60 * 60,
            loop_interval_ms: 8_000,
            retry_delay_ms: 5_000,
            max_consecutive_failures: 5,
            max_body_bytes: 10_000,
            output_dir: PathBuf::from("generated_files"),
            catalog_path: None,
            identifiers: IdentifierConfig::default(),
            editor: EditorConfig::default(),
        }
    }
}

impl Default for IdentifierConfig {
    fn default() -> Self {
        Self {
            extension: "py".to_string(),
            max_filename_len: 100,
            max_path_len: 260,
            max_base_len: 50,
            safe_chars: DEFAULT_SAFE_CHARS.to_string(),
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            executable: "code".to_string(),
            launch_args: vec!["--new-window".to_string()],
            open_args: vec!["--reuse-window".to_string()],
            launch_timeout_ms: 4_000,
            open_timeout_ms: 1_500,
            settle_delay_ms: 1_000,
            open_in_editor: true,
        }
    }
}

impl WeaverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.duration_secs > MAX_DURATION_SECS {
            return Err(anyhow!(
                "duration_secs must be <= {MAX_DURATION_SECS} (got {})",
                self.duration_secs
            ));
        }
        if self.max_consecutive_failures == 0 {
            return Err(anyhow!("max_consecutive_failures must be > 0"));
        }
        if self.max_body_bytes <= TRUNCATION_MARKER.len() {
            return Err(anyhow!(
                "max_body_bytes must be > {} (room for the truncation marker)",
                TRUNCATION_MARKER.len()
            ));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(anyhow!("output_dir must not be empty"));
        }
        self.identifiers.validate()?;
        self.editor.validate()?;
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn loop_interval(&self) -> Duration {
        Duration::from_millis(self.loop_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Set the duration from a user-facing hour count, clamped to safe limits.
    pub fn set_requested_hours(&mut self, hours: f64) {
        let max_hours = MAX_DURATION_SECS as f64 / 3600.0;
        let hours = if hours.is_nan() {
            MIN_REQUESTED_HOURS
        } else {
            hours.clamp(MIN_REQUESTED_HOURS, max_hours)
        };
        self.duration_secs = (hours * 3600.0).round() as u64;
    }
}

impl IdentifierConfig {
    fn validate(&self) -> Result<()> {
        if self.extension.is_empty()
            || !self
                .extension
                .chars()
                .all(|c| c.is_ascii_alphanumeric())
        {
            return Err(anyhow!(
                "identifiers.extension must be non-empty and alphanumeric (got '{}')",
                self.extension
            ));
        }
        if self.max_filename_len == 0 || self.max_path_len == 0 || self.max_base_len == 0 {
            return Err(anyhow!("identifier length limits must be > 0"));
        }
        if self.safe_chars.is_empty() {
            return Err(anyhow!("identifiers.safe_chars must not be empty"));
        }
        if self.safe_chars.contains(['/', '\\']) {
            return Err(anyhow!("identifiers.safe_chars must not contain path separators"));
        }
        Ok(())
    }

    pub fn policy(&self) -> IdentifierPolicy {
        IdentifierPolicy {
            extension: self.extension.clone(),
            max_filename_len: self.max_filename_len,
            max_path_len: self.max_path_len,
            max_base_len: self.max_base_len,
            safe_chars: self.safe_chars.clone(),
        }
    }
}

impl EditorConfig {
    fn validate(&self) -> Result<()> {
        if self.executable.trim().is_empty() {
            return Err(anyhow!("editor.executable must not be empty"));
        }
        if self.launch_timeout_ms == 0 {
            return Err(anyhow!("editor.launch_timeout_ms must be > 0"));
        }
        if self.open_timeout_ms == 0 {
            return Err(anyhow!("editor.open_timeout_ms must be > 0"));
        }
        Ok(())
    }

    pub fn launch_timeout(&self) -> Duration {
        Duration::from_millis(self.launch_timeout_ms)
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `WeaverConfig::default()`.
pub fn load_config(path: &Path) -> Result<WeaverConfig> {
    if !path.exists() {
        let cfg = WeaverConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: WeaverConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &WeaverConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, WeaverConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("weaver.toml");
        let cfg = WeaverConfig {
            catalog_path: Some(PathBuf::from("topics.toml")),
            ..WeaverConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("weaver.toml");
        fs::write(
            &path,
            "duration_secs = 0\n\n[editor]\nexecutable = \"codium\"\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.duration_secs, 0);
        assert_eq!(cfg.editor.executable, "codium");
        assert_eq!(cfg.editor.launch_args, vec!["--new-window".to_string()]);
        assert_eq!(cfg.max_consecutive_failures, 5);
    }

    #[test]
    fn rejects_invalid_limits() {
        let cases = [
            WeaverConfig {
                max_consecutive_failures: 0,
                ..WeaverConfig::default()
            },
            WeaverConfig {
                duration_secs: MAX_DURATION_SECS + 1,
                ..WeaverConfig::default()
            },
            WeaverConfig {
                max_body_bytes: 4,
                ..WeaverConfig::default()
            },
            WeaverConfig {
                identifiers: IdentifierConfig {
                    extension: ".py".to_string(),
                    ..IdentifierConfig::default()
                },
                ..WeaverConfig::default()
            },
            WeaverConfig {
                identifiers: IdentifierConfig {
                    safe_chars: "abc/".to_string(),
                    ..IdentifierConfig::default()
                },
                ..WeaverConfig::default()
            },
        ];
        for cfg in cases {
            assert!(cfg.validate().is_err(), "{cfg:?}");
        }
    }

    #[test]
    fn requested_hours_are_clamped() {
        let mut cfg = WeaverConfig::default();
        cfg.set_requested_hours(100.0);
        assert_eq!(cfg.duration_secs, MAX_DURATION_SECS);
        cfg.set_requested_hours(0.0);
        assert_eq!(cfg.duration_secs, 360);
        cfg.set_requested_hours(1.5);
        assert_eq!(cfg.duration_secs, 5400);
    }
}
