//! Collision-free artifact naming.
//!
//! The allocator owns the session's registry of issued names and a monotonic
//! counter. Names look like `<base>_example_<NNN>.<ext>`; the numeric field is
//! zero-padded to three digits and widens past 999 instead of wrapping.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::error::AllocateError;
use crate::core::types::Identifier;

/// Safety grammar applied to every issued name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierPolicy {
    /// Extension without the leading dot.
    pub extension: String,
    pub max_filename_len: usize,
    pub max_path_len: usize,
    pub max_base_len: usize,
    pub safe_chars: String,
}

impl Default for IdentifierPolicy {
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

pub const DEFAULT_SAFE_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_-.";

impl IdentifierPolicy {
    fn is_safe(&self, c: char) -> bool {
        self.safe_chars.contains(c)
    }

    /// Reduce a free-form label to a base usable in a filename.
    ///
    /// May return an empty string; callers treat that as an invalid label.
    pub fn normalize(&self, label: &str) -> String {
        let cleaned = label.replace("()", "").replace(' ', "_").to_lowercase();
        let safe: String = cleaned.chars().filter(|c| self.is_safe(*c)).collect();
        safe.trim_start_matches('.')
            .chars()
            .take(self.max_base_len)
            .collect()
    }

    /// Check a complete filename against the grammar.
    pub fn check_filename(&self, name: &str) -> Result<(), String> {
        if name.len() > self.max_filename_len {
            return Err(format!(
                "filename is {} bytes, limit is {}",
                name.len(),
                self.max_filename_len
            ));
        }
        if name.contains("..") || name.contains('/') || name.contains('\\') {
            return Err("filename contains a path component".to_string());
        }
        if !name.ends_with(&format!(".{}", self.extension)) {
            return Err(format!("filename must end with .{}", self.extension));
        }
        if let Some(bad) = name.chars().find(|c| !self.is_safe(*c)) {
            return Err(format!("filename contains unsafe character {bad:?}"));
        }
        Ok(())
    }
}

/// Names already issued (or already on disk) in this session.
#[derive(Debug, Clone, Default)]
pub struct IdentifierRegistry {
    names: HashSet<String>,
}

impl IdentifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the registry with names that must never be handed out.
    pub fn with_existing<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Hands out unique identifiers under a fixed output directory.
#[derive(Debug, Clone)]
pub struct IdentifierAllocator {
    policy: IdentifierPolicy,
    output_dir: PathBuf,
    registry: IdentifierRegistry,
    counter: u32,
}

impl IdentifierAllocator {
    pub fn new(policy: IdentifierPolicy, output_dir: &Path, registry: IdentifierRegistry) -> Self {
        Self {
            policy,
            output_dir: output_dir.to_path_buf(),
            registry,
            counter: 1,
        }
    }

    pub fn registry(&self) -> &IdentifierRegistry {
        &self.registry
    }

    /// Allocate the next free name for `label`.
    ///
    /// On error neither the registry nor the counter moves.
    pub fn allocate(&mut self, label: &str) -> Result<Identifier, AllocateError> {
        let base = self.policy.normalize(label);
        if base.is_empty() {
            return Err(AllocateError::InvalidLabel {
                label: label.to_string(),
                reason: "no safe characters left after normalization".to_string(),
            });
        }

        let mut counter = self.counter;
        let name = loop {
            let candidate = format!("{base}_example_{counter:03}.{}", self.policy.extension);
            if !self.registry.contains(&candidate) {
                break candidate;
            }
            counter += 1;
        };

        self.policy
            .check_filename(&name)
            .map_err(|reason| AllocateError::InvalidLabel {
                label: label.to_string(),
                reason,
            })?;

        let path = self.output_dir.join(&name);
        let len = path.as_os_str().len();
        if len > self.policy.max_path_len {
            return Err(AllocateError::PathTooLong {
                path,
                len,
                max: self.policy.max_path_len,
            });
        }

        debug!(name = %name, counter, "identifier allocated");
        self.registry.names.insert(name.clone());
        self.counter = counter + 1;
        Ok(Identifier { name, path })
    }
}
