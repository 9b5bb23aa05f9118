//! Admission pattern matching.
//!
//! Include/exclude globs are compiled once per invocation into a
//! [`PatternSet`]. Matching happens against the path relative to the
//! workspace root; exclusion always wins.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::settings::ConfigError;

/// Compiled include/exclude admission sets.
#[derive(Debug)]
pub struct PatternSet {
    include: GlobSet,
    exclude: GlobSet,
    include_count: usize,
    exclude_count: usize,
}

impl PatternSet {
    pub fn compile(include: &[String], exclude: &[String]) -> Result<Self, ConfigError> {
        Ok(Self {
            include: build_set(include)?,
            exclude: build_set(exclude)?,
            include_count: include.len(),
            exclude_count: exclude.len(),
        })
    }

    /// True when the file should enter the pipeline. A path must match an
    /// include pattern (an empty include list admits everything) and must
    /// not match any exclude pattern.
    pub fn admits(&self, path: &Path, root: &Path) -> bool {
        let relative = path.strip_prefix(root).unwrap_or(path);

        if self.exclude.is_match(relative) || self.exclude.is_match(path) {
            return false;
        }
        if self.include_count == 0 {
            return true;
        }
        self.include.is_match(relative) || self.include.is_match(path)
    }

    pub fn include_count(&self) -> usize {
        self.include_count
    }

    pub fn exclude_count(&self) -> usize {
        self.exclude_count
    }
}

fn build_set(patterns: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| ConfigError::Pattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| ConfigError::Pattern {
        pattern: patterns.join(", "),
        reason: e.to_string(),
    })
}
