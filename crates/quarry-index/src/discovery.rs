//! Workspace file discovery with include globs and exclude patterns.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::Result;

/// Include/exclude rules applied to workspace-relative paths.
///
/// A path is kept when it matches at least one include glob and no exclude
/// pattern. Exclude patterns match as plain substrings of the relative path,
/// or as globs when they contain glob metacharacters.
///
/// Discovery additionally honours hidden-file and ignore-file rules
/// (`.gitignore`, `.ignore`, git excludes) unless
/// [`with_ignore_files(false)`](Self::with_ignore_files) turns that off.
#[derive(Debug, Clone)]
pub struct PathFilter {
    include: GlobSet,
    exclude_globs: GlobSet,
    exclude_substrings: Vec<String>,
    ignore_files: bool,
}

impl PathFilter {
    /// # Errors
    ///
    /// Returns `IndexError::Pattern` if any glob fails to compile.
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let mut includes = GlobSetBuilder::new();
        for pattern in include {
            includes.add(Glob::new(pattern)?);
        }

        let mut exclude_globs = GlobSetBuilder::new();
        let mut exclude_substrings = Vec::new();
        for pattern in exclude {
            if pattern.contains(['*', '?', '[', '{']) {
                exclude_globs.add(Glob::new(pattern)?);
            } else {
                exclude_substrings.push(pattern.clone());
            }
        }

        Ok(Self {
            include: includes.build()?,
            exclude_globs: exclude_globs.build()?,
            exclude_substrings,
            ignore_files: true,
        })
    }

    /// Whether discovery skips hidden and ignore-file-listed paths.
    #[must_use]
    pub fn with_ignore_files(mut self, enabled: bool) -> Self {
        self.ignore_files = enabled;
        self
    }

    #[must_use]
    pub fn ignore_files(&self) -> bool {
        self.ignore_files
    }

    #[must_use]
    pub fn is_excluded(&self, relative: &str) -> bool {
        self.exclude_substrings
            .iter()
            .any(|s| relative.contains(s.as_str()))
            || self.exclude_globs.is_match(relative)
    }

    #[must_use]
    pub fn matches(&self, relative: &str) -> bool {
        self.include.is_match(relative) && !self.is_excluded(relative)
    }
}

/// Workspace-relative path with `/` separators on every platform.
#[must_use]
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Walk `root` and return matching files as sorted relative paths.
///
/// Besides the include/exclude rules, hidden paths and paths listed in
/// ignore files are skipped while [`PathFilter::ignore_files`] is on.
/// `max_files` caps the result after sorting so the cap is deterministic.
#[must_use]
pub fn discover_files(root: &Path, filter: &PathFilter, max_files: Option<usize>) -> Vec<String> {
    let mut files: Vec<String> = ignore::WalkBuilder::new(root)
        .standard_filters(filter.ignore_files())
        .build()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                tracing::warn!("skipping unreadable entry: {err}");
                None
            }
        })
        .filter(|e| e.file_type().is_some_and(|ft| ft.is_file()))
        .map(|e| relative_path(root, e.path()))
        .filter(|rel| filter.matches(rel))
        .collect();

    files.sort();
    if let Some(max) = max_files {
        files.truncate(max);
    }
    files
}

/// Absolute path of a workspace-relative path.
#[must_use]
pub fn absolute_path(root: &Path, relative: &str) -> PathBuf {
    relative.split('/').fold(root.to_path_buf(), |p, c| p.join(c))
}
