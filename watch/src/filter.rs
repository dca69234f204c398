//! Include/exclude glob matching and the file-size gate (§4.1).

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};

/// Minimum file size accepted for indexing: 1 KiB.
pub const MIN_SIZE: u64 = 1024;
/// Maximum file size accepted for indexing: 500 MiB.
pub const MAX_SIZE: u64 = 500 * 1024 * 1024;

fn default_excludes() -> Vec<&'static str> {
    vec![
        "**/.*/**",
        "**/.*",
        "**/node_modules/**",
        "**/.git/**",
        "**/venv/**",
        "**/.venv/**",
        "**/__pycache__/**",
        "**/target/**",
        "**/dist/**",
        "**/build/**",
    ]
}

/// Decides whether a path and size should be watched at all.
#[derive(Debug, Clone)]
pub struct PathFilter {
    include: Option<GlobSet>,
    exclude: GlobSet,
}

impl PathFilter {
    /// Builds a filter from explicit include globs (empty means "match
    /// everything not excluded") plus the default exclude set, extended
    /// with any caller-supplied exclude globs.
    ///
    /// # Panics
    /// Panics if a supplied glob pattern is malformed.
    #[must_use]
    pub fn new(include: &[String], extra_exclude: &[String]) -> Self {
        let include = if include.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            for pattern in include {
                builder.add(Glob::new(pattern).expect("valid include glob"));
            }
            Some(builder.build().expect("include globset compiles"))
        };

        let mut builder = GlobSetBuilder::new();
        for pattern in default_excludes() {
            builder.add(Glob::new(pattern).expect("valid default exclude glob"));
        }
        for pattern in extra_exclude {
            builder.add(Glob::new(pattern).expect("valid exclude glob"));
        }
        let exclude = builder.build().expect("exclude globset compiles");

        Self { include, exclude }
    }

    /// Whether `path` should be watched, independent of its size.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        if self.exclude.is_match(path) {
            return false;
        }
        match &self.include {
            None => true,
            Some(set) => set.is_match(path),
        }
    }

    /// Whether `size` falls within the ingestible range `[1 KiB, 500 MiB]`.
    #[must_use]
    pub const fn size_gate(size: u64) -> bool {
        size >= MIN_SIZE && size <= MAX_SIZE
    }
}

impl Default for PathFilter {
    fn default() -> Self {
        Self::new(&[], &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn excludes_hidden_and_vendor_directories() {
        let filter = PathFilter::default();
        assert!(!filter.matches(&PathBuf::from("/repo/.git/HEAD")));
        assert!(!filter.matches(&PathBuf::from("/repo/node_modules/pkg/index.js")));
        assert!(!filter.matches(&PathBuf::from("/repo/.hidden/file.txt")));
        assert!(filter.matches(&PathBuf::from("/repo/src/main.rs")));
    }

    #[test]
    fn include_globs_narrow_the_match_set() {
        let filter = PathFilter::new(&["**/*.pdf".to_string()], &[]);
        assert!(filter.matches(&PathBuf::from("/docs/report.pdf")));
        assert!(!filter.matches(&PathBuf::from("/docs/report.txt")));
    }

    #[test]
    fn size_gate_rejects_outside_bounds() {
        assert!(!PathFilter::size_gate(1023));
        assert!(PathFilter::size_gate(1024));
        assert!(PathFilter::size_gate(MAX_SIZE));
        assert!(!PathFilter::size_gate(MAX_SIZE + 1));
    }
}
