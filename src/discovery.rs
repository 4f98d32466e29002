//! Schema file discovery
//!
//! A file set is a base directory plus include/exclude glob patterns,
//! resolved by walking the directory. Results are sorted so runs are
//! reproducible.

use std::path::{Path, PathBuf};

use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GateError, Result};
use crate::schema::SchemaFile;

/// Default include pattern when a file set names none
pub const DEFAULT_INCLUDE: &str = "**/*.avsc";

/// Directory plus glob rules selecting schema files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSet {
    /// Base directory to search
    pub directory: PathBuf,

    /// Glob patterns relative to `directory` (default `**/*.avsc`)
    #[serde(default)]
    pub includes: Vec<String>,

    /// Glob patterns removed from the matches
    #[serde(default)]
    pub excludes: Vec<String>,
}

impl FileSet {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            includes: Vec::new(),
            excludes: Vec::new(),
        }
    }

    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.includes.push(pattern.into());
        self
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.excludes.push(pattern.into());
        self
    }

    /// List the files this set selects, sorted by path
    pub fn resolve(&self) -> Result<Vec<SchemaFile>> {
        if !self.directory.is_dir() {
            return Err(self.error("directory does not exist"));
        }

        let mut overrides = OverrideBuilder::new(&self.directory);
        if self.includes.is_empty() {
            overrides
                .add(DEFAULT_INCLUDE)
                .map_err(|e| self.error(e.to_string()))?;
        }
        for pattern in &self.includes {
            overrides.add(pattern).map_err(|e| self.error(e.to_string()))?;
        }
        for pattern in &self.excludes {
            overrides
                .add(&format!("!{pattern}"))
                .map_err(|e| self.error(e.to_string()))?;
        }
        let overrides = overrides.build().map_err(|e| self.error(e.to_string()))?;

        let walker = WalkBuilder::new(&self.directory)
            .standard_filters(false)
            .overrides(overrides)
            .sort_by_file_path(|a, b| a.cmp(b))
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| self.error(e.to_string()))?;
            if entry.file_type().is_some_and(|t| t.is_file()) {
                files.push(SchemaFile::new(entry.into_path()));
            }
        }

        debug!(
            "File set {} matched {} file(s)",
            self.directory.display(),
            files.len()
        );
        Ok(files)
    }

    fn error(&self, message: impl Into<String>) -> GateError {
        GateError::Discovery {
            directory: self.directory.clone(),
            message: message.into(),
        }
    }
}

/// Resolve several file sets, concatenated in declaration order
pub fn discover(file_sets: &[FileSet]) -> Result<Vec<SchemaFile>> {
    let mut files = Vec::new();
    for file_set in file_sets {
        files.extend(file_set.resolve()?);
    }
    Ok(files)
}

/// Resolve relative import paths against a base directory
pub fn resolve_imports(base: &Path, imports: &[PathBuf]) -> Vec<PathBuf> {
    imports
        .iter()
        .map(|import| {
            if import.is_absolute() {
                import.clone()
            } else {
                base.join(import)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "{}").unwrap();
    }

    #[test]
    fn test_default_include_finds_avsc_recursively() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "b/Foo.avsc");
        touch(dir.path(), "a/Bar.avsc");
        touch(dir.path(), "README.md");

        let files = FileSet::new(dir.path()).resolve().unwrap();
        let names: Vec<_> = files.iter().map(|f| f.display_name()).collect();
        assert_eq!(names, vec!["Bar.avsc", "Foo.avsc"]);
    }

    #[test]
    fn test_excludes_remove_matches() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "events/Foo.avsc");
        touch(dir.path(), "events/legacy/Old.avsc");

        let files = FileSet::new(dir.path())
            .include("events/**/*.avsc")
            .exclude("**/legacy/**")
            .resolve()
            .unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].display_name(), "Foo.avsc");
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let err = FileSet::new(dir.path().join("nope")).resolve().unwrap_err();
        assert!(matches!(err, GateError::Discovery { .. }));
    }

    #[test]
    fn test_discover_concatenates_sets() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        touch(first.path(), "A.avsc");
        touch(second.path(), "B.avsc");

        let files = discover(&[FileSet::new(first.path()), FileSet::new(second.path())]).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.display_name()).collect();
        assert_eq!(names, vec!["A.avsc", "B.avsc"]);
    }

    #[test]
    fn test_resolve_imports_keeps_absolute_paths() {
        let dir = tempdir().unwrap();
        let absolute = dir.path().join("Money.avsc");
        let resolved = resolve_imports(
            Path::new("config"),
            &[PathBuf::from("common/Shared.avsc"), absolute.clone()],
        );
        assert_eq!(
            resolved,
            vec![Path::new("config").join("common/Shared.avsc"), absolute]
        );
    }
}
