use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// A discovered document file.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Path relative to the directory that was walked (just the file name
    /// when a single file was given).
    pub relative_path: PathBuf,
    /// Fully resolved absolute path.
    pub absolute_path: PathBuf,
}

impl DiscoveredFile {
    /// Document name: the relative path without extension, `/`-separated.
    pub fn document_name(&self) -> String {
        let stem = self.relative_path.with_extension("");
        stem.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Markdown files get heading extraction.
    pub fn is_markdown(&self) -> bool {
        self.relative_path
            .extension()
            .is_some_and(|ext| ext == "md")
    }
}

/// Supported file extensions for document discovery.
const SUPPORTED_EXTENSIONS: &[&str] = &["md", "txt"];

/// Discover the documents at `path`.
///
/// A supported file yields itself. A directory is walked recursively,
/// skipping hidden files/directories (names starting with `.`) and files
/// without a supported extension (.md, .txt).
pub fn discover(path: &Path) -> Result<Vec<DiscoveredFile>> {
    let canonical = path.canonicalize()?;

    if canonical.is_file() {
        if !is_supported(&canonical) {
            return Err(Error::Config(format!(
                "unsupported file type: {} (expected .md or .txt)",
                path.display()
            )));
        }
        let relative_path = canonical
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| canonical.clone());
        return Ok(vec![DiscoveredFile {
            relative_path,
            absolute_path: canonical,
        }]);
    }

    let mut results = Vec::new();
    walk_dir(&canonical, &canonical, &mut results)?;
    results.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(results)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    results: &mut Vec<DiscoveredFile>,
) -> Result<()> {
    for entry in std::fs::read_dir(current)? {
        let entry = entry?;
        let file_name = entry.file_name();
        if file_name.to_string_lossy().starts_with('.') {
            continue;
        }

        let file_type = entry.file_type()?;
        let path = entry.path();

        if file_type.is_dir() {
            walk_dir(root, &path, results)?;
        } else if file_type.is_symlink() {
            let Ok(resolved) = path.canonicalize() else {
                continue;
            };
            // Linked directories are not followed.
            if resolved.is_file() && is_supported(&resolved) {
                results.push(discovered(root, &path, resolved));
            }
        } else if file_type.is_file() && is_supported(&path) {
            let absolute = path.canonicalize()?;
            results.push(discovered(root, &path, absolute));
        }
    }

    Ok(())
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext))
}

fn discovered(
    root: &Path,
    original_path: &Path,
    absolute_path: PathBuf,
) -> DiscoveredFile {
    DiscoveredFile {
        relative_path: original_path
            .strip_prefix(root)
            .unwrap_or(original_path)
            .to_path_buf(),
        absolute_path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(files: &[DiscoveredFile]) -> Vec<String> {
        files.iter().map(DiscoveredFile::document_name).collect()
    }

    #[test]
    fn discovers_md_and_txt() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("lease.md"), "# Lease").unwrap();
        std::fs::write(tmp.path().join("terms.txt"), "Terms").unwrap();
        std::fs::write(tmp.path().join("scan.png"), "binary").unwrap();

        let files = discover(tmp.path()).unwrap();
        assert_eq!(names(&files), vec!["lease", "terms"]);
        assert!(files[0].is_markdown());
        assert!(!files[1].is_markdown());
    }

    #[test]
    fn skips_hidden_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let hidden = tmp.path().join(".git");
        std::fs::create_dir(&hidden).unwrap();
        std::fs::write(hidden.join("config.md"), "git config").unwrap();
        std::fs::write(tmp.path().join(".draft.md"), "secret").unwrap();
        std::fs::write(tmp.path().join("visible.md"), "hello").unwrap();

        let files = discover(tmp.path()).unwrap();
        assert_eq!(names(&files), vec!["visible"]);
    }

    #[test]
    fn nested_files_are_named_by_relative_path() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("contracts");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("nda.txt"), "deep").unwrap();
        std::fs::write(tmp.path().join("top.md"), "top").unwrap();

        let files = discover(tmp.path()).unwrap();
        assert_eq!(names(&files), vec!["contracts/nda", "top"]);
    }

    #[test]
    fn single_file_is_named_by_stem() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("lease.txt");
        std::fs::write(&file, "text").unwrap();

        let files = discover(&file).unwrap();
        assert_eq!(names(&files), vec!["lease"]);
    }

    #[test]
    fn unsupported_single_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("lease.docx");
        std::fs::write(&file, "binary").unwrap();

        assert!(matches!(discover(&file), Err(Error::Config(_))));
    }

    #[test]
    fn missing_path_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(discover(&tmp.path().join("nope")).is_err());
    }

    #[test]
    fn empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(discover(tmp.path()).unwrap().is_empty());
    }
}
