//! Candidate file discovery.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Recursively collect files under `root` whose extension is in
/// `extensions` (lower-case, with leading dot). Hidden directories and
/// anything under `exclude` are skipped. Output is sorted.
pub fn discover_files(root: &Path, extensions: &[String], exclude: Option<&Path>) -> Result<Vec<PathBuf>> {
    let exclude = exclude.and_then(|p| p.canonicalize().ok());
    let mut found = Vec::new();
    walk(root, extensions, exclude.as_deref(), &mut found)?;
    found.sort();
    Ok(found)
}

fn walk(dir: &Path, extensions: &[String], exclude: Option<&Path>, found: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).with_context(|| format!("read directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .with_context(|| format!("stat {}", path.display()))?;

        if file_type.is_dir() {
            if is_hidden(&path) || is_excluded(&path, exclude) {
                continue;
            }
            walk(&path, extensions, exclude, found)?;
        } else if file_type.is_file() && matches_extension(&path, extensions) {
            found.push(path);
        }
    }
    Ok(())
}

fn matches_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .is_some_and(|ext| extensions.iter().any(|allowed| *allowed == ext))
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

fn is_excluded(path: &Path, exclude: Option<&Path>) -> bool {
    match (exclude, path.canonicalize()) {
        (Some(exclude), Ok(path)) => path == exclude,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x\n").unwrap();
    }

    fn exts() -> Vec<String> {
        vec![".cpp".to_string(), ".h".to_string()]
    }

    #[test]
    fn test_discovers_matching_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "src/b.cpp");
        touch(dir.path(), "src/a.CPP");
        touch(dir.path(), "include/x.h");
        touch(dir.path(), "README.md");

        let found = discover_files(dir.path(), &exts(), None).unwrap();
        let relative: Vec<String> = found
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(relative, vec!["include/x.h", "src/a.CPP", "src/b.cpp"]);
    }

    #[test]
    fn test_skips_hidden_and_excluded_directories() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), ".git/objects/a.cpp");
        touch(dir.path(), "review_results/old.cpp");
        touch(dir.path(), "main.cpp");

        let excluded = dir.path().join("review_results");
        let found = discover_files(dir.path(), &exts(), Some(&excluded)).unwrap();
        assert_eq!(found, vec![dir.path().join("main.cpp")]);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_files(&dir.path().join("nope"), &exts(), None).is_err());
    }
}
