//! Source files under review.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::error::{Result, ReviewError};
use crate::domain::identity::ContentId;

/// Closed set of language tags used to pick reviewer prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Cpp,
    Python,
    Javascript,
    Java,
    Generic,
}

impl Language {
    /// Detect the language from a file extension (with or without the dot).
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" | "h" => Language::Cpp,
            "py" => Language::Python,
            "js" | "ts" | "jsx" | "tsx" => Language::Javascript,
            "java" => Language::Java,
            _ => Language::Generic,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Generic)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Cpp => "cpp",
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Java => "java",
            Language::Generic => "generic",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file read once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path as given to the pipeline (used for reading).
    pub path: PathBuf,
    /// Path relative to the review root (used for naming and prompts).
    pub relative_path: String,
    pub text: String,
    pub language: Language,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, relative_path: &str, text: String) -> Self {
        let path = path.into();
        let language = Language::from_path(&path);
        Self {
            path,
            relative_path: relative_path.to_string(),
            text,
            language,
        }
    }

    /// Read `path` from disk; `root` determines the relative path.
    pub fn read(path: &Path, root: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ReviewError::io(path, e))?;
        let relative = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        Ok(Self::new(path, &relative, text))
    }

    /// Content-derived identifier over (relative path, text).
    pub fn content_id(&self) -> ContentId {
        ContentId::compute(&[self.relative_path.as_str(), self.text.as_str()])
    }
}
