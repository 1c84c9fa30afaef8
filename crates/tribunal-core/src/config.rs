//! Review configuration.
//!
//! A [`ReviewConfig`] is built once at startup (defaults, then an optional
//! TOML file, then CLI overrides) and passed by value into the pipeline.
//! Nothing below this layer reads the environment.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::chunking::ChunkPlanner;
use crate::domain::error::{Result, ReviewError};
use crate::invoker::RetryPolicy;

/// One agent: a model at a fixed sampling temperature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub model: String,
    pub temperature: f32,
}

impl AgentConfig {
    pub fn new(id: &str, model: &str, temperature: f32) -> Self {
        Self {
            id: id.to_string(),
            model: model.to_string(),
            temperature,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Files with at most this many lines are reviewed as one chunk.
    pub threshold_lines: usize,
    /// Window size for files above the threshold.
    pub chunk_lines: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            threshold_lines: 500,
            chunk_lines: 400,
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub chunking: ChunkingConfig,
    /// Reviewer agents, in the order reviews are labelled for arbitration.
    pub workers: Vec<AgentConfig>,
    pub supervisor: AgentConfig,
    /// When set, an agent writes the executive summary of each report.
    pub synthesizer: Option<AgentConfig>,
    pub retry: RetryPolicy,
    /// Cap on outstanding agent attempts across the whole run.
    pub max_concurrent_invocations: usize,
    /// Re-run arbitration once when a verdict fails validation.
    pub rerun_on_invalid_verdict: bool,
    pub results_dir: PathBuf,
    pub extensions: Vec<String>,
    /// Skip files whose artifacts already exist and recorded no failures.
    pub reuse_existing: bool,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            workers: vec![
                AgentConfig::new("worker1", "gpt-3.5-turbo", 0.7),
                AgentConfig::new("worker2", "gpt-4o", 0.2),
            ],
            supervisor: AgentConfig::new("supervisor", "gpt-4o", 0.1),
            synthesizer: None,
            retry: RetryPolicy::default(),
            max_concurrent_invocations: 8,
            rerun_on_invalid_verdict: false,
            results_dir: PathBuf::from("review_results"),
            extensions: vec![".cpp".to_string(), ".hpp".to_string(), ".h".to_string()],
            reuse_existing: true,
        }
    }
}

impl ReviewConfig {
    /// Parse a TOML document; omitted keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| ReviewError::InvalidConfig(e.to_string()))
    }

    /// Load and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| ReviewError::io(path, e))?;
        Self::from_toml_str(&raw)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.workers.is_empty() {
            return Err(invalid("at least one worker agent is required"));
        }

        let mut ids = HashSet::new();
        for worker in &self.workers {
            if worker.id.trim().is_empty() {
                return Err(invalid("worker ids must not be empty"));
            }
            if !ids.insert(worker.id.as_str()) {
                return Err(invalid(&format!("duplicate worker id '{}'", worker.id)));
            }
        }

        for (i, a) in self.workers.iter().enumerate() {
            for b in &self.workers[i + 1..] {
                if a.model == b.model && a.temperature == b.temperature {
                    return Err(invalid(&format!(
                        "workers '{}' and '{}' share model '{}' at temperature {}",
                        a.id, b.id, a.model, a.temperature
                    )));
                }
            }
        }

        if self.chunking.chunk_lines == 0 {
            return Err(invalid("chunking.chunk_lines must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts must be at least 1"));
        }
        if self.max_concurrent_invocations == 0 {
            return Err(invalid("max_concurrent_invocations must be at least 1"));
        }
        Ok(())
    }

    pub fn planner(&self) -> Result<ChunkPlanner> {
        ChunkPlanner::new(self.chunking.threshold_lines, self.chunking.chunk_lines)
    }

    /// Extensions lower-cased with a leading dot (`"CPP"` becomes `".cpp"`).
    pub fn normalized_extensions(&self) -> Vec<String> {
        self.extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .map(|e| format!(".{e}"))
            .collect()
    }
}

fn invalid(message: &str) -> ReviewError {
    ReviewError::InvalidConfig(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ReviewConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunking.threshold_lines, 500);
        assert_eq!(config.chunking.chunk_lines, 400);
        assert_eq!(config.workers.len(), 2);
        assert_eq!(config.supervisor.model, "gpt-4o");
        assert_eq!(config.retry.max_attempts, 4);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ReviewConfig::from_toml_str(
            r#"
            results_dir = "out"

            [chunking]
            threshold_lines = 200

            [retry]
            max_attempts = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.results_dir, PathBuf::from("out"));
        assert_eq!(config.chunking.threshold_lines, 200);
        assert_eq!(config.chunking.chunk_lines, 400);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.max_delay_ms, 20_000);
        assert_eq!(config.workers.len(), 2);
    }

    #[test]
    fn test_toml_worker_list_replaces_default() {
        let config = ReviewConfig::from_toml_str(
            r#"
            [[workers]]
            id = "fast"
            model = "gpt-4o-mini"
            temperature = 0.5

            [synthesizer]
            id = "writer"
            model = "gpt-4o"
            temperature = 0.3
            "#,
        )
        .unwrap();
        assert_eq!(config.workers, vec![AgentConfig::new("fast", "gpt-4o-mini", 0.5)]);
        assert_eq!(config.synthesizer.unwrap().id, "writer");
    }

    #[test]
    fn test_malformed_toml_is_invalid_config() {
        let err = ReviewConfig::from_toml_str("chunking = 3").unwrap_err();
        assert!(matches!(err, ReviewError::InvalidConfig(_)));
    }

    #[test]
    fn test_validate_rejects_empty_worker_pool() {
        let config = ReviewConfig {
            workers: vec![],
            ..ReviewConfig::default()
        };
        assert!(matches!(config.validate(), Err(ReviewError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_ids_and_identical_agents() {
        let duplicate_ids = ReviewConfig {
            workers: vec![
                AgentConfig::new("w", "a", 0.1),
                AgentConfig::new("w", "b", 0.1),
            ],
            ..ReviewConfig::default()
        };
        assert!(duplicate_ids.validate().is_err());

        let identical = ReviewConfig {
            workers: vec![
                AgentConfig::new("w1", "gpt-4o", 0.2),
                AgentConfig::new("w2", "gpt-4o", 0.2),
            ],
            ..ReviewConfig::default()
        };
        let err = identical.validate().unwrap_err();
        assert!(err.to_string().contains("share model"));
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = ReviewConfig::default();
        config.chunking.chunk_lines = 0;
        assert!(config.validate().is_err());

        let mut config = ReviewConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let config = ReviewConfig {
            max_concurrent_invocations: 0,
            ..ReviewConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_normalized_extensions() {
        let config = ReviewConfig {
            extensions: vec!["CPP".to_string(), ".h".to_string(), " ".to_string()],
            ..ReviewConfig::default()
        };
        assert_eq!(config.normalized_extensions(), vec![".cpp", ".h"]);
    }
}
