//! Engine configuration, persisted as TOML.
//!
//! Every field carries a serde default so a partial (or missing) file still
//! yields a usable configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading or saving the engine configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(conceptq::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}")]
    #[diagnostic(
        code(conceptq::config::parse),
        help("Check the TOML syntax in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(conceptq::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub dialog: DialogConfig,
    #[serde(default)]
    pub learning: LearningConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub tasks: TaskConfig,
}

/// Weights of the four similarity signals combined into a vote score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Monge-Elkan similarity of phrase and label.
    #[serde(default = "default_weight_main")]
    pub main: f64,
    /// Jaro-Winkler over Soundex codes.
    #[serde(default = "default_weight_phonetic")]
    pub phonetic: f64,
    /// Mean similarity of the label's synonyms to the phrase.
    #[serde(default = "default_weight_synonym")]
    pub label_synonyms: f64,
    /// Mean similarity of the phrase's synonyms to the label.
    #[serde(default = "default_weight_synonym")]
    pub text_synonyms: f64,
}

fn default_weight_main() -> f64 {
    0.45
}
fn default_weight_phonetic() -> f64 {
    0.15
}
fn default_weight_synonym() -> f64 {
    0.20
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            main: default_weight_main(),
            phonetic: default_weight_phonetic(),
            label_synonyms: default_weight_synonym(),
            text_synonyms: default_weight_synonym(),
        }
    }
}

/// Dialog generation and candidate ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogConfig {
    /// Synonyms considered per side of the score formula.
    #[serde(default = "default_max_synonyms")]
    pub max_synonyms: usize,
    /// Phonetic similarities at or below this value count as zero.
    #[serde(default = "default_phonetic_floor")]
    pub phonetic_floor: f64,
    /// Votes shown per dialog, including the "none" choice.
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
    /// Also walk superclasses of neighbor classes when collecting candidates.
    #[serde(default = "default_true")]
    pub force_parents: bool,
    /// Minimum similarity between a phrase and a task verbalization.
    #[serde(default = "default_similarity_floor")]
    pub task_similarity_floor: f64,
    /// Minimum similarity between a phrase and a displayed diagram text.
    #[serde(default = "default_similarity_floor")]
    pub literal_similarity_floor: f64,
    /// Offer dialogs for phrases that matched nothing in the knowledge base.
    #[serde(default = "default_true")]
    pub resolve_pocs: bool,
    #[serde(default)]
    pub weights: ScoreWeights,
}

fn default_max_synonyms() -> usize {
    3
}
fn default_phonetic_floor() -> f64 {
    0.5
}
fn default_max_suggestions() -> usize {
    10
}
fn default_similarity_floor() -> f64 {
    0.85
}
fn default_true() -> bool {
    true
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            max_synonyms: default_max_synonyms(),
            phonetic_floor: default_phonetic_floor(),
            max_suggestions: default_max_suggestions(),
            force_parents: true,
            task_similarity_floor: default_similarity_floor(),
            literal_similarity_floor: default_similarity_floor(),
            resolve_pocs: true,
            weights: ScoreWeights::default(),
        }
    }
}

/// Reward model persisted across sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_chosen_reward")]
    pub chosen_reward: f64,
    #[serde(default = "default_negative_reward")]
    pub negative_reward: f64,
    /// JSON file holding the serialized key to vote list map.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

fn default_chosen_reward() -> f64 {
    1.0
}
fn default_negative_reward() -> f64 {
    -0.1
}
fn default_store_path() -> PathBuf {
    PathBuf::from("learning.json")
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chosen_reward: default_chosen_reward(),
            negative_reward: default_negative_reward(),
            store_path: default_store_path(),
        }
    }
}

/// Formal query synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// LIMIT appended to every synthesized query.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Relative tolerance of the "approximately" comparison.
    #[serde(default = "default_similarity_tolerance")]
    pub similarity_tolerance: f64,
}

fn default_max_results() -> usize {
    100
}
fn default_similarity_tolerance() -> f64 {
    0.1
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            similarity_tolerance: default_similarity_tolerance(),
        }
    }
}

/// Aggregation tasks and the phrases that name them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Tasks cloned onto datatype properties as one-turn "quick" votes.
    #[serde(default = "default_quick_tasks")]
    pub quick_tasks: Vec<String>,
    /// Task name to verbalizations.
    #[serde(default = "default_verbalizations")]
    pub verbalizations: BTreeMap<String, Vec<String>>,
}

fn default_quick_tasks() -> Vec<String> {
    ["max", "min", "sum", "avg"].iter().map(|s| s.to_string()).collect()
}

fn default_verbalizations() -> BTreeMap<String, Vec<String>> {
    let table: [(&str, &[&str]); 5] = [
        ("max", &["highest", "maximum", "largest", "biggest", "most"]),
        ("min", &["lowest", "minimum", "smallest", "least", "fewest"]),
        ("sum", &["total", "sum", "overall", "combined"]),
        ("avg", &["average", "mean", "typical"]),
        ("count", &["number of", "count", "how many"]),
    ];
    table
        .iter()
        .map(|(task, words)| {
            (
                task.to_string(),
                words.iter().map(|w| w.to_string()).collect(),
            )
        })
        .collect()
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            quick_tasks: default_quick_tasks(),
            verbalizations: default_verbalizations(),
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content).map_err(|message| ConfigError::Parse {
            path: path.display().to_string(),
            message,
        })
    }

    /// Parse from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}
