use crate::checker::grammar::RuleSet;
use crate::checker::CheckOptions;
use crate::chunker::DEFAULT_MAX_CHUNK_SIZE;
use crate::markers::reconciler::SessionOptions;
use crate::parser::FileType;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

const LOCAL_CONFIG: &str = ".inkcheck.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub language: String,
    /// Base lexicon: an FST `.dict` file or a plain word list.
    pub dictionary: Option<PathBuf>,
    /// Root of the user/folder/category word lists.
    pub custom_dictionary_dir: Option<PathBuf>,
    pub ignore_patterns: Vec<String>,
    pub enabled_rules: Vec<String>,
    pub max_suggestions: usize,
    pub workers: usize,
    pub max_chunk_size: usize,
    pub local_window_lines: usize,
    pub max_sentence_words: usize,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            language: "en_US".to_string(),
            dictionary: None,
            custom_dictionary_dir: None,
            ignore_patterns: vec![
                r"^[A-Z0-9_]{2,}$".to_string(),    // ALL_CAPS
                r"^[a-fA-F0-9]{32,}$".to_string(), // Hashes
            ],
            enabled_rules: RuleSet::NAMES.iter().map(|s| s.to_string()).collect(),
            max_suggestions: 5,
            workers: default_workers(),
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            local_window_lines: 2,
            max_sentence_words: 40,
        }
    }
}

/// Values given on the command line; `None` leaves the file/default value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub language: Option<String>,
    pub dictionary: Option<PathBuf>,
    pub ignore_patterns: Vec<String>,
    pub workers: Option<usize>,
}

impl Config {
    /// Load configuration with priority: CLI args > local config > global config > defaults
    pub fn load(overrides: Overrides) -> Result<Self> {
        let mut config = Self::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                config = config.merge(Self::from_file(&global_path)?);
            }
        }

        let local_path = PathBuf::from(LOCAL_CONFIG);
        if local_path.exists() {
            config = config.merge(Self::from_file(&local_path)?);
        }

        config.apply(overrides);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// `other`'s values win wherever they differ from the defaults.
    fn merge(mut self, other: Self) -> Self {
        let defaults = Self::default();
        if other.language != defaults.language {
            self.language = other.language;
        }
        if other.dictionary.is_some() {
            self.dictionary = other.dictionary;
        }
        if other.custom_dictionary_dir.is_some() {
            self.custom_dictionary_dir = other.custom_dictionary_dir;
        }
        if other.ignore_patterns != defaults.ignore_patterns {
            self.ignore_patterns = other.ignore_patterns;
        }
        if other.enabled_rules != defaults.enabled_rules {
            self.enabled_rules = other.enabled_rules;
        }
        if other.max_suggestions != defaults.max_suggestions {
            self.max_suggestions = other.max_suggestions;
        }
        if other.workers != defaults.workers {
            self.workers = other.workers;
        }
        if other.max_chunk_size != defaults.max_chunk_size {
            self.max_chunk_size = other.max_chunk_size;
        }
        if other.local_window_lines != defaults.local_window_lines {
            self.local_window_lines = other.local_window_lines;
        }
        if other.max_sentence_words != defaults.max_sentence_words {
            self.max_sentence_words = other.max_sentence_words;
        }
        self
    }

    fn apply(&mut self, overrides: Overrides) {
        if let Some(language) = overrides.language {
            self.language = language;
        }
        if let Some(dictionary) = overrides.dictionary {
            self.dictionary = Some(dictionary);
        }
        self.ignore_patterns.extend(overrides.ignore_patterns);
        if let Some(workers) = overrides.workers {
            self.workers = workers;
        }
    }

    /// Checker settings. Bad patterns and unknown rule names are reported
    /// and left out.
    pub fn check_options(&self) -> CheckOptions {
        let ignore_patterns = self
            .ignore_patterns
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "ignoring invalid ignore pattern");
                    None
                }
            })
            .collect();

        for rule in &self.enabled_rules {
            if !RuleSet::NAMES.contains(&rule.as_str()) {
                warn!(rule = %rule, "unknown rule in enabled_rules");
            }
        }

        CheckOptions {
            max_suggestions: self.max_suggestions,
            rules: RuleSet::from_names(&self.enabled_rules),
            ignore_patterns,
            max_sentence_words: self.max_sentence_words,
        }
    }

    pub fn session_options(&self, file_type: FileType) -> SessionOptions {
        SessionOptions {
            max_chunk_size: self.max_chunk_size,
            local_window_lines: self.local_window_lines,
            file_type,
            ..Default::default()
        }
    }

    pub fn global_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "inkcheck").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn data_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "inkcheck").map(|dirs| dirs.data_dir().to_path_buf())
    }
}
