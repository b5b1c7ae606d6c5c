//! Custom word lists scoped to a user, a folder or a category.

use crate::checker::CustomWords;
use anyhow::{Context, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Where the current document lives, which decides the word lists that apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordScope {
    pub user_id: String,
    pub folder_path: Option<String>,
    pub category_id: Option<String>,
}

impl WordScope {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    /// Every list a lookup in this scope reads.
    pub fn targets(&self) -> Vec<DictionaryTarget> {
        let mut targets = vec![DictionaryTarget::User];
        if let Some(folder) = &self.folder_path {
            targets.push(DictionaryTarget::Folder(folder.clone()));
        }
        if let Some(category) = &self.category_id {
            targets.push(DictionaryTarget::Category(category.clone()));
        }
        targets
    }
}

/// The list a new word is written to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "camelCase")]
pub enum DictionaryTarget {
    User,
    Folder(String),
    Category(String),
}

impl fmt::Display for DictionaryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DictionaryTarget::User => write!(f, "user dictionary"),
            DictionaryTarget::Folder(path) => write!(f, "folder dictionary ({})", path),
            DictionaryTarget::Category(id) => write!(f, "category dictionary ({})", id),
        }
    }
}

/// Persistence for custom words. Calls may block; async callers go through
/// `spawn_blocking`.
pub trait DictionaryStore: Send + Sync {
    fn add_word(&self, word: &str, user_id: &str, target: &DictionaryTarget) -> Result<()>;

    /// Union of the user, folder and category lists that apply to `scope`.
    fn lookup(&self, scope: &WordScope) -> Result<CustomWords>;
}

/// One plain-text word list per scope under a root directory:
///
/// ```text
/// <root>/users/<user>/user.txt
/// <root>/users/<user>/folders/<sha256(folder)>.txt
/// <root>/users/<user>/categories/<category>.txt
/// ```
#[derive(Debug, Clone)]
pub struct FileDictionaryStore {
    root: PathBuf,
}

impl FileDictionaryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store under the platform data directory.
    pub fn default_location() -> Result<Self> {
        let data_dir = crate::config::Config::data_dir().context("Failed to get data directory")?;
        Ok(Self::new(data_dir.join("custom")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn list_path(&self, user_id: &str, target: &DictionaryTarget) -> PathBuf {
        let user_dir = self.root.join("users").join(file_safe(user_id));
        match target {
            DictionaryTarget::User => user_dir.join("user.txt"),
            DictionaryTarget::Folder(path) => {
                let digest = Sha256::digest(path.as_bytes());
                let name: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
                user_dir.join("folders").join(format!("{}.txt", name))
            }
            DictionaryTarget::Category(id) => user_dir
                .join("categories")
                .join(format!("{}.txt", file_safe(id))),
        }
    }

    fn read_list(path: &Path) -> Result<Vec<String>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read word list: {}", path.display()))?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(String::from)
            .collect())
    }
}

impl DictionaryStore for FileDictionaryStore {
    fn add_word(&self, word: &str, user_id: &str, target: &DictionaryTarget) -> Result<()> {
        let word = word.trim();
        anyhow::ensure!(!word.is_empty(), "Cannot add an empty word");

        let path = self.list_path(user_id, target);
        if Self::read_list(&path)?.iter().any(|w| w == word) {
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create dictionary directory")?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open word list: {}", path.display()))?;
        writeln!(file, "{}", word)
            .with_context(|| format!("Failed to write word list: {}", path.display()))?;

        Ok(())
    }

    fn lookup(&self, scope: &WordScope) -> Result<CustomWords> {
        let mut words = Vec::new();
        for target in scope.targets() {
            words.extend(Self::read_list(&self.list_path(&scope.user_id, &target))?);
        }
        Ok(CustomWords::new(words))
    }
}

/// In-process store, for hosts that persist elsewhere and for tests.
#[derive(Debug, Default)]
pub struct MemoryDictionaryStore {
    lists: DashMap<(String, DictionaryTarget), Vec<String>>,
}

impl MemoryDictionaryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DictionaryStore for MemoryDictionaryStore {
    fn add_word(&self, word: &str, user_id: &str, target: &DictionaryTarget) -> Result<()> {
        let word = word.trim();
        anyhow::ensure!(!word.is_empty(), "Cannot add an empty word");

        let mut list = self
            .lists
            .entry((user_id.to_string(), target.clone()))
            .or_default();
        if !list.iter().any(|w| w == word) {
            list.push(word.to_string());
        }
        Ok(())
    }

    fn lookup(&self, scope: &WordScope) -> Result<CustomWords> {
        let mut words = Vec::new();
        for target in scope.targets() {
            if let Some(list) = self.lists.get(&(scope.user_id.clone(), target)) {
                words.extend(list.iter().cloned());
            }
        }
        Ok(CustomWords::new(words))
    }
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn scope() -> WordScope {
        WordScope {
            user_id: "alice".to_string(),
            folder_path: Some("/notes/rust".to_string()),
            category_id: Some("work".to_string()),
        }
    }

    #[test]
    fn test_file_store_scopes() {
        let dir = tempdir().unwrap();
        let store = FileDictionaryStore::new(dir.path());

        store.add_word("tokio", "alice", &DictionaryTarget::User).unwrap();
        store
            .add_word("rustc", "alice", &DictionaryTarget::Folder("/notes/rust".into()))
            .unwrap();
        store
            .add_word("Kubernetes", "alice", &DictionaryTarget::Category("work".into()))
            .unwrap();
        store
            .add_word("serde", "alice", &DictionaryTarget::Folder("/elsewhere".into()))
            .unwrap();

        let words = store.lookup(&scope()).unwrap();
        assert!(words.contains("tokio"));
        assert!(words.contains("rustc"));
        assert!(words.contains("kubernetes"));
        assert!(!words.contains("serde"));

        let user_only = store.lookup(&WordScope::for_user("alice")).unwrap();
        assert!(user_only.contains("tokio"));
        assert!(!user_only.contains("rustc"));

        assert!(store.lookup(&WordScope::for_user("bob")).unwrap().is_empty());
    }

    #[test]
    fn test_file_store_appends_once() {
        let dir = tempdir().unwrap();
        let store = FileDictionaryStore::new(dir.path());
        let path = store.list_path("alice", &DictionaryTarget::User);

        store.add_word("tokio", "alice", &DictionaryTarget::User).unwrap();
        store.add_word("tokio", "alice", &DictionaryTarget::User).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "tokio\n");

        fs::write(&path, "# comment\ntokio\n\nserde\n").unwrap();
        let words = store.lookup(&WordScope::for_user("alice")).unwrap();
        assert!(words.contains("serde"));
        assert!(!words.contains("# comment"));
    }

    #[test]
    fn test_folder_paths_are_hashed() {
        let store = FileDictionaryStore::new("/tmp/store");
        let path = store.list_path("alice", &DictionaryTarget::Folder("../../etc".into()));
        assert!(path.starts_with("/tmp/store/users/alice/folders"));
        assert_eq!(path.file_stem().unwrap().len(), 64);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryDictionaryStore::new();
        store
            .add_word("rustc", "alice", &DictionaryTarget::Folder("/notes/rust".into()))
            .unwrap();
        assert!(store.lookup(&scope()).unwrap().contains("Rustc"));
        assert!(store.add_word("  ", "alice", &DictionaryTarget::User).is_err());
    }
}
