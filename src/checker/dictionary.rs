use crate::checker::suggestions;
use crate::checker::tokenizer::match_case;
use anyhow::{Context, Result};
use fst::{Automaton, IntoStreamer, Set, SetBuilder, Streamer};
use memmap2::Mmap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Base word list consulted by a worker for every token it cannot skip.
///
/// Implementations live inside a single worker and are never shared, so they
/// need neither `Send` nor `Sync`.
pub trait Lexicon {
    fn check(&self, word: &str) -> bool;

    /// Ranked replacements for an unknown word, at most `max` of them.
    fn suggest(&self, word: &str, max: usize) -> Vec<String>;
}

/// Builds a fresh [`Lexicon`] for one worker.
pub trait LexiconSource: Send + Sync {
    fn load(&self) -> Result<Box<dyn Lexicon>>;
}

impl<F> LexiconSource for F
where
    F: Fn() -> Result<Box<dyn Lexicon>> + Send + Sync,
{
    fn load(&self) -> Result<Box<dyn Lexicon>> {
        self()
    }
}

/// Loads the FST dictionary for a language, or from an explicit path.
#[derive(Debug, Clone)]
pub struct DictionarySource {
    pub language: String,
    pub path: Option<PathBuf>,
}

impl DictionarySource {
    pub fn new(language: impl Into<String>, path: Option<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            language: language.into(),
            path,
        })
    }
}

impl LexiconSource for DictionarySource {
    fn load(&self) -> Result<Box<dyn Lexicon>> {
        let dictionary = match &self.path {
            Some(path) => Dictionary::load_from_path(path)?,
            None => Dictionary::load(&self.language)?,
        };
        Ok(Box::new(dictionary))
    }
}

/// FST bytes: mapped from disk, or built in memory.
enum Bytes {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl AsRef<[u8]> for Bytes {
    fn as_ref(&self) -> &[u8] {
        match self {
            Bytes::Mapped(map) => map,
            Bytes::Owned(bytes) => bytes,
        }
    }
}

pub struct Dictionary {
    set: Set<Bytes>,
}

impl Dictionary {
    /// Load dictionary for given language, seeding a minimal one on first use
    pub fn load(language: &str) -> Result<Self> {
        let dict_path = Self::get_dictionary_path(language)?;

        if !dict_path.exists() {
            Self::build_from_words(&Self::seed_words(), &dict_path)?;
        }

        Self::load_from_path(&dict_path)
    }

    /// Load an FST `.dict` file, or a plain word list (one word per line).
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let is_word_list = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("txt" | "dic" | "words")
        );

        if is_word_list {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read word list: {}", path.display()))?;
            return Self::from_words(content.lines());
        }

        let file = File::open(path)
            .with_context(|| format!("Failed to open dictionary: {}", path.display()))?;
        // SAFETY: dictionary files are only ever replaced whole, never edited in place.
        let map = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to map dictionary: {}", path.display()))?;
        let set = Set::new(Bytes::Mapped(map)).context("Failed to parse dictionary")?;

        Ok(Self { set })
    }

    /// Build an in-memory dictionary; words are lowercased, `#` lines skipped.
    pub fn from_words<I, S>(words: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sorted = normalize(words);
        let mut builder = SetBuilder::memory();
        for word in &sorted {
            builder
                .insert(word.as_bytes())
                .context("Failed to insert word into dictionary")?;
        }
        let bytes = builder
            .into_inner()
            .context("Failed to finalize dictionary")?;

        Ok(Self {
            set: Set::new(Bytes::Owned(bytes)).context("Failed to parse dictionary")?,
        })
    }

    /// Check if word exists in dictionary
    pub fn contains(&self, word: &str) -> bool {
        self.set.contains(word.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Get all words with a given prefix
    pub fn words_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut results = Vec::new();
        let mut stream = self
            .set
            .search(fst::automaton::Str::new(prefix).starts_with())
            .into_stream();

        while let Some(key) = stream.next() {
            if let Ok(word) = String::from_utf8(key.to_vec()) {
                results.push(word);
            }
        }

        results
    }

    /// Words whose length is within one char of `len`.
    ///
    /// Streams the whole set; only used for very short words.
    pub fn words_near_length(&self, len: usize) -> Vec<String> {
        let mut words = Vec::new();
        let mut stream = self.set.stream();

        while let Some(key) = stream.next() {
            if let Ok(word) = std::str::from_utf8(key) {
                if word.chars().count().abs_diff(len) <= 1 {
                    words.push(word.to_string());
                }
            }
        }

        words
    }

    /// Write an FST dictionary file from a word list
    pub fn build_from_words<S: AsRef<str>>(words: &[S], output_path: &Path) -> Result<()> {
        let sorted = normalize(words);

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).context("Failed to create dictionary directory")?;
        }
        // Built beside the target and renamed over it, so mapped readers keep
        // their old file intact.
        let partial = output_path.with_extension("dict.partial");
        let file = File::create(&partial)
            .with_context(|| format!("Failed to create dictionary: {}", partial.display()))?;

        let mut builder =
            SetBuilder::new(BufWriter::new(file)).context("Failed to create FST builder")?;
        for word in sorted {
            builder
                .insert(word.as_bytes())
                .context("Failed to insert word into dictionary")?;
        }
        builder.finish().context("Failed to finalize dictionary")?;

        fs::rename(&partial, output_path)
            .with_context(|| format!("Failed to install dictionary: {}", output_path.display()))
    }

    pub fn get_dictionary_path(language: &str) -> Result<PathBuf> {
        let data_dir = crate::config::Config::data_dir().context("Failed to get data directory")?;
        Ok(data_dir.join(format!("{}.dict", language)))
    }

    /// Bootstrap list used until a real dictionary is downloaded.
    fn seed_words() -> Vec<&'static str> {
        SEED_WORDS.split_whitespace().collect()
    }
}

impl Lexicon for Dictionary {
    fn check(&self, word: &str) -> bool {
        let lower = word.to_lowercase().replace('’', "'");
        if self.contains(&lower) {
            return true;
        }
        // Possessives of known words are known.
        lower
            .strip_suffix("'s")
            .is_some_and(|stem| !stem.is_empty() && self.contains(stem))
    }

    fn suggest(&self, word: &str, max: usize) -> Vec<String> {
        suggestions::generate(&word.to_lowercase(), self, max)
            .into_iter()
            .map(|s| match_case(word, &s))
            .collect()
    }
}

fn normalize<I, S>(words: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut sorted: Vec<String> = words
        .into_iter()
        .map(|w| w.as_ref().trim().to_lowercase())
        .filter(|w| !w.is_empty() && !w.starts_with('#'))
        .collect();
    sorted.sort();
    sorted.dedup();
    sorted
}

const SEED_WORDS: &str = "
    a about after again all also an and any are as at back be because been before
    being but by can check code come could day do document does edit editor even
    file first for from get give go good had has have he her here him his how i if
    in into is it its just know like line look make many may me more most my new
    no not now of on one only or other our out over people say see she should so
    some spelling take text than that the their them then there these they think
    this time to two up us use very want was way we well were what when which who
    will with word work would write year you your
";
