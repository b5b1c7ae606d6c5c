use crate::checker::dictionary::Dictionary;
use crate::config::Config;
use crate::dict::store::{DictionaryStore, DictionaryTarget, FileDictionaryStore};
use anyhow::{Context, Result};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;

// Pinned commit so a download always yields the same list.
const WORDLIST_BASE_URL: &str =
    "https://raw.githubusercontent.com/dwyl/english-words/6e4bc58ad764c3e6df8b5be4048671962c9d6a23";
const WORDLIST_VERSION: &str = "2023.12";

/// Print installed base dictionaries and the custom word store location.
pub fn list_dictionaries(store: &FileDictionaryStore) -> Result<()> {
    let data_dir = Config::data_dir().context("Failed to get data directory")?;
    let installed = installed_languages(&data_dir)?;

    if installed.is_empty() {
        println!("{}", "No dictionaries installed.".yellow());
        println!(
            "Run {} to download a dictionary.",
            "inkcheck dict download en_US".cyan()
        );
    } else {
        println!("{}", "Installed dictionaries:".bold());
        println!();
        for (language, size) in &installed {
            println!(
                "  {} {} ({})",
                "✓".green(),
                language.cyan().bold(),
                format!("{}KB", size / 1024).dimmed()
            );
        }
    }

    println!();
    println!("Data directory: {}", data_dir.display().to_string().dimmed());
    println!(
        "Custom words:   {}",
        store.root().display().to_string().dimmed()
    );

    Ok(())
}

fn installed_languages(data_dir: &Path) -> Result<Vec<(String, u64)>> {
    if !data_dir.exists() {
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    for entry in fs::read_dir(data_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) != Some("dict") {
            continue;
        }
        if let Some(language) = path.file_stem().and_then(|s| s.to_str()) {
            found.push((language.to_string(), fs::metadata(&path)?.len()));
        }
    }
    found.sort();
    Ok(found)
}

pub fn download_dictionary(language: &str) -> Result<()> {
    println!(
        "{} dictionary for {} (version: {})...",
        "Downloading".cyan().bold(),
        language.yellow(),
        WORDLIST_VERSION.dimmed()
    );

    let wordlist_url = wordlist_url(language)?;
    println!("Source: {}", wordlist_url.dimmed());

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    pb.set_message("Downloading...");

    let response =
        reqwest::blocking::get(&wordlist_url).context("Failed to download dictionary")?;
    if !response.status().is_success() {
        anyhow::bail!("Failed to download dictionary: HTTP {}", response.status());
    }
    let content = response.text()?;
    pb.finish_with_message("Download complete");

    println!("{}", "Building dictionary...".cyan());
    let words = parse_wordlist(&content);
    println!("Found {} words", words.len().to_string().yellow());

    let dict_path = Dictionary::get_dictionary_path(language)?;
    Dictionary::build_from_words(&words, &dict_path)?;

    println!(
        "{} Dictionary installed: {}",
        "✓".green().bold(),
        dict_path.display().to_string().cyan()
    );

    Ok(())
}

fn wordlist_url(language: &str) -> Result<String> {
    match language {
        "en_US" | "en_GB" => Ok(format!("{}/words_alpha.txt", WORDLIST_BASE_URL)),
        other => anyhow::bail!(
            "Language '{}' is not supported. Only 'en_US' and 'en_GB' are currently available.",
            other
        ),
    }
}

fn parse_wordlist(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.trim().to_lowercase())
        .filter(|line| line.chars().count() > 1)
        .collect()
}

/// Save a word to one of the custom lists.
pub fn add_word(
    store: &dyn DictionaryStore,
    word: &str,
    user_id: &str,
    target: &DictionaryTarget,
) -> Result<()> {
    store
        .add_word(word, user_id, target)
        .with_context(|| format!("Failed to add \"{}\" to the {}", word, target))?;

    println!(
        "{} Added {} to the {}",
        "✓".green().bold(),
        word.cyan().bold(),
        target
    );
    Ok(())
}
