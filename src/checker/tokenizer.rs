use lazy_static::lazy_static;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

lazy_static! {
    static ref WORD: Regex = Regex::new(r"\p{L}+(?:['’]\p{L}+)*").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a str,
    /// Byte range inside the tokenized text.
    pub start: usize,
    pub end: usize,
}

/// Words made of letters, with inner apostrophes ("don't", "l’homme").
pub fn tokens(text: &str) -> impl Iterator<Item = Token<'_>> {
    WORD.find_iter(text).map(|m| Token {
        text: m.as_str(),
        start: m.start(),
        end: m.end(),
    })
}

pub fn title_case(word: &str) -> String {
    let mut graphemes = word.graphemes(true);
    match graphemes.next() {
        Some(first) => {
            let mut out = first.to_uppercase();
            out.push_str(&graphemes.as_str().to_lowercase());
            out
        }
        None => String::new(),
    }
}

/// The four spellings a custom word is matched under.
pub fn case_forms(word: &str) -> [String; 4] {
    [
        word.to_string(),
        word.to_lowercase(),
        word.to_uppercase(),
        title_case(word),
    ]
}

/// Re-apply the casing pattern of `template` to `word`.
pub fn match_case(template: &str, word: &str) -> String {
    let letters = || template.chars().filter(|c| c.is_alphabetic());
    if letters().count() > 1 && letters().all(|c| c.is_uppercase()) {
        word.to_uppercase()
    } else if letters().next().is_some_and(|c| c.is_uppercase()) {
        title_case(word)
    } else {
        word.to_string()
    }
}
