pub mod markdown;

use std::ops::Range;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileType {
    #[default]
    Markdown,
    PlainText,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "md" | "mdx" | "markdown" | "mkd" => FileType::Markdown,
            _ => FileType::PlainText,
        }
    }

    /// Whether a directory walk should pick this path up.
    pub fn is_checkable(path: &Path) -> bool {
        matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("md" | "mdx" | "markdown" | "mkd" | "txt" | "text")
        )
    }
}

/// Document-global byte ranges that must never be checked.
pub fn skip_regions(file_type: FileType, content: &str) -> Vec<Range<usize>> {
    match file_type {
        FileType::Markdown => markdown::skip_regions(content),
        FileType::PlainText => Vec::new(),
    }
}
