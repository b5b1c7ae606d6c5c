use lazy_static::lazy_static;
use pulldown_cmark::{Event, Options, Parser, Tag};
use regex::Regex;
use std::ops::Range;

lazy_static! {
    /// Line prefixes that are markdown syntax rather than prose.
    static ref STRUCTURAL_PREFIXES: Vec<Regex> = [
        r"^\s{0,3}#{1,6}(?:\s+|$)",                 // heading
        r"^\s*[-*+]\s+\[[ xX]\]\s*",                // task list item
        r"^\s*[-*+]\s+",                            // bullet
        r"^\s*\d{1,9}[.)]\s+",                      // ordered list
        r"^\s*(?:>\s?)+",                           // blockquote
        r"^\s{0,3}(?:[-*_][ \t]*){3,}$",            // horizontal rule
        r"^\s*\|(?:\s*:?-+:?\s*\|)*",               // table pipe / delimiter row
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect();
}

/// Code spans, code blocks and front matter, as sorted, merged byte ranges.
pub fn skip_regions(content: &str) -> Vec<Range<usize>> {
    let mut regions = Vec::new();
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_YAML_STYLE_METADATA_BLOCKS;

    for (event, range) in Parser::new_ext(content, options).into_offset_iter() {
        match event {
            // Start events of block containers carry the whole block's range.
            Event::Start(Tag::CodeBlock(_)) | Event::Start(Tag::MetadataBlock(_)) => {
                regions.push(range)
            }
            Event::Code(_) => regions.push(range),
            _ => {}
        }
    }

    merge(regions)
}

fn merge(mut regions: Vec<Range<usize>>) -> Vec<Range<usize>> {
    regions.sort_by_key(|r| (r.start, r.end));
    let mut merged: Vec<Range<usize>> = Vec::with_capacity(regions.len());
    for r in regions {
        match merged.last_mut() {
            Some(last) if r.start <= last.end => last.end = last.end.max(r.end),
            _ => merged.push(r),
        }
    }
    merged
}

/// Length in bytes of the longest structural markdown prefix of `line`.
pub fn structural_prefix_len(line: &str) -> Option<usize> {
    STRUCTURAL_PREFIXES
        .iter()
        .filter_map(|re| re.find(line).map(|m| m.end()))
        .filter(|&len| len > 0)
        .max()
}
