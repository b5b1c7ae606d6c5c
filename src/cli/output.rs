use crate::markers::Marker;
use crate::Severity;
use anyhow::Result;
use colored::*;
use dialoguer::Select;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonIssue {
    file: String,
    line: usize,
    column: usize,
    end_line: usize,
    end_column: usize,
    severity: Severity,
    code: String,
    message: String,
    word: String,
    suggestions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonOutput {
    files_checked: usize,
    total_errors: usize,
    total_issues: usize,
    issues: Vec<JsonIssue>,
}

/// Markers of one checked file, kept for the JSON report.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: String,
    pub markers: Vec<Marker>,
}

pub fn error_count(markers: &[Marker]) -> usize {
    markers
        .iter()
        .filter(|m| m.severity == Severity::Error)
        .count()
}

pub fn print_markers(file_path: &Path, text: &str, markers: &[Marker], colored_output: bool) {
    if markers.is_empty() {
        return;
    }

    let file_name = file_path.display().to_string();
    if colored_output {
        println!("\n{}", file_name.bold().underline());
    } else {
        println!("\n{}", file_name);
    }

    for marker in markers {
        let line_info = format!("{}:{}", marker.start_line, marker.start_column);
        let context = context_line(text, marker.start_line);

        if colored_output {
            println!(
                "  {} {} {} {}",
                line_info.blue().bold(),
                severity_label(marker.severity),
                marker.message,
                format!("[{}]", marker.code).dimmed()
            );
            println!("    {}", format_context(context, &marker.data.word, true));
        } else {
            println!(
                "  {} {} {} [{}]",
                line_info, marker.severity, marker.message, marker.code
            );
            println!("    {}", context);
        }

        if !marker.data.suggestions.is_empty() {
            let suggestions: Vec<String> = marker
                .data
                .suggestions
                .iter()
                .take(5)
                .map(|s| {
                    if colored_output {
                        s.green().to_string()
                    } else {
                        s.clone()
                    }
                })
                .collect();
            let arrow = if colored_output { "→".dimmed().to_string() } else { "→".to_string() };
            println!("    {} {}", arrow, suggestions.join(", "));
        }
    }
}

pub fn print_json_report(reports: &[FileReport]) -> Result<()> {
    let issues: Vec<JsonIssue> = reports
        .iter()
        .flat_map(|report| {
            report.markers.iter().map(|m| JsonIssue {
                file: report.path.clone(),
                line: m.start_line,
                column: m.start_column,
                end_line: m.end_line,
                end_column: m.end_column,
                severity: m.severity,
                code: m.code.clone(),
                message: m.message.clone(),
                word: m.data.word.clone(),
                suggestions: m.data.suggestions.clone(),
            })
        })
        .collect();

    let output = JsonOutput {
        files_checked: reports.len(),
        total_errors: issues.iter().filter(|i| i.severity == Severity::Error).count(),
        total_issues: issues.len(),
        issues,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn severity_label(severity: Severity) -> ColoredString {
    let label = severity.to_string();
    match severity {
        Severity::Error => label.red().bold(),
        Severity::Warning => label.yellow().bold(),
        Severity::Info => label.cyan(),
        Severity::Hint => label.dimmed(),
    }
}

fn context_line(text: &str, line: usize) -> &str {
    text.lines().nth(line.saturating_sub(1)).unwrap_or("").trim()
}

fn format_context(context: &str, word: &str, colored: bool) -> String {
    if colored && !word.is_empty() && !word.contains('\n') {
        context.replace(word, &word.red().bold().to_string())
    } else {
        context.to_string()
    }
}

pub fn print_check_summary(total_errors: usize, total_issues: usize, files: usize, colored: bool) {
    let file_word = if files == 1 { "file" } else { "files" };
    println!();
    if total_issues == 0 {
        if colored {
            println!("{}", "✓ No issues found!".green().bold());
        } else {
            println!("✓ No issues found!");
        }
        return;
    }

    let error_word = if total_errors == 1 { "error" } else { "errors" };
    let others = total_issues - total_errors;
    if colored {
        println!(
            "{} {} {} and {} other {} found in {} {}",
            "✗".red().bold(),
            total_errors.to_string().red().bold(),
            error_word,
            others.to_string().yellow(),
            if others == 1 { "issue" } else { "issues" },
            files,
            file_word
        );
    } else {
        println!(
            "✗ {} {} and {} other {} found in {} {}",
            total_errors,
            error_word,
            others,
            if others == 1 { "issue" } else { "issues" },
            files,
            file_word
        );
    }
}

pub fn print_fix_summary(total_fixed: usize, files: usize, colored: bool) {
    println!();
    if total_fixed == 0 {
        if colored {
            println!("{}", "No corrections needed!".green().bold());
        } else {
            println!("No corrections needed!");
        }
        return;
    }

    let fix_word = if total_fixed == 1 { "correction" } else { "corrections" };
    let file_word = if files == 1 { "file" } else { "files" };
    if colored {
        println!(
            "{} {} {} applied to {} {}",
            "✓".green().bold(),
            total_fixed.to_string().green().bold(),
            fix_word,
            files,
            file_word
        );
    } else {
        println!("✓ {} {} applied to {} {}", total_fixed, fix_word, files, file_word);
    }
}

/// What the user picked for one marker in interactive mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Action(usize),
    Skip,
    Quit,
}

pub fn prompt_action(
    marker: &Marker,
    text: &str,
    titles: &[String],
    colored: bool,
) -> Result<Choice> {
    let context = context_line(text, marker.start_line);
    if colored {
        println!(
            "\n{} {}:{}",
            format!("{}:", marker.message).yellow().bold(),
            marker.start_line.to_string().blue(),
            marker.start_column.to_string().blue()
        );
        println!("  {}", format_context(context, &marker.data.word, true));
    } else {
        println!("\n{}: {}:{}", marker.message, marker.start_line, marker.start_column);
        println!("  {}", context);
    }

    let mut items: Vec<String> = titles.to_vec();
    items.push("Skip".to_string());
    items.push("Quit".to_string());

    let picked = Select::new()
        .with_prompt("Choose a fix")
        .items(&items)
        .default(0)
        .interact_opt()?;

    Ok(match picked {
        Some(i) if i < titles.len() => Choice::Action(i),
        Some(i) if i == titles.len() => Choice::Skip,
        _ => Choice::Quit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_context_line() {
        let text = "first\n  second line  \nthird";
        assert_eq!(context_line(text, 2), "second line");
        assert_eq!(context_line(text, 9), "");
    }

    #[test]
    fn test_plain_context_is_untouched() {
        assert_eq!(format_context("say teh word", "teh", false), "say teh word");
    }
}
