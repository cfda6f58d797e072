// SPDX-License-Identifier: GPL-3.0-or-later
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// Value Objects
// ============================================================================

/// A month of the year, where 0 denotes an unspecified month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Month(u8);

const MONTH_NAMES: [&str; 13] = [
    "",
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

impl Month {
    pub const UNSPECIFIED: Month = Month(0);

    /// Create a month from a number in 0..=12 (0 = unspecified).
    pub fn new(number: i64) -> Option<Self> {
        if (0..=12).contains(&number) {
            Some(Self(number as u8))
        } else {
            None
        }
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn is_unspecified(self) -> bool {
        self.0 == 0
    }

    /// The full English month name, or the empty string when unspecified.
    pub fn name(self) -> &'static str {
        MONTH_NAMES[self.0 as usize]
    }

    /// The month following this one. December wraps to January without a
    /// year carry; unspecified stays unspecified.
    pub fn next(self) -> Self {
        match self.0 {
            0 => Self(0),
            12 => Self(1),
            n => Self(n + 1),
        }
    }

    /// Parse a month from a 1-2 digit number or a case-insensitive English
    /// month name. Names are keyed by their first three letters, so
    /// abbreviations ("sep", "Sept") and full names both work.
    pub fn parse(text: &str) -> Option<Self> {
        if !text.is_empty() && text.len() <= 2 && text.chars().all(|c| c.is_ascii_digit()) {
            let number: i64 = text.parse().ok()?;
            return if number == 0 { None } else { Self::new(number) };
        }

        let key: String = text.chars().take(3).collect::<String>().to_lowercase();
        let number = match key.as_str() {
            "jan" => 1,
            "feb" => 2,
            "mar" => 3,
            "apr" => 4,
            "may" => 5,
            "jun" => 6,
            "jul" => 7,
            "aug" => 8,
            "sep" => 9,
            "oct" => 10,
            "nov" => 11,
            "dec" => 12,
            _ => return None,
        };
        Some(Self(number))
    }
}

impl std::fmt::Display for Month {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Expand a captured year string to a full year. Two-digit years use a fixed
/// cutoff: 70..=99 become 19xx, 00..=69 become 20xx. Everything else passes
/// through as its integer value.
pub fn expand_year(raw: &str) -> Option<i64> {
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let value: i64 = raw.parse().ok()?;
    if raw.len() == 2 {
        if value >= 70 {
            Some(1900 + value)
        } else {
            Some(2000 + value)
        }
    } else {
        Some(value)
    }
}

// ============================================================================
// Entities
// ============================================================================

/// One configured magazine: the filename pattern its issues match, the
/// metadata attached to every issue, and the optional override formulas
/// used to derive volume/index/year/month from the captured filename parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagazineRule {
    pub name: String,
    /// Filename template with `{V}`, `{I}`, `{Y}`, `{M}` placeholders.
    pub pattern: String,
    /// Title template with `{volume}`, `{index}`, `{year}`, `{month}`,
    /// `{next_month}` slots.
    pub title: String,
    pub authors: String,
    pub languages: String,
    pub publisher: String,
    pub tags: Option<String>,
    pub archive_dir: Option<PathBuf>,
    pub volume_formula: Option<String>,
    pub index_formula: Option<String>,
    pub year_formula: Option<String>,
    pub month_formula: Option<String>,
}

/// The fully resolved metadata record produced for one rule that matched one
/// inbox file. Consumed once by the import workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedIssue {
    /// Name of the issue's file in the inbox.
    pub filename: String,
    /// The series the magazine belongs to (the rule's name).
    pub series: String,
    /// Volume number including the index within the volume, `"{V}.{II}"`.
    pub number: String,
    pub title: String,
    pub authors: String,
    pub languages: String,
    pub publisher: String,
    pub tags: Option<String>,
    pub archive_dir: Option<PathBuf>,
    /// File name the issue is archived under inside `archive_dir`.
    pub archive_filename: String,
}

// ============================================================================
// File Name Utilities
// ============================================================================

fn sanitize_component(input: &str) -> String {
    // Remove characters invalid on Windows and common problematic ones
    let banned = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
    input
        .chars()
        .map(|c| if banned.contains(&c) { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Build the archive file name for an issue: the sanitized title plus the
/// source file's extension.
pub fn archive_file_name(title: &str, source: &Path) -> String {
    let stem = sanitize_component(title);
    match source.extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{}.{}", stem, ext),
        _ => stem,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_parse_numeric() {
        assert_eq!(Month::parse("1"), Month::new(1));
        assert_eq!(Month::parse("01"), Month::new(1));
        assert_eq!(Month::parse("9"), Month::new(9));
        assert_eq!(Month::parse("12"), Month::new(12));
        assert_eq!(Month::parse("0"), None);
        assert_eq!(Month::parse("13"), None);
        assert_eq!(Month::parse(""), None);
    }

    #[test]
    fn month_parse_names() {
        assert_eq!(Month::parse("jan"), Month::new(1));
        assert_eq!(Month::parse("March"), Month::new(3));
        assert_eq!(Month::parse("SEPTEMBER"), Month::new(9));
        assert_eq!(Month::parse("Sept"), Month::new(9));
        assert_eq!(Month::parse("dec"), Month::new(12));
        assert_eq!(Month::parse("xyz"), None);
        assert_eq!(Month::parse("ja"), None);
    }

    #[test]
    fn month_name_roundtrip() {
        // parse is a left inverse of name formatting for every real month
        for number in 1..=12u8 {
            let month = Month::new(number as i64).unwrap();
            let prefix: String = month.name().chars().take(3).collect();
            assert_eq!(Month::parse(&prefix), Some(month));
            assert_eq!(Month::parse(month.name()), Some(month));
        }
    }

    #[test]
    fn month_next_wraps_december() {
        assert_eq!(Month::new(12).unwrap().next(), Month::new(1).unwrap());
        assert_eq!(Month::new(3).unwrap().next(), Month::new(4).unwrap());
        assert_eq!(Month::UNSPECIFIED.next(), Month::UNSPECIFIED);
    }

    #[test]
    fn month_name_of_unspecified_is_empty() {
        assert_eq!(Month::UNSPECIFIED.name(), "");
        assert_eq!(Month::new(5).unwrap().name(), "May");
    }

    #[test]
    fn month_display_is_numeric() {
        assert_eq!(Month::new(7).unwrap().to_string(), "7");
        assert_eq!(Month::UNSPECIFIED.to_string(), "0");
    }

    #[test]
    fn year_expansion() {
        assert_eq!(expand_year("2023"), Some(2023));
        assert_eq!(expand_year("1999"), Some(1999));
        assert_eq!(expand_year("70"), Some(1970));
        assert_eq!(expand_year("99"), Some(1999));
        assert_eq!(expand_year("69"), Some(2069));
        assert_eq!(expand_year("00"), Some(2000));
        assert_eq!(expand_year("7"), Some(7));
        assert_eq!(expand_year(""), None);
        assert_eq!(expand_year("20x3"), None);
    }

    #[test]
    fn archive_file_name_keeps_extension() {
        let name = archive_file_name("Magazine 2023.3", Path::new("mag-202303.pdf"));
        assert_eq!(name, "Magazine 2023.3.pdf");
    }

    #[test]
    fn archive_file_name_sanitizes_title() {
        let name = archive_file_name("Vol. 1/2: Special", Path::new("in/issue.epub"));
        assert_eq!(name, "Vol. 1 2  Special.epub");
    }

    #[test]
    fn archive_file_name_without_extension() {
        let name = archive_file_name("Issue 7", Path::new("issue7"));
        assert_eq!(name, "Issue 7");
    }
}
