// SPDX-License-Identifier: GPL-3.0-or-later

//! Metadata resolution.
//!
//! Turns the raw captures of a matched filename into the final volume,
//! index, year and month, applying the rule's override formulas where
//! configured, and renders the rule's title template. Resolution is a pure
//! function of the rule and the captures.

use magstand_domain::{expand_year, MagazineRule, Month};
use thiserror::Error;

use crate::formula::{evaluate, FormulaContext, FormulaError};
use crate::pattern::RawCaptures;

/// Errors raised while resolving a matched filename's metadata.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("formula for {field}: {source}")]
    Formula {
        field: &'static str,
        #[source]
        source: FormulaError,
    },

    #[error("capture {name} is not a number: `{value}`")]
    NonNumericCapture { name: char, value: String },

    #[error("capture M is not a recognisable month: `{0}`")]
    UnparseableMonth(String),

    #[error("resolved month {0} is outside 0..=12")]
    MonthOutOfRange(i64),

    #[error("title template: {0}")]
    Title(#[from] TitleError),
}

/// Errors raised while rendering a title template.
#[derive(Debug, Error)]
pub enum TitleError {
    #[error("unknown slot `{{{0}}}`")]
    UnknownSlot(String),

    #[error("unsupported format spec `{spec}` for slot `{{{slot}}}`")]
    BadSpec { slot: String, spec: String },

    #[error("unclosed slot starting at byte {0}")]
    UnclosedSlot(usize),

    #[error("unmatched `}}` at byte {0}")]
    UnmatchedBrace(usize),
}

/// The concrete metadata derived for one rule and one filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMetadata {
    pub volume: i64,
    pub index: i64,
    pub year: i64,
    pub month: Month,
    pub title: String,
}

/// Resolve a rule's metadata from the raw captures.
///
/// Each of volume/index/year/month takes its override formula's result when
/// the rule defines one, and the raw captured value otherwise; absent
/// captures default to 0 (the unspecified month). The year capture is
/// century-normalised and the month capture goes through the month parser
/// before either is bound into a formula.
pub fn resolve(rule: &MagazineRule, captures: &RawCaptures) -> Result<ResolvedMetadata, ResolveError> {
    let raw_volume = numeric_capture(captures.volume.as_deref(), 'V')?;
    let raw_index = numeric_capture(captures.index.as_deref(), 'I')?;
    let raw_year = match captures.year.as_deref() {
        Some(text) => expand_year(text).ok_or_else(|| ResolveError::NonNumericCapture {
            name: 'Y',
            value: text.to_string(),
        })?,
        None => 0,
    };
    let raw_month = match captures.month.as_deref() {
        Some(text) => Month::parse(text)
            .ok_or_else(|| ResolveError::UnparseableMonth(text.to_string()))?
            .number() as i64,
        None => 0,
    };

    let context = FormulaContext {
        volume: raw_volume,
        index: raw_index,
        year: raw_year,
        month: raw_month,
    };
    let volume = override_or(rule.volume_formula.as_deref(), "volume", raw_volume, &context)?;
    let index = override_or(rule.index_formula.as_deref(), "index", raw_index, &context)?;
    let year = override_or(rule.year_formula.as_deref(), "year", raw_year, &context)?;
    let month_number = override_or(rule.month_formula.as_deref(), "month", raw_month, &context)?;
    let month = Month::new(month_number).ok_or(ResolveError::MonthOutOfRange(month_number))?;

    let title = render_title(&rule.title, volume, index, year, month)?;
    Ok(ResolvedMetadata {
        volume,
        index,
        year,
        month,
        title,
    })
}

fn numeric_capture(capture: Option<&str>, name: char) -> Result<i64, ResolveError> {
    match capture {
        Some(text) => text.parse().map_err(|_| ResolveError::NonNumericCapture {
            name,
            value: text.to_string(),
        }),
        None => Ok(0),
    }
}

fn override_or(
    formula: Option<&str>,
    field: &'static str,
    raw: i64,
    context: &FormulaContext,
) -> Result<i64, ResolveError> {
    match formula {
        Some(formula) => {
            evaluate(formula, context).map_err(|source| ResolveError::Formula { field, source })
        }
        None => Ok(raw),
    }
}

enum SlotValue {
    Numeric { value: i64, default_width: usize },
    Month(Month),
}

/// Render a title template. Slots are `{volume}`, `{index}`, `{year}`,
/// `{month}` and `{next_month}`; `{index}` is zero-padded to two digits by
/// default, `0N`-style specs zero-pad any numeric slot, and `{month:s}` /
/// `{next_month:s}` render the English month name.
fn render_title(
    template: &str,
    volume: i64,
    index: i64,
    year: i64,
    month: Month,
) -> Result<String, TitleError> {
    let mut rendered = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    rendered.push('{');
                    continue;
                }
                let mut content = String::new();
                let mut closed = false;
                for (_, inner) in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    content.push(inner);
                }
                if !closed {
                    return Err(TitleError::UnclosedSlot(pos));
                }
                let (name, spec) = match content.split_once(':') {
                    Some((name, spec)) => (name, spec),
                    None => (content.as_str(), ""),
                };
                let value = match name {
                    "volume" => SlotValue::Numeric {
                        value: volume,
                        default_width: 0,
                    },
                    "index" => SlotValue::Numeric {
                        value: index,
                        default_width: 2,
                    },
                    "year" => SlotValue::Numeric {
                        value: year,
                        default_width: 0,
                    },
                    "month" => SlotValue::Month(month),
                    "next_month" => SlotValue::Month(month.next()),
                    _ => return Err(TitleError::UnknownSlot(name.to_string())),
                };
                rendered.push_str(&format_slot(name, &value, spec)?);
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    rendered.push('}');
                    continue;
                }
                return Err(TitleError::UnmatchedBrace(pos));
            }
            other => rendered.push(other),
        }
    }
    Ok(rendered)
}

fn format_slot(name: &str, value: &SlotValue, spec: &str) -> Result<String, TitleError> {
    match value {
        SlotValue::Numeric {
            value,
            default_width,
        } => format_numeric(name, *value, spec, *default_width),
        SlotValue::Month(month) => {
            if spec == "s" {
                Ok(month.name().to_string())
            } else {
                format_numeric(name, month.number() as i64, spec, 0)
            }
        }
    }
}

fn format_numeric(name: &str, value: i64, spec: &str, default_width: usize) -> Result<String, TitleError> {
    if spec.is_empty() {
        return Ok(format!("{:0width$}", value, width = default_width));
    }
    let digits = spec.strip_suffix('d').unwrap_or(spec);
    if digits.is_empty() {
        return Ok(value.to_string());
    }
    if digits.chars().all(|c| c.is_ascii_digit()) {
        let width: usize = digits.parse().map_err(|_| TitleError::BadSpec {
            slot: name.to_string(),
            spec: spec.to_string(),
        })?;
        Ok(format!("{:0width$}", value, width = width))
    } else {
        Err(TitleError::BadSpec {
            slot: name.to_string(),
            spec: spec.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(title: &str) -> MagazineRule {
        MagazineRule {
            name: "Test Mag".to_string(),
            pattern: "unused".to_string(),
            title: title.to_string(),
            authors: "Test Mag".to_string(),
            languages: "eng".to_string(),
            publisher: "Test Press".to_string(),
            tags: None,
            archive_dir: None,
            volume_formula: None,
            index_formula: None,
            year_formula: None,
            month_formula: None,
        }
    }

    fn captures(year: Option<&str>, month: Option<&str>) -> RawCaptures {
        RawCaptures {
            volume: None,
            index: None,
            year: year.map(String::from),
            month: month.map(String::from),
        }
    }

    #[test]
    fn year_month_capture_resolves_with_defaults() {
        let resolved = resolve(
            &rule("Test Mag {year}-{month}"),
            &captures(Some("2023"), Some("03")),
        )
        .expect("resolves");
        assert_eq!(resolved.volume, 0);
        assert_eq!(resolved.index, 0);
        assert_eq!(resolved.year, 2023);
        assert_eq!(resolved.month, Month::new(3).unwrap());
        assert_eq!(resolved.title, "Test Mag 2023-3");
    }

    #[test]
    fn resolution_is_pure() {
        let rule = rule("Test Mag {year}/{month:02}");
        let captures = captures(Some("99"), Some("December"));
        let first = resolve(&rule, &captures).expect("resolves");
        let second = resolve(&rule, &captures).expect("resolves");
        assert_eq!(first, second);
        assert_eq!(first.year, 1999);
        assert_eq!(first.title, "Test Mag 1999/12");
    }

    #[test]
    fn override_formulas_replace_raw_captures() {
        let mut rule = rule("Test Mag {volume}.{index}");
        rule.volume_formula = Some("Y - 2000".to_string());
        rule.index_formula = Some("M".to_string());
        let resolved = resolve(&rule, &captures(Some("2023"), Some("7"))).expect("resolves");
        assert_eq!(resolved.volume, 23);
        assert_eq!(resolved.index, 7);
        assert_eq!(resolved.title, "Test Mag 23.07");
    }

    #[test]
    fn formula_errors_are_surfaced() {
        let mut rule = rule("Test Mag {volume}");
        rule.volume_formula = Some("Q + 1".to_string());
        let error = resolve(&rule, &captures(None, None)).unwrap_err();
        assert!(matches!(
            error,
            ResolveError::Formula {
                field: "volume",
                source: FormulaError::UnknownName(_)
            }
        ));
    }

    #[test]
    fn non_numeric_captures_are_errors() {
        let bad = RawCaptures {
            volume: Some("three".to_string()),
            ..RawCaptures::default()
        };
        assert!(matches!(
            resolve(&rule("{volume}"), &bad),
            Err(ResolveError::NonNumericCapture { name: 'V', .. })
        ));
        assert!(matches!(
            resolve(&rule("{month}"), &captures(None, Some("wintertime"))),
            Err(ResolveError::UnparseableMonth(_))
        ));
    }

    #[test]
    fn resolved_month_must_stay_in_range() {
        let mut rule = rule("Test Mag {month}");
        rule.month_formula = Some("M + 13".to_string());
        let error = resolve(&rule, &captures(None, Some("3"))).unwrap_err();
        assert!(matches!(error, ResolveError::MonthOutOfRange(16)));
    }

    #[test]
    fn title_month_names_and_next_month() {
        let resolved = resolve(
            &rule("{month:s} to {next_month:s} {year}"),
            &captures(Some("2023"), Some("Dec")),
        )
        .expect("resolves");
        // next_month wraps into January without touching the year
        assert_eq!(resolved.title, "December to January 2023");
    }

    #[test]
    fn title_of_unspecified_month_renders_empty_name() {
        let resolved =
            resolve(&rule("{year} {month:s}"), &captures(Some("2023"), None)).expect("resolves");
        assert_eq!(resolved.title, "2023 ");
        assert!(resolved.month.is_unspecified());
    }

    #[test]
    fn title_numeric_specs() {
        let resolved = resolve(
            &rule("{volume:03}/{index:d}/{month:02d}"),
            &RawCaptures {
                volume: Some("7".to_string()),
                index: Some("4".to_string()),
                month: Some("9".to_string()),
                year: None,
            },
        )
        .expect("resolves");
        assert_eq!(resolved.title, "007/4/09");
    }

    #[test]
    fn title_unknown_slot_is_an_error() {
        let error = resolve(&rule("{series} {volume}"), &captures(None, None)).unwrap_err();
        assert!(matches!(
            error,
            ResolveError::Title(TitleError::UnknownSlot(slot)) if slot == "series"
        ));
    }

    #[test]
    fn title_escaped_braces() {
        let resolved = resolve(&rule("{{{volume}}}"), &captures(None, None)).expect("resolves");
        assert_eq!(resolved.title, "{0}");
    }
}
