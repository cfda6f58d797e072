// SPDX-License-Identifier: GPL-3.0-or-later

//! Filename pattern templates.
//!
//! A pattern is a literal string interleaved with the placeholders `{V}`
//! (volume), `{I}` (index), `{Y}` (year) and `{M}` (month), for example
//! `Magazine-V{V}I{I}.pdf`. Compiling splits the template into alternating
//! literal and capture segments; matching assigns the text between literals
//! to the enclosed placeholders. A match is total: either the whole filename
//! is consumed consistently or there is no match at all.

use thiserror::Error;

/// Errors raised while compiling a pattern template.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("unclosed placeholder starting at byte {0}")]
    UnclosedPlaceholder(usize),

    #[error("unknown placeholder `{{{0}}}` (expected one of V, I, Y, M)")]
    UnknownPlaceholder(String),

    #[error("placeholder `{{{0}}}` appears more than once")]
    DuplicatePlaceholder(char),

    #[error("unmatched `}}` at byte {0}")]
    UnmatchedBrace(usize),
}

/// The four capture names a pattern may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureName {
    Volume,
    Index,
    Year,
    Month,
}

impl CaptureName {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "V" => Some(Self::Volume),
            "I" => Some(Self::Index),
            "Y" => Some(Self::Year),
            "M" => Some(Self::Month),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::Volume => 'V',
            Self::Index => 'I',
            Self::Year => 'Y',
            Self::Month => 'M',
        }
    }

    /// Candidate capture widths (in characters) when this placeholder is
    /// directly followed by another placeholder, so no literal delimits the
    /// two. Years prefer their 4-digit form, months their 2-digit form;
    /// volume and index take the shortest span that lets the rest match.
    fn adjacent_widths(self, available: usize) -> Vec<usize> {
        let preferred: &[usize] = match self {
            Self::Year => &[4, 2],
            Self::Month => &[2, 1],
            Self::Volume | Self::Index => return (1..=available).collect(),
        };
        preferred.iter().copied().filter(|w| *w <= available).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Capture(CaptureName),
}

/// Raw strings captured from a filename, present only for the placeholders
/// that appear in the pattern. Captured strings are never empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCaptures {
    pub volume: Option<String>,
    pub index: Option<String>,
    pub year: Option<String>,
    pub month: Option<String>,
}

impl RawCaptures {
    fn set(&mut self, name: CaptureName, value: String) {
        match name {
            CaptureName::Volume => self.volume = Some(value),
            CaptureName::Index => self.index = Some(value),
            CaptureName::Year => self.year = Some(value),
            CaptureName::Month => self.month = Some(value),
        }
    }

    pub fn get(&self, name: CaptureName) -> Option<&str> {
        match name {
            CaptureName::Volume => self.volume.as_deref(),
            CaptureName::Index => self.index.as_deref(),
            CaptureName::Year => self.year.as_deref(),
            CaptureName::Month => self.month.as_deref(),
        }
    }
}

/// A compiled filename pattern.
#[derive(Debug, Clone)]
pub struct FilenamePattern {
    segments: Vec<Segment>,
}

impl FilenamePattern {
    /// Compile a template into a pattern. `{{` and `}}` escape literal
    /// braces; each placeholder may appear at most once.
    pub fn compile(template: &str) -> Result<Self, PatternError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut seen: Vec<CaptureName> = Vec::new();
        let mut chars = template.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' => {
                    if matches!(chars.peek(), Some((_, '{'))) {
                        chars.next();
                        literal.push('{');
                        continue;
                    }
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, inner) in chars.by_ref() {
                        if inner == '}' {
                            closed = true;
                            break;
                        }
                        name.push(inner);
                    }
                    if !closed {
                        return Err(PatternError::UnclosedPlaceholder(pos));
                    }
                    let capture = CaptureName::from_name(&name)
                        .ok_or(PatternError::UnknownPlaceholder(name))?;
                    if seen.contains(&capture) {
                        return Err(PatternError::DuplicatePlaceholder(capture.as_char()));
                    }
                    seen.push(capture);
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Capture(capture));
                }
                '}' => {
                    if matches!(chars.peek(), Some((_, '}'))) {
                        chars.next();
                        literal.push('}');
                        continue;
                    }
                    return Err(PatternError::UnmatchedBrace(pos));
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }

    /// Match a filename against the pattern. Returns the captured strings,
    /// or `None` when the filename is not structurally consistent with the
    /// template. There are no partial matches.
    pub fn matches(&self, filename: &str) -> Option<RawCaptures> {
        let mut captures = RawCaptures::default();
        if match_segments(&self.segments, filename, &mut captures) {
            Some(captures)
        } else {
            None
        }
    }
}

fn match_segments(segments: &[Segment], input: &str, captures: &mut RawCaptures) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return input.is_empty();
    };
    match first {
        Segment::Literal(literal) => match input.strip_prefix(literal.as_str()) {
            Some(remainder) => match_segments(rest, remainder, captures),
            None => false,
        },
        Segment::Capture(name) => match rest.first() {
            // Trailing placeholder: the rest of the filename is the capture.
            None => {
                if input.is_empty() {
                    return false;
                }
                captures.set(*name, input.to_string());
                true
            }
            // Delimited placeholder: try the non-empty span up to each
            // occurrence of the next literal, nearest first.
            Some(Segment::Literal(literal)) => {
                let mut from = 0;
                while let Some(found) = input[from..].find(literal.as_str()) {
                    let index = from + found;
                    if index > 0 {
                        captures.set(*name, input[..index].to_string());
                        if match_segments(rest, &input[index..], captures) {
                            return true;
                        }
                    }
                    from = index
                        + input[index..].chars().next().map_or(1, |c| c.len_utf8());
                }
                false
            }
            // Adjacent placeholders: no delimiting literal, so try the
            // kind-preferred widths for the left one.
            Some(Segment::Capture(_)) => {
                for width in name.adjacent_widths(input.chars().count()) {
                    let Some(split) = byte_offset(input, width) else {
                        continue;
                    };
                    captures.set(*name, input[..split].to_string());
                    if match_segments(rest, &input[split..], captures) {
                        return true;
                    }
                }
                false
            }
        },
    }
}

/// Byte offset just after the first `chars` characters of `input`.
fn byte_offset(input: &str, chars: usize) -> Option<usize> {
    if chars == 0 {
        return Some(0);
    }
    input
        .char_indices()
        .nth(chars - 1)
        .map(|(index, c)| index + c.len_utf8())
}
