// SPDX-License-Identifier: GPL-3.0-or-later

//! Matching a filename against every configured magazine.
//!
//! Patterns are compiled once at engine construction; a bad template is a
//! configuration error and aborts startup. Matching itself never fails: a
//! rule either matches and resolves into a [`MatchedIssue`], matches but
//! fails to resolve (recorded as a [`MatchFailure`]), or contributes
//! nothing. Zero matches is a normal outcome.

use std::path::Path;

use magstand_domain::{archive_file_name, MagazineRule, MatchedIssue};
use thiserror::Error;
use tracing::{debug, warn};

use crate::pattern::{FilenamePattern, PatternError};
use crate::resolver::{resolve, ResolveError, ResolvedMetadata};

/// Errors raised while building the engine from the configured rules.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("magazine `{magazine}` has an invalid pattern: {source}")]
    Pattern {
        magazine: String,
        #[source]
        source: PatternError,
    },
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: MagazineRule,
    pattern: FilenamePattern,
}

/// A rule that matched a filename but whose metadata could not be resolved.
#[derive(Debug)]
pub struct MatchFailure {
    pub magazine: String,
    pub error: ResolveError,
}

/// Everything one filename matched: issues in configuration order, plus the
/// rules whose resolution failed.
#[derive(Debug, Default)]
pub struct MatchOutcome {
    pub issues: Vec<MatchedIssue>,
    pub failures: Vec<MatchFailure>,
}

impl MatchOutcome {
    /// True when no configured magazine matched at all.
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty() && self.failures.is_empty()
    }
}

/// Applies every configured magazine's pattern to candidate filenames.
#[derive(Debug)]
pub struct MatchEngine {
    rules: Vec<CompiledRule>,
}

impl MatchEngine {
    /// Compile every rule's pattern. The first invalid template aborts with
    /// the offending magazine's name.
    pub fn new(rules: Vec<MagazineRule>) -> Result<Self, EngineError> {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let pattern =
                    FilenamePattern::compile(&rule.pattern).map_err(|source| EngineError::Pattern {
                        magazine: rule.name.clone(),
                        source,
                    })?;
                Ok(CompiledRule { rule, pattern })
            })
            .collect::<Result<Vec<_>, EngineError>>()?;
        Ok(Self { rules })
    }

    /// Match a filename against all rules, in configuration order. A
    /// resolution failure for one rule is recorded and reported without
    /// preventing sibling rules from matching.
    pub fn match_filename(&self, filename: &str) -> MatchOutcome {
        let mut outcome = MatchOutcome::default();
        for compiled in &self.rules {
            let Some(captures) = compiled.pattern.matches(filename) else {
                continue;
            };
            debug!(
                target: "engine",
                magazine = %compiled.rule.name,
                filename,
                "pattern matched"
            );
            match resolve(&compiled.rule, &captures) {
                Ok(resolved) => outcome.issues.push(build_issue(&compiled.rule, filename, &resolved)),
                Err(error) => {
                    warn!(
                        target: "engine",
                        magazine = %compiled.rule.name,
                        filename,
                        error = %error,
                        "matched but metadata resolution failed"
                    );
                    outcome.failures.push(MatchFailure {
                        magazine: compiled.rule.name.clone(),
                        error,
                    });
                }
            }
        }
        outcome
    }
}

fn build_issue(rule: &MagazineRule, filename: &str, resolved: &ResolvedMetadata) -> MatchedIssue {
    MatchedIssue {
        filename: filename.to_string(),
        series: rule.name.clone(),
        number: format!("{}.{:02}", resolved.volume, resolved.index),
        title: resolved.title.clone(),
        authors: rule.authors.clone(),
        languages: rule.languages.clone(),
        publisher: rule.publisher.clone(),
        tags: rule.tags.clone(),
        archive_dir: rule.archive_dir.clone(),
        archive_filename: archive_file_name(&resolved.title, Path::new(filename)),
    }
}
