// SPDX-License-Identifier: GPL-3.0-or-later

//! The per-file import workflow.
//!
//! Every inbox file runs through a small state machine: no matches leaves
//! the file untouched; otherwise each matched issue is imported in order
//! (catalog add, set publisher, archive copy), failures are isolated to the
//! issue that raised them, and the source file is removed only when every
//! issue succeeded. Failed files stay in the inbox so a later run can retry
//! them; the already-succeeded issues of such a file are re-attempted on
//! that run.

use std::fs;
use std::path::{Path, PathBuf};

use magstand_domain::MatchedIssue;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::calibre::{BookId, CalibreDb, CalibreError};
use crate::engine::MatchOutcome;

/// A single issue's import failure.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Calibre(#[from] CalibreError),

    #[error("failed to archive {file} to {destination}: {source}")]
    Archive {
        file: String,
        destination: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while listing the inbox.
#[derive(Debug, Error)]
pub enum InboxError {
    #[error("failed to read inbox {dir}: {source}")]
    Scan {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Terminal state of one inbox file's workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// No configured magazine matched; the file stays untouched.
    Skipped,
    /// Every matched issue imported and the source file was removed.
    AllSucceeded,
    /// At least one matched issue failed; the file stays for a later run.
    PartiallyFailed,
}

/// What happened to one matched issue.
#[derive(Debug)]
pub struct IssueReport {
    pub magazine: String,
    pub title: String,
    pub result: Result<BookId, ImportError>,
}

/// What happened to one inbox file.
#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: FileOutcome,
    pub issues: Vec<IssueReport>,
}

/// Runs the import workflow against one calibre library.
pub struct ImportService {
    catalog: CalibreDb,
}

impl ImportService {
    pub fn new(catalog: CalibreDb) -> Self {
        Self { catalog }
    }

    /// Process one inbox file and everything it matched. Issues are
    /// imported strictly in match order; nothing here retries or rolls
    /// back — a failed issue is reported and its siblings continue.
    pub async fn process_file(&self, path: &Path, matches: &MatchOutcome) -> FileReport {
        if matches.is_empty() {
            debug!(
                target: "importer",
                file = %path.display(),
                "no matching magazine, leaving file alone"
            );
            return FileReport {
                path: path.to_path_buf(),
                outcome: FileOutcome::Skipped,
                issues: Vec::new(),
            };
        }

        let mut issues = Vec::new();
        let mut failed = matches.failures.len();
        for issue in &matches.issues {
            let result = self.import_issue(path, issue).await;
            match &result {
                Ok(book_id) => {
                    info!(
                        target: "importer",
                        file = %path.display(),
                        magazine = %issue.series,
                        title = %issue.title,
                        book_id = %book_id,
                        "issue imported"
                    );
                }
                Err(import_error) => {
                    failed += 1;
                    warn!(
                        target: "importer",
                        file = %path.display(),
                        magazine = %issue.series,
                        title = %issue.title,
                        error = %import_error,
                        "issue import failed"
                    );
                }
            }
            issues.push(IssueReport {
                magazine: issue.series.clone(),
                title: issue.title.clone(),
                result,
            });
        }

        let outcome = if failed == 0 {
            match fs::remove_file(path) {
                Ok(()) => {
                    debug!(target: "importer", file = %path.display(), "source file removed from inbox")
                }
                Err(remove_error) => {
                    error!(
                        target: "importer",
                        file = %path.display(),
                        error = %remove_error,
                        "failed to remove imported file; it will be re-imported on the next run"
                    );
                }
            }
            FileOutcome::AllSucceeded
        } else {
            FileOutcome::PartiallyFailed
        };

        FileReport {
            path: path.to_path_buf(),
            outcome,
            issues,
        }
    }

    async fn import_issue(&self, path: &Path, issue: &MatchedIssue) -> Result<BookId, ImportError> {
        let book_id = self.catalog.add(issue, path).await?;
        self.catalog.set_publisher(book_id, &issue.publisher).await?;
        if let Some(archive_dir) = &issue.archive_dir {
            let destination = archive_dir.join(&issue.archive_filename);
            fs::copy(path, &destination).map_err(|source| ImportError::Archive {
                file: issue.filename.clone(),
                destination: destination.clone(),
                source,
            })?;
            debug!(
                target: "importer",
                file = %issue.filename,
                destination = %destination.display(),
                "issue archived"
            );
        }
        Ok(book_id)
    }
}

/// List the inbox's regular files in sorted order.
pub fn scan_inbox(dir: &Path) -> Result<Vec<PathBuf>, InboxError> {
    let scan_error = |source| InboxError::Scan {
        dir: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(scan_error)? {
        let entry = entry.map_err(scan_error)?;
        if entry.file_type().map_err(scan_error)?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MatchEngine;
    use magstand_domain::MagazineRule;

    fn rule(name: &str) -> MagazineRule {
        MagazineRule {
            name: name.to_string(),
            pattern: "issue{I}.pdf".to_string(),
            title: format!("{} {{index}}", name),
            authors: name.to_string(),
            languages: "eng".to_string(),
            publisher: format!("{} Press", name),
            tags: None,
            archive_dir: None,
            volume_formula: None,
            index_formula: None,
            year_formula: None,
            month_formula: None,
        }
    }

    #[test]
    fn scan_inbox_lists_only_files_sorted() {
        let inbox = tempfile::tempdir().expect("tempdir");
        fs::write(inbox.path().join("b.pdf"), b"b").unwrap();
        fs::write(inbox.path().join("a.pdf"), b"a").unwrap();
        fs::create_dir(inbox.path().join("subdir")).unwrap();

        let files = scan_inbox(inbox.path()).expect("scan");
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.pdf", "b.pdf"]);
    }

    #[test]
    fn scan_inbox_missing_dir_is_an_error() {
        let error = scan_inbox(Path::new("/nonexistent/inbox")).unwrap_err();
        assert!(matches!(error, InboxError::Scan { .. }));
    }

    #[tokio::test]
    async fn skipped_file_is_left_untouched() {
        let inbox = tempfile::tempdir().expect("tempdir");
        let file = inbox.path().join("notes.txt");
        fs::write(&file, b"not a magazine").unwrap();

        let service = ImportService::new(CalibreDb::new("/nonexistent/calibredb", None));
        let report = service.process_file(&file, &MatchOutcome::default()).await;

        assert_eq!(report.outcome, FileOutcome::Skipped);
        assert!(report.issues.is_empty());
        assert!(file.exists());
    }

    #[tokio::test]
    async fn failing_catalog_keeps_the_source_file() {
        let inbox = tempfile::tempdir().expect("tempdir");
        let file = inbox.path().join("issue7.pdf");
        fs::write(&file, b"pdf").unwrap();

        let engine = MatchEngine::new(vec![rule("Weekly")]).expect("engine builds");
        let matches = engine.match_filename("issue7.pdf");
        assert_eq!(matches.issues.len(), 1);

        // the executable does not exist, so the add step fails to launch
        let service = ImportService::new(CalibreDb::new("/nonexistent/calibredb", None));
        let report = service.process_file(&file, &matches).await;

        assert_eq!(report.outcome, FileOutcome::PartiallyFailed);
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].result.is_err());
        assert!(file.exists());
    }

    #[tokio::test]
    async fn resolution_failure_alone_marks_the_file_failed() {
        let inbox = tempfile::tempdir().expect("tempdir");
        let file = inbox.path().join("issue7.pdf");
        fs::write(&file, b"pdf").unwrap();

        let mut broken = rule("Broken");
        broken.index_formula = Some("undefined_name".to_string());
        let engine = MatchEngine::new(vec![broken]).expect("engine builds");
        let matches = engine.match_filename("issue7.pdf");
        assert!(matches.issues.is_empty());
        assert_eq!(matches.failures.len(), 1);

        let service = ImportService::new(CalibreDb::new("/nonexistent/calibredb", None));
        let report = service.process_file(&file, &matches).await;

        assert_eq!(report.outcome, FileOutcome::PartiallyFailed);
        assert!(file.exists());
    }
}
