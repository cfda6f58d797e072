// SPDX-License-Identifier: GPL-3.0-or-later

//! The external `calibredb` client.
//!
//! Issues are imported by driving the `calibredb` executable: `add` creates
//! the catalog entry and prints the assigned book id, `set_metadata` fills
//! in the publisher (which `add` cannot set). Each invocation blocks until
//! the subprocess exits; there is no timeout.

use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use magstand_domain::MatchedIssue;
use regex::Regex;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

lazy_static! {
    // The only output a successful single-file `add` produces.
    static ref ADDED_IDS_REGEX: Regex =
        Regex::new(r"^Added book ids: (?P<id>\d+)\n?$").expect("added-ids regex is valid");
}

/// The identifier `calibredb add` assigns to an imported issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BookId(pub u64);

impl std::fmt::Display for BookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors raised by `calibredb` invocations.
#[derive(Debug, Error)]
pub enum CalibreError {
    #[error("failed to run `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`calibredb add` failed for {file}: {detail}")]
    AddFailed { file: String, detail: String },

    #[error("`calibredb set_metadata` failed for book {book_id}: {detail}")]
    SetMetadataFailed { book_id: BookId, detail: String },
}

/// Client for one calibre library, driven through the `calibredb` tool.
pub struct CalibreDb {
    executable: PathBuf,
    library_path: Option<PathBuf>,
}

impl CalibreDb {
    pub fn new(executable: impl Into<PathBuf>, library_path: Option<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            library_path,
        }
    }

    fn command(&self, subcommand: &str) -> Command {
        let mut command = Command::new(&self.executable);
        command.arg(subcommand);
        if let Some(library) = &self.library_path {
            command.arg("--library-path").arg(library);
        }
        command
    }

    /// Add an issue's file to the library with its resolved metadata.
    ///
    /// Success is recognised by stdout being exactly
    /// `Added book ids: <digits>` with an empty stderr; anything else is a
    /// failure, reported with the raw output so the run can be diagnosed.
    pub async fn add(&self, issue: &MatchedIssue, file: &Path) -> Result<BookId, CalibreError> {
        let mut command = self.command("add");
        command
            .arg("--authors")
            .arg(&issue.authors)
            .arg("--languages")
            .arg(&issue.languages)
            .arg("--series")
            .arg(&issue.series)
            .arg("--series-index")
            .arg(&issue.number);
        if let Some(tags) = &issue.tags {
            command.arg("--tags").arg(tags);
        }
        command.arg("--title").arg(&issue.title).arg(file);

        debug!(
            target: "calibre",
            file = %file.display(),
            title = %issue.title,
            "running calibredb add"
        );
        let output = command.output().await.map_err(|source| CalibreError::Launch {
            command: self.executable.display().to_string(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            return Err(CalibreError::AddFailed {
                file: file.display().to_string(),
                detail: stderr.trim_end().to_string(),
            });
        }
        let id_match = ADDED_IDS_REGEX
            .captures(&stdout)
            .and_then(|captures| captures.name("id"))
            .and_then(|id| id.as_str().parse().ok());
        match id_match {
            Some(id) => Ok(BookId(id)),
            None => Err(CalibreError::AddFailed {
                file: file.display().to_string(),
                detail: format!("unexpected output: {:?}", stdout),
            }),
        }
    }

    /// Set a book's publisher. Success is a zero exit status.
    pub async fn set_publisher(&self, book_id: BookId, publisher: &str) -> Result<(), CalibreError> {
        let mut command = self.command("set_metadata");
        command
            .arg(format!("-fpublisher:{}", publisher))
            .arg(book_id.to_string());

        debug!(target: "calibre", %book_id, publisher, "running calibredb set_metadata");
        let output = command.output().await.map_err(|source| CalibreError::Launch {
            command: self.executable.display().to_string(),
            source,
        })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = if stderr.is_empty() {
                output.status.to_string()
            } else {
                stderr.trim_end().to_string()
            };
            Err(CalibreError::SetMetadataFailed { book_id, detail })
        }
    }
}
