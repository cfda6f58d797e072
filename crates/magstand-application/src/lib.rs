// SPDX-License-Identifier: GPL-3.0-or-later
pub mod calibre;
pub mod engine;
pub mod formula;
pub mod importer;
pub mod pattern;
pub mod resolver;

pub use calibre::{BookId, CalibreDb, CalibreError};
pub use engine::{EngineError, MatchEngine, MatchFailure, MatchOutcome};
pub use formula::{evaluate, FormulaContext, FormulaError};
pub use importer::{
    scan_inbox, FileOutcome, FileReport, ImportError, ImportService, InboxError, IssueReport,
};
pub use pattern::{CaptureName, FilenamePattern, PatternError, RawCaptures};
pub use resolver::{resolve, ResolveError, ResolvedMetadata, TitleError};
