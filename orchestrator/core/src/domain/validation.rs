// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Validation Report
//!
//! The validator never stops at the first problem. Every failed check
//! becomes a [`ValidationFailure`] in one [`ValidationReport`], so an
//! operator sees the complete picture from a single container start.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Whether a failure is about a synthesized document or about the runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Document,
    Environment,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("required directory {0:?} does not exist")]
    MissingDirectory(PathBuf),

    #[error("{0:?} exists but is not a directory")]
    NotADirectory(PathBuf),

    #[error("directory {path:?} is not writable by '{user}' (uid {uid})")]
    DirectoryNotWritable { path: PathBuf, user: String, uid: u32 },

    #[error("document {path:?} is not readable by '{user}' (uid {uid})")]
    DocumentNotReadable { path: PathBuf, user: String, uid: u32 },

    #[error("cannot inspect {path:?}: {reason}")]
    Inaccessible { path: PathBuf, reason: String },

    #[error("document {path:?} is not well-formed: {reason}")]
    MalformedDocument { path: PathBuf, reason: String },

    #[error("document {path:?} does not match the synthesized content")]
    DocumentMismatch { path: PathBuf },
}

impl ValidationFailure {
    pub fn class(&self) -> FailureClass {
        match self {
            Self::MalformedDocument { .. } | Self::DocumentMismatch { .. } => FailureClass::Document,
            Self::MissingDirectory(_)
            | Self::NotADirectory(_)
            | Self::DirectoryNotWritable { .. }
            | Self::DocumentNotReadable { .. }
            | Self::Inaccessible { .. } => FailureClass::Environment,
        }
    }

    /// Path the failed check was about
    pub fn path(&self) -> &Path {
        match self {
            Self::MissingDirectory(path) | Self::NotADirectory(path) => path,
            Self::DirectoryNotWritable { path, .. }
            | Self::DocumentNotReadable { path, .. }
            | Self::Inaccessible { path, .. }
            | Self::MalformedDocument { path, .. }
            | Self::DocumentMismatch { path } => path,
        }
    }
}

/// All failed checks of one validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    failures: Vec<ValidationFailure>,
}

impl ValidationReport {
    pub fn push(&mut self, failure: ValidationFailure) {
        self.failures.push(failure);
    }

    pub fn failures(&self) -> &[ValidationFailure] {
        &self.failures
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// `Ok(())` when no check failed
    pub fn into_result(self) -> Result<(), ValidationReport> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed with {} problem(s)", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  - {}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_lists_every_failure() {
        let mut report = ValidationReport::default();
        report.push(ValidationFailure::MissingDirectory(PathBuf::from("/data/logs")));
        report.push(ValidationFailure::MalformedDocument {
            path: PathBuf::from("/data/home/.openclaw/openclaw.json"),
            reason: "EOF while parsing".to_string(),
        });

        let rendered = report.to_string();
        assert!(rendered.contains("2 problem(s)"));
        assert!(rendered.contains("/data/logs"));
        assert!(rendered.contains("openclaw.json"));

        let classes: Vec<_> = report.failures().iter().map(|f| f.class()).collect();
        assert_eq!(classes, vec![FailureClass::Environment, FailureClass::Document]);
        assert!(report.into_result().is_err());
    }

    #[test]
    fn test_empty_report_is_ok() {
        assert!(ValidationReport::default().into_result().is_ok());
    }
}
