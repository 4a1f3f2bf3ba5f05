// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Validator
//!
//! Last gate before the privilege drop. Checks run against the target
//! identity's permissions, computed from mode bits, so the outcome does not
//! depend on the orchestrator still running as root.
//!
//! Every failing check is recorded; the report is returned as a whole.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::domain::document::{WriteDisposition, WrittenDocument};
use crate::domain::validation::{ValidationFailure, ValidationReport};
use crate::infrastructure::identity::TargetIdentity;

#[derive(Debug, Default, Clone, Copy)]
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(
        &self,
        documents: &[WrittenDocument],
        directories: &[PathBuf],
        identity: &TargetIdentity,
    ) -> Result<(), ValidationReport> {
        let mut report = ValidationReport::default();

        for dir in directories {
            self.check_directory(dir, identity, &mut report);
        }
        for written in documents {
            self.check_document(written, identity, &mut report);
        }

        for failure in report.failures() {
            warn!(path = ?failure.path(), "Validation failed: {}", failure);
        }
        debug!(
            directories = directories.len(),
            documents = documents.len(),
            failures = report.failures().len(),
            "Validation finished"
        );
        report.into_result()
    }

    fn check_directory(&self, dir: &Path, identity: &TargetIdentity, report: &mut ValidationReport) {
        let metadata = match fs::metadata(dir) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                report.push(ValidationFailure::MissingDirectory(dir.to_path_buf()));
                return;
            }
            Err(e) => {
                report.push(ValidationFailure::Inaccessible {
                    path: dir.to_path_buf(),
                    reason: e.to_string(),
                });
                return;
            }
        };

        if !metadata.is_dir() {
            report.push(ValidationFailure::NotADirectory(dir.to_path_buf()));
        } else if !identity.can_write_directory(&metadata) {
            report.push(ValidationFailure::DirectoryNotWritable {
                path: dir.to_path_buf(),
                user: identity.user.clone(),
                uid: identity.uid,
            });
        }
    }

    fn check_document(&self, written: &WrittenDocument, identity: &TargetIdentity, report: &mut ValidationReport) {
        let path = written.document.destination().to_path_buf();

        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) => {
                report.push(ValidationFailure::Inaccessible {
                    path,
                    reason: e.to_string(),
                });
                return;
            }
        };
        if !identity.can_read(&metadata) {
            report.push(ValidationFailure::DocumentNotReadable {
                path: path.clone(),
                user: identity.user.clone(),
                uid: identity.uid,
            });
        }

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                report.push(ValidationFailure::Inaccessible {
                    path,
                    reason: e.to_string(),
                });
                return;
            }
        };
        let parsed: Value = match serde_json::from_str(&contents) {
            Ok(parsed) => parsed,
            Err(e) => {
                report.push(ValidationFailure::MalformedDocument {
                    path,
                    reason: e.to_string(),
                });
                return;
            }
        };

        match written.disposition {
            WriteDisposition::Written => {
                if parsed != written.document.to_value() {
                    report.push(ValidationFailure::DocumentMismatch { path });
                }
            }
            WriteDisposition::Preserved => {
                if !parsed.is_object() {
                    report.push(ValidationFailure::MalformedDocument {
                        path,
                        reason: "top level is not an object".to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::synthesizer::DocumentSynthesizer;
    use crate::domain::bootstrap_config::WritePolicy;
    use crate::domain::document::{DocumentSpec, Slot};
    use crate::domain::setting::ResolvedSettings;
    use crate::domain::validation::FailureClass;
    use std::fs::Permissions;
    use std::os::unix::fs::PermissionsExt;

    fn write_document(path: &Path) -> WrittenDocument {
        let spec = DocumentSpec::new("openclaw", path)
            .slot(Slot::fixed("gateway.mode", "local"))
            .slot(Slot::fixed("gateway.port", 18789));
        let synthesizer = DocumentSynthesizer::new();
        let document = synthesizer.synthesize(&ResolvedSettings::new(), &spec).unwrap();
        synthesizer.write(document, WritePolicy::Regenerate).unwrap()
    }

    fn stranger() -> TargetIdentity {
        TargetIdentity {
            user: "openclaw".to_string(),
            uid: 65534,
            gid: 65534,
            groups: vec![65534],
        }
    }

    #[test]
    fn test_valid_layout_passes() {
        let root = tempfile::tempdir().unwrap();
        let state = root.path().join("state");
        fs::create_dir(&state).unwrap();
        let written = write_document(&state.join("openclaw.json"));

        let identity = TargetIdentity::current().unwrap();
        Validator::new()
            .validate(&[written], &[state], &identity)
            .unwrap();
    }

    #[test]
    fn test_collects_every_failure() {
        let root = tempfile::tempdir().unwrap();
        let present = root.path().join("present");
        fs::create_dir(&present).unwrap();
        fs::set_permissions(&present, Permissions::from_mode(0o755)).unwrap();
        let not_a_dir = root.path().join("file");
        fs::write(&not_a_dir, "x").unwrap();
        let missing = root.path().join("missing");

        let report = Validator::new()
            .validate(&[], &[present.clone(), not_a_dir.clone(), missing.clone()], &stranger())
            .unwrap_err();

        assert_eq!(
            report.failures(),
            &[
                ValidationFailure::DirectoryNotWritable {
                    path: present,
                    user: "openclaw".to_string(),
                    uid: 65534,
                },
                ValidationFailure::NotADirectory(not_a_dir),
                ValidationFailure::MissingDirectory(missing),
            ]
        );
        assert!(report
            .failures()
            .iter()
            .all(|failure| failure.class() == FailureClass::Environment));
    }

    #[test]
    fn test_tampered_document_is_a_mismatch() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("openclaw.json");
        let written = write_document(&path);
        fs::write(&path, "{\"gateway\": {\"mode\": \"remote\"}}").unwrap();

        let identity = TargetIdentity::current().unwrap();
        let report = Validator::new().validate(&[written], &[], &identity).unwrap_err();
        assert_eq!(report.failures(), &[ValidationFailure::DocumentMismatch { path }]);
    }

    #[test]
    fn test_malformed_document_is_reported() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("openclaw.json");
        let written = write_document(&path);
        fs::write(&path, "{\"gateway\": ").unwrap();

        let identity = TargetIdentity::current().unwrap();
        let report = Validator::new().validate(&[written], &[], &identity).unwrap_err();
        assert!(matches!(
            report.failures(),
            [ValidationFailure::MalformedDocument { .. }]
        ));
        assert_eq!(report.failures()[0].class(), FailureClass::Document);
    }

    #[test]
    fn test_preserved_document_only_needs_to_parse() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("openclaw.json");
        let mut written = write_document(&path);
        fs::write(&path, "{\"hand\": \"edited\"}").unwrap();
        written.disposition = WriteDisposition::Preserved;

        let identity = TargetIdentity::current().unwrap();
        Validator::new().validate(&[written.clone()], &[], &identity).unwrap();

        fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(Validator::new().validate(&[written], &[], &identity).is_err());
    }

    #[test]
    fn test_private_document_unreadable_by_other_identity() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("openclaw.json");
        let written = write_document(&path);

        let report = Validator::new().validate(&[written], &[], &stranger()).unwrap_err();
        assert!(report.failures().iter().any(|failure| matches!(
            failure,
            ValidationFailure::DocumentNotReadable { uid: 65534, .. }
        )));
    }
}
