// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Document Synthesizer
//!
//! Builds [`GeneratedConfigDocument`]s from resolved settings and writes them
//! atomically.
//!
//! - Slots whose setting did not resolve are left out of the document.
//! - A section appears only when every mandatory slot resolved.
//! - Writes go to a sibling temp file which is synced and then renamed over
//!   the destination, so a reader never observes a half-written document.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Phase 3 of the bootstrap sequence

use serde_json::{Map, Value};
use std::fs::{self, OpenOptions, Permissions};
use std::io::{self, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::Path;
use tracing::{debug, info};

use crate::domain::bootstrap_config::WritePolicy;
use crate::domain::document::{
    insert_path, DocumentSpec, GeneratedConfigDocument, Slot, SlotSource, WriteDisposition,
    WrittenDocument,
};
use crate::domain::outcome::EnvironmentError;
use crate::domain::setting::ResolvedSettings;

const DOCUMENT_MODE: u32 = 0o600;

#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentSynthesizer;

impl DocumentSynthesizer {
    pub fn new() -> Self {
        Self
    }

    /// Build a document. `None` only for specs marked `only_when_configured`
    /// that ended up with no content.
    pub fn synthesize(
        &self,
        settings: &ResolvedSettings,
        spec: &DocumentSpec,
    ) -> Option<GeneratedConfigDocument> {
        let mut root = Map::new();

        for slot in &spec.slots {
            if let Some(value) = slot_value(settings, slot) {
                insert_path(&mut root, &slot.path, value);
            }
        }

        for section in &spec.sections {
            let mandatory: Option<Vec<(&str, Value)>> = section
                .mandatory
                .iter()
                .map(|slot| slot_value(settings, slot).map(|value| (slot.path.as_str(), value)))
                .collect();

            let Some(mandatory) = mandatory else {
                info!(
                    document = %spec.name,
                    section = %section.path,
                    "Section incomplete, omitting it"
                );
                continue;
            };

            let mut block = Map::new();
            for (path, value) in mandatory {
                insert_path(&mut block, path, value);
            }
            for slot in &section.optional {
                if let Some(value) = slot_value(settings, slot) {
                    insert_path(&mut block, &slot.path, value);
                }
            }
            insert_path(&mut root, &section.path, Value::Object(block));
        }

        if root.is_empty() && !spec.emit_when_empty {
            debug!(document = %spec.name, "Nothing configured, document not produced");
            return None;
        }

        Some(GeneratedConfigDocument::new(
            spec.name.clone(),
            spec.destination.clone(),
            root,
        ))
    }

    /// Persist `document` at its destination according to `policy`
    pub fn write(
        &self,
        document: GeneratedConfigDocument,
        policy: WritePolicy,
    ) -> Result<WrittenDocument, EnvironmentError> {
        let destination = document.destination().to_path_buf();

        if policy == WritePolicy::Preserve && destination.exists() {
            info!(document = %document.name(), path = ?destination, "Keeping existing document");
            return Ok(WrittenDocument {
                document,
                disposition: WriteDisposition::Preserved,
            });
        }

        let write_error = |source: io::Error| EnvironmentError::DocumentWrite {
            path: destination.clone(),
            source,
        };

        let rendered = document
            .render()
            .map_err(|e| write_error(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        write_atomic(&destination, rendered.as_bytes()).map_err(write_error)?;

        info!(document = %document.name(), path = ?destination, "Wrote document");
        Ok(WrittenDocument {
            document,
            disposition: WriteDisposition::Written,
        })
    }
}

fn slot_value(settings: &ResolvedSettings, slot: &Slot) -> Option<Value> {
    match &slot.source {
        SlotSource::Static(value) => Some(value.clone()),
        SlotSource::Setting(key) => settings.get(key).map(|resolved| resolved.value().to_json()),
    }
}

fn write_atomic(destination: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = destination
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "document path has no parent"))?;
    fs::create_dir_all(parent)?;

    let file_name = destination
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "document path has no file name"))?;
    let temp_path = parent.join(format!(".{}.tmp", file_name.to_string_lossy()));

    let result = (|| {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(DOCUMENT_MODE)
            .open(&temp_path)?;
        // mode() only applies on creation; a stale temp file keeps its bits
        file.set_permissions(Permissions::from_mode(DOCUMENT_MODE))?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&temp_path, destination)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}
