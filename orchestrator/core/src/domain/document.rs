// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Generated Configuration Documents
//!
//! Documents are built as typed trees from a [`DocumentSpec`], never by
//! textual substitution into a template string.
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | `Slot` | A document path filled from a resolved setting or a static literal |
//! | `SectionSpec` | A grouped block emitted only when all its mandatory slots resolved |
//! | `DocumentSpec` | Destination path plus slots and sections |
//! | `GeneratedConfigDocument` | The immutable result, rendered once to disk |
//!
//! Paths use dots as separators (`gateway.auth.token`). Objects are ordered
//! maps, so rendering the same document twice yields identical bytes.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Document templates and the synthesized artifact

use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::domain::setting::SettingKey;

#[derive(Debug, Clone, PartialEq)]
pub enum SlotSource {
    Setting(SettingKey),
    Static(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    /// Dot-path inside the document (or inside the section for section slots)
    pub path: String,
    pub source: SlotSource,
}

impl Slot {
    pub fn setting(path: impl Into<String>, key: impl Into<SettingKey>) -> Self {
        Self {
            path: path.into(),
            source: SlotSource::Setting(key.into()),
        }
    }

    pub fn fixed(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            source: SlotSource::Static(value.into()),
        }
    }
}

/// Optional grouped block, e.g. one integration's settings
#[derive(Debug, Clone, PartialEq)]
pub struct SectionSpec {
    pub path: String,
    /// All of these must resolve, otherwise the whole section is dropped
    pub mandatory: Vec<Slot>,
    pub optional: Vec<Slot>,
}

impl SectionSpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mandatory: Vec::new(),
            optional: Vec::new(),
        }
    }

    pub fn mandatory(mut self, slot: Slot) -> Self {
        self.mandatory.push(slot);
        self
    }

    pub fn optional(mut self, slot: Slot) -> Self {
        self.optional.push(slot);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSpec {
    pub name: String,
    pub destination: PathBuf,
    pub slots: Vec<Slot>,
    pub sections: Vec<SectionSpec>,
    /// When false, a document without any content is not produced at all
    pub emit_when_empty: bool,
}

impl DocumentSpec {
    pub fn new(name: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            destination: destination.into(),
            slots: Vec::new(),
            sections: Vec::new(),
            emit_when_empty: true,
        }
    }

    pub fn slot(mut self, slot: Slot) -> Self {
        self.slots.push(slot);
        self
    }

    pub fn section(mut self, section: SectionSpec) -> Self {
        self.sections.push(section);
        self
    }

    pub fn only_when_configured(mut self) -> Self {
        self.emit_when_empty = false;
        self
    }
}

/// Insert `value` at a dot-path, creating intermediate objects.
pub(crate) fn insert_path(root: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
    let Some(leaf) = segments.pop() else {
        return;
    };

    let mut current = root;
    for segment in segments {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(map) = entry else {
            return;
        };
        current = map;
    }
    current.insert(leaf.to_string(), value);
}

/// A synthesized configuration artifact.
///
/// There is no mutation API: a document is final once the synthesizer
/// returns it. `Debug` lists only top-level keys because values may
/// contain secrets.
#[derive(Clone, PartialEq)]
pub struct GeneratedConfigDocument {
    name: String,
    destination: PathBuf,
    root: Map<String, Value>,
}

impl GeneratedConfigDocument {
    pub(crate) fn new(name: String, destination: PathBuf, root: Map<String, Value>) -> Self {
        Self {
            name,
            destination,
            root,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Value at a dot-path, if present
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.root.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.root.clone())
    }

    /// Pretty JSON with a trailing newline
    pub fn render(&self) -> Result<String, serde_json::Error> {
        let mut rendered = serde_json::to_string_pretty(&self.root)?;
        rendered.push('\n');
        Ok(rendered)
    }
}

impl fmt::Debug for GeneratedConfigDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedConfigDocument")
            .field("name", &self.name)
            .field("destination", &self.destination)
            .field("keys", &self.root.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// What happened at the destination path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDisposition {
    Written,
    /// An existing file was kept because the preserve policy is active
    Preserved,
}

#[derive(Debug, Clone)]
pub struct WrittenDocument {
    pub document: GeneratedConfigDocument,
    pub disposition: WriteDisposition,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_path_builds_nested_objects() {
        let mut root = Map::new();
        insert_path(&mut root, "gateway.auth.mode", json!("token"));
        insert_path(&mut root, "gateway.auth.token", json!("abc123"));
        insert_path(&mut root, "gateway.port", json!(18789));
        insert_path(&mut root, "logLevel", json!("debug"));

        assert_eq!(
            Value::Object(root),
            json!({
                "gateway": {
                    "auth": { "mode": "token", "token": "abc123" },
                    "port": 18789
                },
                "logLevel": "debug"
            })
        );
    }

    #[test]
    fn test_document_lookup_and_render() {
        let mut root = Map::new();
        insert_path(&mut root, "browser.headless", json!(true));
        insert_path(&mut root, "agents.defaults.model.primary", json!("github-copilot/claude-haiku-4.5"));
        let document = GeneratedConfigDocument::new(
            "openclaw".to_string(),
            PathBuf::from("/tmp/openclaw.json"),
            root,
        );

        assert_eq!(document.get("browser.headless"), Some(&json!(true)));
        assert!(document.contains("agents.defaults.model"));
        assert!(!document.contains("agents.defaults.workspace"));
        assert!(!document.contains("browser.headless.extra"));

        let rendered = document.render().unwrap();
        assert!(rendered.ends_with('\n'));
        // ordered maps: "agents" sorts before "browser"
        assert!(rendered.find("agents").unwrap() < rendered.find("browser").unwrap());
        let parsed: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed, document.to_value());
    }

    #[test]
    fn test_debug_does_not_print_values() {
        let mut root = Map::new();
        insert_path(&mut root, "gateway.auth.token", json!("s3cr3t-token"));
        let document =
            GeneratedConfigDocument::new("openclaw".to_string(), PathBuf::from("/tmp/x.json"), root);
        let debug = format!("{:?}", document);
        assert!(debug.contains("gateway"));
        assert!(!debug.contains("s3cr3t-token"));
    }
}
