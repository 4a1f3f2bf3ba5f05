// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Settings and Resolved Values
//!
//! A [`SettingSpec`] declares where a gateway setting may come from; the
//! resolver turns it into a [`ConfigurationValue`] tagged with the
//! [`Provenance`] of the tier that supplied it.
//!
//! | Tier | Provenance | Precedence |
//! |------|------------|------------|
//! | Environment variable | `explicit-env` | highest |
//! | Secret store | `secret-store` | middle |
//! | Default policy | `generated-default` | lowest |
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Setting declarations, typed values, immutable resolved set

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::outcome::ConfigurationError;

/// Dot-path identifying a setting, e.g. `gateway.auth.token`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SettingKey(String);

impl SettingKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SettingKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Source tier that supplied a value.
///
/// Variants are declared in ascending precedence, so `Ord` is the
/// precedence law: `ExplicitEnv > SecretStore > GeneratedDefault`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    GeneratedDefault,
    SecretStore,
    ExplicitEnv,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::GeneratedDefault => "generated-default",
            Self::SecretStore => "secret-store",
            Self::ExplicitEnv => "explicit-env",
        };
        f.write_str(tag)
    }
}

/// A typed setting value. Secret strings are redacted in `Debug` output.
#[derive(Debug)]
pub enum Value {
    Text(String),
    Secret(SecretString),
    Integer(i64),
    Boolean(bool),
}

impl Value {
    /// Text content of a non-secret string value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, Self::Secret(_))
    }

    /// Document representation. This is the only place a secret is exposed,
    /// and it is only called while building a document.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Text(text) => serde_json::Value::String(text.clone()),
            Self::Secret(secret) => serde_json::Value::String(secret.expose_secret().to_string()),
            Self::Integer(number) => serde_json::Value::from(*number),
            Self::Boolean(flag) => serde_json::Value::Bool(*flag),
        }
    }
}

/// How a raw string from any tier is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Secret,
    Port,
    Integer,
    Boolean,
    /// One of a fixed set of lowercase options
    Choice(&'static [&'static str]),
}

impl ValueKind {
    pub fn is_secret(&self) -> bool {
        matches!(self, Self::Secret)
    }

    /// Parse a raw, already trimmed, non-empty string into a typed value.
    pub fn parse(&self, raw: &str) -> Result<Value, String> {
        match self {
            Self::Text => Ok(Value::Text(raw.to_string())),
            Self::Secret => Ok(Value::Secret(SecretString::from(raw.to_string()))),
            Self::Port => match raw.parse::<u16>() {
                Ok(0) => Err("port must be between 1 and 65535".to_string()),
                Ok(port) => Ok(Value::Integer(i64::from(port))),
                Err(_) => Err(format!("'{}' is not a valid port number", raw)),
            },
            Self::Integer => raw
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| format!("'{}' is not a valid integer", raw)),
            Self::Boolean => parse_bool(raw)
                .map(Value::Boolean)
                .ok_or_else(|| format!("'{}' is not a boolean. Expected true/false", raw)),
            Self::Choice(options) => {
                let lowered = raw.to_lowercase();
                if options.contains(&lowered.as_str()) {
                    Ok(Value::Text(lowered))
                } else {
                    Err(format!("'{}' is not one of: {}", raw, options.join(", ")))
                }
            }
        }
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Backend-specific address of a secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretLocator {
    /// Vault to read from instead of the configured one
    pub vault: Option<String>,
    pub secret: String,
}

/// Pointer to an externally managed secret. The orchestrator only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretReference {
    /// Logical name, also the default secret name in the store
    pub name: String,
    pub locator: Option<SecretLocator>,
}

impl SecretReference {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locator: None,
        }
    }

    pub fn with_locator(mut self, vault: Option<String>, secret: impl Into<String>) -> Self {
        self.locator = Some(SecretLocator {
            vault,
            secret: secret.into(),
        });
        self
    }

    /// Name to look up in the backend
    pub fn secret_name(&self) -> &str {
        self.locator
            .as_ref()
            .map(|locator| locator.secret.as_str())
            .unwrap_or(&self.name)
    }

    pub fn vault(&self) -> Option<&str> {
        self.locator.as_ref().and_then(|locator| locator.vault.as_deref())
    }
}

/// Lowest tier: what to use when neither the environment nor the store supplied a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultPolicy {
    None,
    /// Documented literal, parsed with the setting's kind
    Literal(String),
    /// Cryptographically random bytes, hex encoded
    RandomHex { bytes: usize },
}

/// Declaration of one setting and the sources it may be resolved from
#[derive(Debug, Clone)]
pub struct SettingSpec {
    pub key: SettingKey,
    pub env_var: Option<String>,
    pub secret: Option<SecretReference>,
    pub required: bool,
    pub kind: ValueKind,
    pub default: DefaultPolicy,
}

impl SettingSpec {
    pub fn new(key: impl Into<SettingKey>, kind: ValueKind) -> Self {
        Self {
            key: key.into(),
            env_var: None,
            secret: None,
            required: false,
            kind,
            default: DefaultPolicy::None,
        }
    }

    pub fn env(mut self, var: impl Into<String>) -> Self {
        self.env_var = Some(var.into());
        self
    }

    pub fn secret(mut self, reference: SecretReference) -> Self {
        self.secret = Some(reference);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_literal(mut self, literal: impl Into<String>) -> Self {
        self.default = DefaultPolicy::Literal(literal.into());
        self
    }

    pub fn generate_hex(mut self, bytes: usize) -> Self {
        self.default = DefaultPolicy::RandomHex { bytes };
        self
    }
}

/// A resolved setting. Fields are read-only once constructed.
#[derive(Debug)]
pub struct ConfigurationValue {
    key: SettingKey,
    value: Value,
    provenance: Provenance,
}

impl ConfigurationValue {
    pub fn new(key: SettingKey, value: Value, provenance: Provenance) -> Self {
        Self {
            key,
            value,
            provenance,
        }
    }

    pub fn key(&self) -> &SettingKey {
        &self.key
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }
}

/// The set of values resolved during one startup.
///
/// A key can be inserted once; its value and provenance never change after.
#[derive(Debug, Default)]
pub struct ResolvedSettings {
    values: BTreeMap<SettingKey, ConfigurationValue>,
}

impl ResolvedSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: ConfigurationValue) -> Result<(), ConfigurationError> {
        if self.values.contains_key(value.key()) {
            return Err(ConfigurationError::DuplicateSetting(value.key().clone()));
        }
        self.values.insert(value.key().clone(), value);
        Ok(())
    }

    pub fn get(&self, key: &SettingKey) -> Option<&ConfigurationValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &SettingKey) -> bool {
        self.values.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigurationValue> {
        self.values.values()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
