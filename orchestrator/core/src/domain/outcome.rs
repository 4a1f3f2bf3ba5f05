// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Bootstrap Outcome and Error Taxonomy
//!
//! Every failure of the bootstrap sequence falls into exactly one category,
//! and every category has its own process exit code so the supervisor can
//! tell "bad config" from "bad environment" without parsing log text.
//!
//! | Category | Exit code | Raised by |
//! |----------|-----------|-----------|
//! | [`ConfigurationError`] | 78 (`EX_CONFIG`) | resolver, orchestrator settings |
//! | [`ValidationReport`] | 65 (`EX_DATAERR`) | validator |
//! | [`EnvironmentError`] | 71 (`EX_OSERR`) | normalization, document writes, privilege drop, exec |
//!
//! Nothing is retried. The supervisor restarts the whole orchestrator.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::setting::SettingKey;
use crate::domain::validation::ValidationReport;

pub const EXIT_CONFIGURATION: i32 = 78;
pub const EXIT_VALIDATION: i32 = 65;
pub const EXIT_ENVIRONMENT: i32 = 71;

/// A source the resolver consulted for a setting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckedSource {
    Environment(String),
    SecretStore(String),
}

impl fmt::Display for CheckedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Environment(var) => write!(f, "environment variable {}", var),
            Self::SecretStore(name) => write!(f, "secret store entry '{}'", name),
        }
    }
}

fn join_sources(sources: &[CheckedSource]) -> String {
    if sources.is_empty() {
        return "no sources declared".to_string();
    }
    sources
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Required setting '{key}' has no value (checked: {})", join_sources(.sources_checked))]
    Missing {
        key: SettingKey,
        sources_checked: Vec<CheckedSource>,
    },

    #[error("Invalid value for setting '{key}' from {source_label}: {reason}")]
    Invalid {
        key: SettingKey,
        source_label: String,
        reason: String,
    },

    #[error("Setting '{key}' can only come from the secret store, which is unavailable: {reason}")]
    SecretStoreUnavailable { key: SettingKey, reason: String },

    #[error("Setting '{0}' is declared more than once")]
    DuplicateSetting(SettingKey),

    #[error("Invalid value for {variable}: {reason}")]
    InvalidOrchestratorSetting { variable: String, reason: String },

    #[error("Both AZURE_KEYVAULT_NAME and OPENCLAW_SECRETS_DIR are set; configure exactly one secret store")]
    AmbiguousSecretStore,
}

#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("Failed to look up user '{user}': {reason}")]
    IdentityLookup { user: String, reason: String },

    #[error("Running as uid {current_uid} cannot switch to '{user}' (uid {target_uid}) without root")]
    NotPrivileged {
        current_uid: u32,
        user: String,
        target_uid: u32,
    },

    #[error("Failed to prepare {path:?}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to change ownership of {path:?}: {source}")]
    Ownership {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write document {path:?}: {source}")]
    DocumentWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to drop privileges to '{user}': {reason}")]
    PrivilegeDrop { user: String, reason: String },

    #[error("{path:?} is not writable by '{user}' after dropping privileges: {reason}")]
    WriteAccess {
        path: PathBuf,
        user: String,
        reason: String,
    },

    #[error("Target command is empty")]
    EmptyCommand,

    #[error("Failed to exec '{program}': {source}")]
    Exec {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Fatal error of the bootstrap sequence
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Validation(#[from] ValidationReport),

    #[error(transparent)]
    Environment(#[from] EnvironmentError),
}

impl BootstrapError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => EXIT_CONFIGURATION,
            Self::Validation(_) => EXIT_VALIDATION,
            Self::Environment(_) => EXIT_ENVIRONMENT,
        }
    }
}

/// Terminal state of one orchestrator invocation
#[derive(Debug)]
pub enum BootstrapOutcome {
    /// The target process has taken over
    Started,
    ConfigurationError(ConfigurationError),
    ValidationError(ValidationReport),
    EnvironmentError(EnvironmentError),
}

impl BootstrapOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Started => 0,
            Self::ConfigurationError(_) => EXIT_CONFIGURATION,
            Self::ValidationError(_) => EXIT_VALIDATION,
            Self::EnvironmentError(_) => EXIT_ENVIRONMENT,
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started)
    }
}

impl From<BootstrapError> for BootstrapOutcome {
    fn from(error: BootstrapError) -> Self {
        match error {
            BootstrapError::Configuration(e) => Self::ConfigurationError(e),
            BootstrapError::Validation(e) => Self::ValidationError(e),
            BootstrapError::Environment(e) => Self::EnvironmentError(e),
        }
    }
}

impl From<Result<(), BootstrapError>> for BootstrapOutcome {
    fn from(result: Result<(), BootstrapError>) -> Self {
        match result {
            Ok(()) => Self::Started,
            Err(error) => error.into(),
        }
    }
}
