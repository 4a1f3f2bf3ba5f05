// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Secret Store Port
//!
//! Read-only access to an external secret store. The orchestrator never
//! writes, rotates or deletes secrets.
//!
//! Backends (see `infrastructure`):
//!
//! - `KeyVaultSecretStore`: Azure Key Vault via managed identity
//! - `DirectorySecretStore`: secrets mounted as files (`/run/secrets`, ACA secret volumes)
//!
//! Both errors are non-fatal to the resolver: they mean "no value from this
//! tier". See `ConfigurationResolver` for the one case where
//! `Unavailable` escalates.

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

use crate::domain::setting::SecretReference;

#[derive(Debug, Error)]
pub enum SecretStoreError {
    /// The store answered, and it has no such secret
    #[error("Secret '{0}' not found")]
    NotFound(String),

    /// The store could not be reached or refused the request
    #[error("Secret store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Human-readable description for logs, e.g. `key vault 'openclaw-kv'`
    fn describe(&self) -> String;

    async fn fetch(&self, reference: &SecretReference) -> Result<SecretString, SecretStoreError>;
}
