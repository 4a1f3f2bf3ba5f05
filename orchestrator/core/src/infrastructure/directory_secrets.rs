// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Mounted-directory secret store
//!
//! One file per secret, named after the secret (`/run/secrets/gateway-token`).
//! This is the layout produced by Docker secrets, Kubernetes secret volumes
//! and Container Apps secret volume mounts.

use async_trait::async_trait;
use secrecy::SecretString;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::domain::secret_store::{SecretStore, SecretStoreError};
use crate::domain::setting::SecretReference;

pub struct DirectorySecretStore {
    root: PathBuf,
}

impl DirectorySecretStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// File for a secret name, or `None` if the name would leave the directory
    fn secret_path(&self, name: &str) -> Option<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(file)), None) => Some(self.root.join(file)),
            _ => None,
        }
    }
}

#[async_trait]
impl SecretStore for DirectorySecretStore {
    fn describe(&self) -> String {
        format!("secrets directory {:?}", self.root)
    }

    async fn fetch(&self, reference: &SecretReference) -> Result<SecretString, SecretStoreError> {
        let name = reference.secret_name();
        let Some(path) = self.secret_path(name) else {
            return Err(SecretStoreError::NotFound(name.to_string()));
        };

        match tokio::fs::read_to_string(&path).await {
            Ok(mut contents) => {
                if contents.ends_with('\n') {
                    contents.pop();
                    if contents.ends_with('\r') {
                        contents.pop();
                    }
                }
                Ok(SecretString::from(contents))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(SecretStoreError::NotFound(name.to_string())),
            Err(e) => Err(SecretStoreError::Unavailable(format!("failed to read {:?}: {}", path, e))),
        }
    }
}
