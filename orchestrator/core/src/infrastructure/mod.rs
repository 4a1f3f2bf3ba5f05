// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod key_vault;
pub mod directory_secrets;
pub mod identity;
pub mod privileges;

pub use directory_secrets::DirectorySecretStore;
pub use identity::TargetIdentity;
pub use key_vault::KeyVaultSecretStore;

use async_trait::async_trait;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::bootstrap_config::SecretStoreLocator;
use crate::domain::environment::EnvSnapshot;
use crate::domain::secret_store::{SecretStore, SecretStoreError};
use crate::domain::setting::SecretReference;

/// Backend for the configured locator.
///
/// A backend that cannot even be constructed behaves as a store that is
/// unavailable for every lookup, so the resolver applies its usual policy.
pub fn open_secret_store(locator: &SecretStoreLocator, env: &EnvSnapshot) -> Arc<dyn SecretStore> {
    let store: Arc<dyn SecretStore> = match locator {
        SecretStoreLocator::KeyVault { vault_name } => match KeyVaultSecretStore::new(vault_name.as_str(), env) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!(vault = %vault_name, "Key Vault client unavailable: {}", e);
                Arc::new(UnavailableStore {
                    description: format!("key vault '{}'", vault_name),
                    reason: e.to_string(),
                })
            }
        },
        SecretStoreLocator::Directory { path } => Arc::new(DirectorySecretStore::new(path.clone())),
    };
    info!(store = %store.describe(), "Using secret store");
    store
}

struct UnavailableStore {
    description: String,
    reason: String,
}

#[async_trait]
impl SecretStore for UnavailableStore {
    fn describe(&self) -> String {
        self.description.clone()
    }

    async fn fetch(&self, _reference: &SecretReference) -> Result<SecretString, SecretStoreError> {
        Err(SecretStoreError::Unavailable(self.reason.clone()))
    }
}
