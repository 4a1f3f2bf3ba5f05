// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Azure Key Vault Secret Store
//!
//! Reads secrets with the container's managed identity. No credentials are
//! configured on the orchestrator itself.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** `SecretStore` backend for Azure Key Vault
//! - **Integration:** Managed identity endpoint → access token → Key Vault REST API
//!
//! # Token acquisition
//!
//! | Environment | Endpoint | Header |
//! |-------------|----------|--------|
//! | App Service / Container Apps | `$IDENTITY_ENDPOINT` | `X-IDENTITY-HEADER: $IDENTITY_HEADER` |
//! | VM / AKS | IMDS `169.254.169.254` | `Metadata: true` |
//!
//! `AZURE_CLIENT_ID` selects a user-assigned identity on both paths. The token
//! is fetched once per process and reused for every secret.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::domain::environment::EnvSnapshot;
use crate::domain::secret_store::{SecretStore, SecretStoreError};
use crate::domain::setting::SecretReference;

const VAULT_RESOURCE: &str = "https://vault.azure.net";
const VAULT_API_VERSION: &str = "7.4";
const IMDS_TOKEN_URL: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the managed identity token comes from
#[derive(Debug)]
pub enum IdentityEndpoint {
    AppService { url: String, header: SecretString },
    Imds { url: String },
}

impl IdentityEndpoint {
    /// App Service style endpoint when both variables are set, IMDS otherwise
    pub fn from_env(env: &EnvSnapshot) -> Self {
        match (env.get("IDENTITY_ENDPOINT"), env.get("IDENTITY_HEADER")) {
            (Some(url), Some(header)) => Self::AppService {
                url: url.to_string(),
                header: SecretString::from(header.to_string()),
            },
            _ => Self::Imds {
                url: IMDS_TOKEN_URL.to_string(),
            },
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct SecretBundle {
    value: String,
}

pub struct KeyVaultSecretStore {
    vault_name: String,
    vault_url: String,
    identity: IdentityEndpoint,
    client_id: Option<String>,
    client: Client,
    token: OnceCell<SecretString>,
}

impl KeyVaultSecretStore {
    /// Store for `https://<vault_name>.vault.azure.net`, identity from the environment
    pub fn new(vault_name: impl Into<String>, env: &EnvSnapshot) -> Result<Self, SecretStoreError> {
        let vault_name = vault_name.into();
        let vault_url = vault_url(&vault_name);
        Self::with_endpoints(
            vault_name,
            vault_url,
            IdentityEndpoint::from_env(env),
            env.get("AZURE_CLIENT_ID").map(ToString::to_string),
        )
    }

    /// Explicit vault URL and identity endpoint
    pub fn with_endpoints(
        vault_name: impl Into<String>,
        vault_url: impl Into<String>,
        identity: IdentityEndpoint,
        client_id: Option<String>,
    ) -> Result<Self, SecretStoreError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SecretStoreError::Unavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            vault_name: vault_name.into(),
            vault_url: vault_url.into().trim_end_matches('/').to_string(),
            identity,
            client_id,
            client,
            token: OnceCell::new(),
        })
    }

    async fn access_token(&self) -> Result<&SecretString, SecretStoreError> {
        self.token.get_or_try_init(|| self.request_token()).await
    }

    async fn request_token(&self) -> Result<SecretString, SecretStoreError> {
        let request = match &self.identity {
            IdentityEndpoint::AppService { url, header } => {
                let mut query = vec![
                    ("api-version", APP_SERVICE_API_VERSION),
                    ("resource", VAULT_RESOURCE),
                ];
                if let Some(client_id) = &self.client_id {
                    query.push(("client_id", client_id.as_str()));
                }
                self.client
                    .get(url)
                    .header("X-IDENTITY-HEADER", header.expose_secret())
                    .query(&query)
            }
            IdentityEndpoint::Imds { url } => {
                let mut query = vec![("api-version", IMDS_API_VERSION), ("resource", VAULT_RESOURCE)];
                if let Some(client_id) = &self.client_id {
                    query.push(("client_id", client_id.as_str()));
                }
                self.client.get(url).header("Metadata", "true").query(&query)
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| SecretStoreError::Unavailable(format!("managed identity endpoint unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SecretStoreError::Unavailable(format!(
                "managed identity token request failed with status {}",
                status
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SecretStoreError::Unavailable(format!("malformed token response: {}", e)))?;

        debug!("Acquired managed identity token for Key Vault");
        Ok(SecretString::from(token.access_token))
    }

    fn secret_url(&self, reference: &SecretReference) -> String {
        let base = match reference.vault() {
            Some(vault) if vault != self.vault_name => vault_url(vault),
            _ => self.vault_url.clone(),
        };
        format!("{}/secrets/{}", base, reference.secret_name())
    }
}

fn vault_url(vault_name: &str) -> String {
    format!("https://{}.vault.azure.net", vault_name)
}

#[async_trait]
impl SecretStore for KeyVaultSecretStore {
    fn describe(&self) -> String {
        format!("key vault '{}'", self.vault_name)
    }

    async fn fetch(&self, reference: &SecretReference) -> Result<SecretString, SecretStoreError> {
        let token = self.access_token().await?;
        let url = self.secret_url(reference);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token.expose_secret())
            .query(&[("api-version", VAULT_API_VERSION)])
            .send()
            .await
            .map_err(|e| SecretStoreError::Unavailable(format!("{} unreachable: {}", self.describe(), e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(SecretStoreError::NotFound(reference.secret_name().to_string())),
            status if status.is_success() => {
                let bundle: SecretBundle = response.json().await.map_err(|e| {
                    SecretStoreError::Unavailable(format!("malformed secret response: {}", e))
                })?;
                Ok(SecretString::from(bundle.value))
            }
            status => Err(SecretStoreError::Unavailable(format!(
                "reading '{}' failed with status {}",
                reference.secret_name(),
                status
            ))),
        }
    }
}
