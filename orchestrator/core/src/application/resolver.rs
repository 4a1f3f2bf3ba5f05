// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Configuration Resolver
//!
//! Resolves each declared setting by consulting sources in strict order and
//! stopping at the first one that supplies a non-empty value:
//!
//! 1. the explicit environment variable (from the injected [`EnvSnapshot`])
//! 2. the secret store, when one is configured and the setting names a secret
//! 3. the setting's [`DefaultPolicy`]
//!
//! Secret store failures count as "no value from that tier". They only
//! become fatal when the store is the setting's sole source (no environment
//! variable declared), the setting is required and there is no default to
//! fall back to.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Phase 2 of the bootstrap sequence

use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::environment::EnvSnapshot;
use crate::domain::outcome::{CheckedSource, ConfigurationError};
use crate::domain::secret_store::{SecretStore, SecretStoreError};
use crate::domain::setting::{
    ConfigurationValue, DefaultPolicy, Provenance, ResolvedSettings, SettingSpec, Value,
};

pub struct ConfigurationResolver<'a> {
    env: &'a EnvSnapshot,
    store: Option<Arc<dyn SecretStore>>,
    announce_generated: bool,
}

impl<'a> ConfigurationResolver<'a> {
    pub fn new(env: &'a EnvSnapshot, store: Option<Arc<dyn SecretStore>>) -> Self {
        Self {
            env,
            store,
            announce_generated: true,
        }
    }

    /// Generated values will not reach the gateway, so they are never printed
    pub fn without_generation_notice(mut self) -> Self {
        self.announce_generated = false;
        self
    }

    /// Resolve one setting.
    ///
    /// `Ok(None)` means an optional setting with no value and no default;
    /// the synthesizer omits its slot.
    pub async fn resolve(
        &self,
        spec: &SettingSpec,
    ) -> Result<Option<ConfigurationValue>, ConfigurationError> {
        let mut sources_checked = Vec::new();

        // 1. Explicit environment input
        if let Some(var) = &spec.env_var {
            sources_checked.push(CheckedSource::Environment(var.clone()));
            if let Some(raw) = self.env.get(var) {
                let value = parse(spec, raw, &format!("environment variable {}", var))?;
                return Ok(Some(self.accept(spec, value, Provenance::ExplicitEnv)));
            }
        }

        // 2. Secret store
        let mut store_failure = None;
        if let (Some(reference), Some(store)) = (&spec.secret, &self.store) {
            sources_checked.push(CheckedSource::SecretStore(reference.secret_name().to_string()));
            match store.fetch(reference).await {
                Ok(secret) => {
                    let raw = secret.expose_secret().trim();
                    if !raw.is_empty() {
                        let label = format!("{} secret '{}'", store.describe(), reference.secret_name());
                        let value = parse(spec, raw, &label)?;
                        return Ok(Some(self.accept(spec, value, Provenance::SecretStore)));
                    }
                    debug!(key = %spec.key, "Secret store returned an empty value");
                }
                Err(SecretStoreError::NotFound(_)) => {
                    debug!(key = %spec.key, secret = %reference.secret_name(), "Secret not found in store");
                }
                Err(SecretStoreError::Unavailable(reason)) => {
                    warn!(
                        key = %spec.key,
                        secret = %reference.secret_name(),
                        "Secret store unavailable, treating value as absent: {}",
                        reason
                    );
                    store_failure = Some(reason);
                }
            }
        }

        // 3. Default policy
        match &spec.default {
            DefaultPolicy::Literal(literal) => {
                let value = parse(spec, literal, "default")?;
                return Ok(Some(self.accept(spec, value, Provenance::GeneratedDefault)));
            }
            DefaultPolicy::RandomHex { bytes } => {
                let value = generate_secret(spec, *bytes, self.announce_generated);
                return Ok(Some(self.accept(spec, value, Provenance::GeneratedDefault)));
            }
            DefaultPolicy::None => {}
        }

        if let Some(reason) = store_failure {
            if spec.env_var.is_none() && spec.required {
                return Err(ConfigurationError::SecretStoreUnavailable {
                    key: spec.key.clone(),
                    reason,
                });
            }
        }

        if spec.required {
            return Err(ConfigurationError::Missing {
                key: spec.key.clone(),
                sources_checked,
            });
        }

        debug!(key = %spec.key, "Optional setting has no value");
        Ok(None)
    }

    /// Resolve a batch of settings into `resolved`, stopping at the first error
    pub async fn resolve_into(
        &self,
        specs: &[SettingSpec],
        resolved: &mut ResolvedSettings,
    ) -> Result<(), ConfigurationError> {
        for spec in specs {
            if resolved.contains(&spec.key) {
                return Err(ConfigurationError::DuplicateSetting(spec.key.clone()));
            }
            if let Some(value) = self.resolve(spec).await? {
                resolved.insert(value)?;
            }
        }
        Ok(())
    }

    pub async fn resolve_all(&self, specs: &[SettingSpec]) -> Result<ResolvedSettings, ConfigurationError> {
        let mut resolved = ResolvedSettings::new();
        self.resolve_into(specs, &mut resolved).await?;
        Ok(resolved)
    }

    fn accept(&self, spec: &SettingSpec, value: Value, provenance: Provenance) -> ConfigurationValue {
        info!(key = %spec.key, provenance = %provenance, "Resolved setting");
        ConfigurationValue::new(spec.key.clone(), value, provenance)
    }
}

fn parse(spec: &SettingSpec, raw: &str, source_label: &str) -> Result<Value, ConfigurationError> {
    spec.kind
        .parse(raw)
        .map_err(|reason| ConfigurationError::Invalid {
            key: spec.key.clone(),
            source_label: source_label.to_string(),
            reason,
        })
}

/// Fresh random value; announced once because it cannot be recovered later
fn generate_secret(spec: &SettingSpec, bytes: usize, announce: bool) -> Value {
    let mut buffer = vec![0u8; bytes];
    rand::rng().fill(buffer.as_mut_slice());
    let encoded = hex::encode(&buffer);

    if announce {
        warn!(
            key = %spec.key,
            "Generated a new value for '{}'. Save this value now, it will not be shown again: {}",
            spec.key,
            encoded
        );
    } else {
        info!(key = %spec.key, "Generated a value for '{}' that the kept document does not use", spec.key);
    }

    if spec.kind.is_secret() {
        Value::Secret(SecretString::from(encoded))
    } else {
        Value::Text(encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::setting::{SecretReference, SettingKey, ValueKind};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_test::traced_test;

    /// In-memory store; `None` entries answer `Unavailable`
    struct MapStore {
        entries: HashMap<String, Option<String>>,
        calls: AtomicUsize,
    }

    impl MapStore {
        fn new(entries: &[(&str, Option<&str>)]) -> Arc<Self> {
            Arc::new(Self {
                entries: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.map(ToString::to_string)))
                    .collect(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SecretStore for MapStore {
        fn describe(&self) -> String {
            "test store".to_string()
        }

        async fn fetch(&self, reference: &SecretReference) -> Result<SecretString, SecretStoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.entries.get(reference.secret_name()) {
                Some(Some(value)) => Ok(SecretString::from(value.clone())),
                Some(None) => Err(SecretStoreError::Unavailable("connection refused".to_string())),
                None => Err(SecretStoreError::NotFound(reference.secret_name().to_string())),
            }
        }
    }

    fn token_spec() -> SettingSpec {
        SettingSpec::new("gateway.auth.token", ValueKind::Secret)
            .env("OPENCLAW_GATEWAY_TOKEN")
            .secret(SecretReference::named("gateway-token"))
            .required()
            .generate_hex(32)
    }

    fn secret_text(value: &ConfigurationValue) -> String {
        value.value().to_json().as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_explicit_env_wins_over_secret_store() {
        let env = EnvSnapshot::from_pairs([("OPENCLAW_GATEWAY_TOKEN", "abc123")]);
        let store = MapStore::new(&[("gateway-token", Some("from-vault"))]);
        let resolver = ConfigurationResolver::new(&env, Some(store.clone()));

        let value = resolver.resolve(&token_spec()).await.unwrap().unwrap();
        assert_eq!(secret_text(&value), "abc123");
        assert_eq!(value.provenance(), Provenance::ExplicitEnv);
        assert_eq!(store.calls.load(Ordering::SeqCst), 0, "store must not be consulted");
    }

    #[tokio::test]
    async fn test_secret_store_used_when_env_unset() {
        let env = EnvSnapshot::from_pairs([("OPENCLAW_GATEWAY_TOKEN", "  ")]);
        let store = MapStore::new(&[("gateway-token", Some("from-vault\n"))]);
        let resolver = ConfigurationResolver::new(&env, Some(store));

        let value = resolver.resolve(&token_spec()).await.unwrap().unwrap();
        assert_eq!(secret_text(&value), "from-vault");
        assert_eq!(value.provenance(), Provenance::SecretStore);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_generated_token_is_64_hex_and_announced_once() {
        let env = EnvSnapshot::default();
        let resolver = ConfigurationResolver::new(&env, None);

        let value = resolver.resolve(&token_spec()).await.unwrap().unwrap();
        let token = secret_text(&value);
        assert_eq!(value.provenance(), Provenance::GeneratedDefault);
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));

        assert!(logs_contain("Save this value now"));
        assert!(logs_contain(&token));
        // the regular resolution line does not repeat the value
        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|line| line.contains(token.as_str())).count() {
                1 => Ok(()),
                n => Err(format!("token logged {} times", n)),
            }
        });
    }

    #[tokio::test]
    async fn test_generated_tokens_differ() {
        let env = EnvSnapshot::default();
        let resolver = ConfigurationResolver::new(&env, None);
        let first = resolver.resolve(&token_spec()).await.unwrap().unwrap();
        let second = resolver.resolve(&token_spec()).await.unwrap().unwrap();
        assert_ne!(secret_text(&first), secret_text(&second));
    }

    #[tokio::test]
    async fn test_literal_default_is_deterministic() {
        let env = EnvSnapshot::default();
        let resolver = ConfigurationResolver::new(&env, None);
        let spec = SettingSpec::new("gateway.port", ValueKind::Port)
            .env("OPENCLAW_GATEWAY_PORT")
            .default_literal("18789");

        for _ in 0..2 {
            let value = resolver.resolve(&spec).await.unwrap().unwrap();
            assert_eq!(value.value().to_json(), serde_json::json!(18789));
            assert_eq!(value.provenance(), Provenance::GeneratedDefault);
        }
    }

    #[tokio::test]
    async fn test_required_without_any_source_is_missing() {
        let env = EnvSnapshot::default();
        let store = MapStore::new(&[]);
        let resolver = ConfigurationResolver::new(&env, Some(store));
        let spec = SettingSpec::new("channels.msteams.appPassword", ValueKind::Secret)
            .env("OPENCLAW_MSTEAMS_APP_PASSWORD")
            .secret(SecretReference::named("msteams-app-password"))
            .required();

        match resolver.resolve(&spec).await {
            Err(ConfigurationError::Missing { key, sources_checked }) => {
                assert_eq!(key, SettingKey::new("channels.msteams.appPassword"));
                assert_eq!(
                    sources_checked,
                    vec![
                        CheckedSource::Environment("OPENCLAW_MSTEAMS_APP_PASSWORD".to_string()),
                        CheckedSource::SecretStore("msteams-app-password".to_string()),
                    ]
                );
            }
            other => panic!("expected Missing, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_optional_without_value_is_omitted() {
        let env = EnvSnapshot::default();
        let resolver = ConfigurationResolver::new(&env, None);
        let spec = SettingSpec::new("channels.discord.token", ValueKind::Secret)
            .env("OPENCLAW_DISCORD_BOT_TOKEN")
            .secret(SecretReference::named("discord-bot-token"));
        assert!(resolver.resolve(&spec).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unavailable_store_falls_back_to_default() {
        let env = EnvSnapshot::default();
        let store = MapStore::new(&[("gateway-token", None)]);
        let resolver = ConfigurationResolver::new(&env, Some(store));

        let value = resolver.resolve(&token_spec()).await.unwrap().unwrap();
        assert_eq!(value.provenance(), Provenance::GeneratedDefault);
    }

    #[tokio::test]
    async fn test_unavailable_store_escalates_when_sole_source_without_default() {
        let env = EnvSnapshot::default();
        let store = MapStore::new(&[("registry-password", None)]);
        let resolver = ConfigurationResolver::new(&env, Some(store));
        let spec = SettingSpec::new("registry.password", ValueKind::Secret)
            .secret(SecretReference::named("registry-password"))
            .required();

        assert!(matches!(
            resolver.resolve(&spec).await,
            Err(ConfigurationError::SecretStoreUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_unavailable_store_for_optional_store_only_setting_is_absent() {
        let env = EnvSnapshot::default();
        let store = MapStore::new(&[("channels-x-token", None)]);
        let resolver = ConfigurationResolver::new(&env, Some(store));
        let spec = SettingSpec::new("channels.x.token", ValueKind::Secret)
            .secret(SecretReference::named("channels-x-token"));

        assert!(resolver.resolve(&spec).await.unwrap().is_none());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_generation_without_notice_never_prints_the_value() {
        let env = EnvSnapshot::default();
        let resolver = ConfigurationResolver::new(&env, None).without_generation_notice();

        let value = resolver.resolve(&token_spec()).await.unwrap().unwrap();
        let token = secret_text(&value);
        assert_eq!(value.provenance(), Provenance::GeneratedDefault);
        assert_eq!(token.len(), 64);

        assert!(!logs_contain("Save this value now"));
        assert!(!logs_contain(&token));
        assert!(logs_contain("kept document does not use"));
    }

    #[tokio::test]
    async fn test_unavailable_store_with_env_declared_is_absent() {
        let env = EnvSnapshot::default();
        let store = MapStore::new(&[("discord-bot-token", None)]);
        let resolver = ConfigurationResolver::new(&env, Some(store));
        let spec = SettingSpec::new("channels.discord.token", ValueKind::Secret)
            .env("OPENCLAW_DISCORD_BOT_TOKEN")
            .secret(SecretReference::named("discord-bot-token"));

        assert!(resolver.resolve(&spec).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unparsable_value_is_invalid() {
        let env = EnvSnapshot::from_pairs([("OPENCLAW_GATEWAY_PORT", "eighty")]);
        let resolver = ConfigurationResolver::new(&env, None);
        let spec = SettingSpec::new("gateway.port", ValueKind::Port)
            .env("OPENCLAW_GATEWAY_PORT")
            .default_literal("18789");

        match resolver.resolve(&spec).await {
            Err(ConfigurationError::Invalid { key, source_label, .. }) => {
                assert_eq!(key.as_str(), "gateway.port");
                assert!(source_label.contains("OPENCLAW_GATEWAY_PORT"));
            }
            other => panic!("expected Invalid, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolve_all_rejects_duplicate_declarations() {
        let env = EnvSnapshot::default();
        let resolver = ConfigurationResolver::new(&env, None);
        let spec = SettingSpec::new("logLevel", ValueKind::Text).default_literal("info");

        assert!(matches!(
            resolver.resolve_all(&[spec.clone(), spec]).await,
            Err(ConfigurationError::DuplicateSetting(_))
        ));
    }

    #[tokio::test]
    async fn test_mixed_tiers_keep_their_provenance() {
        let env = EnvSnapshot::from_pairs([("OPENCLAW_LOG_LEVEL", "debug")]);
        let resolver = ConfigurationResolver::new(&env, None);
        let specs = vec![
            SettingSpec::new("logLevel", ValueKind::Text)
                .env("OPENCLAW_LOG_LEVEL")
                .default_literal("info"),
            SettingSpec::new("gateway.bind", ValueKind::Text)
                .env("OPENCLAW_GATEWAY_BIND")
                .default_literal("lan"),
        ];

        let resolved = resolver.resolve_all(&specs).await.unwrap();
        let log_level = resolved.get(&SettingKey::new("logLevel")).unwrap();
        let bind = resolved.get(&SettingKey::new("gateway.bind")).unwrap();
        assert_eq!(log_level.provenance(), Provenance::ExplicitEnv);
        assert_eq!(log_level.value().as_text(), Some("debug"));
        assert_eq!(bind.provenance(), Provenance::GeneratedDefault);
        assert_eq!(bind.value().as_text(), Some("lan"));
    }
}
