// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Bootstrap Service
//!
//! Drives one startup from environment snapshot to handoff:
//!
//! 1. normalize the data directories (still elevated)
//! 2. resolve the gateway auth mode, then every remaining setting
//! 3. synthesize and write the documents
//! 4. validate directories and documents for the target identity
//! 5. drop privileges and hand off to the target process
//!
//! Steps 1-4 are [`BootstrapService::prepare`]; step 5 is
//! [`BootstrapService::launch`]. The split lets `--check` stop after
//! validation and lets tests substitute the launcher.

use std::fs;
use std::sync::Arc;
use tracing::{error, info};

use crate::application::resolver::ConfigurationResolver;
use crate::application::synthesizer::DocumentSynthesizer;
use crate::application::validator::Validator;
use crate::domain::bootstrap_config::{BootstrapConfig, WritePolicy};
use crate::domain::document::{DocumentSpec, WrittenDocument};
use crate::domain::environment::EnvSnapshot;
use crate::domain::gateway_catalog::{keys, AuthMode, GatewayCatalog};
use crate::domain::outcome::{BootstrapError, BootstrapOutcome, EnvironmentError};
use crate::domain::secret_store::SecretStore;
use crate::domain::setting::{ResolvedSettings, SettingKey};
use crate::infrastructure::identity::TargetIdentity;
use crate::infrastructure::open_secret_store;
use crate::infrastructure::privileges::{ElevatedSetup, Handoff, ProcessLauncher};

/// Result of the preparation phases, ready for the privilege drop
#[derive(Debug)]
pub struct PreparedLaunch {
    setup: ElevatedSetup,
    settings: ResolvedSettings,
    documents: Vec<WrittenDocument>,
}

impl PreparedLaunch {
    pub fn settings(&self) -> &ResolvedSettings {
        &self.settings
    }

    pub fn documents(&self) -> &[WrittenDocument] {
        &self.documents
    }

    pub fn identity(&self) -> &TargetIdentity {
        self.setup.identity()
    }
}

pub struct BootstrapService {
    config: BootstrapConfig,
    env: EnvSnapshot,
    store: Option<Arc<dyn SecretStore>>,
    identity: TargetIdentity,
}

impl BootstrapService {
    /// Secret store taken from the config's locator, if any
    pub fn new(config: BootstrapConfig, env: EnvSnapshot, identity: TargetIdentity) -> Self {
        let store = config
            .secret_store
            .as_ref()
            .map(|locator| open_secret_store(locator, &env));
        Self {
            config,
            env,
            store,
            identity,
        }
    }

    pub fn with_secret_store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    pub async fn prepare(&self) -> Result<PreparedLaunch, BootstrapError> {
        let layout = &self.config.layout;

        info!(user = %self.identity.user, data_root = ?layout.data_root, "Normalizing data directories");
        let setup = ElevatedSetup::begin(self.identity.clone())?;
        setup.normalize(layout)?;

        info!("Resolving configuration");
        let catalog = GatewayCatalog::new(layout);
        let mut resolver = ConfigurationResolver::new(&self.env, self.store.clone());
        if self.config.write_policy == WritePolicy::Preserve && layout.primary_document().exists() {
            info!(
                path = ?layout.primary_document(),
                "Keeping existing primary document, its gateway token stays in effect"
            );
            resolver = resolver.without_generation_notice();
        }
        let mut settings = ResolvedSettings::new();
        resolver.resolve_into(&[catalog.auth_mode_setting()], &mut settings).await?;
        let auth_mode = AuthMode::from_resolved(
            settings
                .get(&SettingKey::new(keys::AUTH_MODE))
                .and_then(|value| value.value().as_text()),
        );
        resolver.resolve_into(&catalog.settings(auth_mode), &mut settings).await?;
        info!(auth_mode = %auth_mode, settings = settings.len(), "Configuration resolved");

        info!("Synthesizing documents");
        let mut specs = vec![catalog.primary_document(auth_mode)];
        specs.extend(catalog.integration_documents());
        let documents = self.write_documents(&setup, &settings, &specs)?;

        info!(documents = documents.len(), "Validating");
        let directories = layout.required_directories();
        Validator::new().validate(&documents, &directories, setup.identity())?;

        Ok(PreparedLaunch {
            setup,
            settings,
            documents,
        })
    }

    fn write_documents(
        &self,
        setup: &ElevatedSetup,
        settings: &ResolvedSettings,
        specs: &[DocumentSpec],
    ) -> Result<Vec<WrittenDocument>, EnvironmentError> {
        let synthesizer = DocumentSynthesizer::new();
        let policy = self.config.write_policy;
        let mut documents = Vec::new();

        for spec in specs {
            let Some(document) = synthesizer.synthesize(settings, spec) else {
                if policy == WritePolicy::Regenerate && spec.destination.exists() {
                    fs::remove_file(&spec.destination).map_err(|source| EnvironmentError::DocumentWrite {
                        path: spec.destination.clone(),
                        source,
                    })?;
                    info!(document = %spec.name, path = ?spec.destination, "Removed document that is no longer configured");
                }
                continue;
            };

            let written = synthesizer.write(document, policy)?;
            setup.adopt(written.document.destination())?;
            documents.push(written);
        }
        Ok(documents)
    }

    /// Drop privileges and hand over. `Started` means the launcher accepted the handoff.
    pub fn launch(&self, prepared: PreparedLaunch, launcher: &dyn ProcessLauncher) -> BootstrapOutcome {
        match self.handoff(prepared, launcher) {
            Ok(()) => BootstrapOutcome::Started,
            Err(e) => {
                let e = BootstrapError::from(e);
                error!(exit_code = e.exit_code(), "Handoff failed: {}", e);
                e.into()
            }
        }
    }

    fn handoff(&self, prepared: PreparedLaunch, launcher: &dyn ProcessLauncher) -> Result<(), EnvironmentError> {
        let layout = &self.config.layout;
        let user = prepared.identity().user.clone();
        let token = prepared.setup.drop_privileges(&layout.required_directories())?;

        let handoff = Handoff::new(token, self.config.command.clone())
            .environment(self.config.curated_environment(&self.env, &user))
            .working_dir(&layout.workspace);
        launcher.launch(handoff)
    }

    /// Full sequence
    pub async fn run(&self, launcher: &dyn ProcessLauncher) -> BootstrapOutcome {
        match self.prepare().await {
            Ok(prepared) => self.launch(prepared, launcher),
            Err(e) => {
                error!(exit_code = e.exit_code(), "Bootstrap failed: {}", e);
                e.into()
            }
        }
    }
}
