// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # OpenClaw Gateway Catalog
//!
//! Declares every gateway setting the entrypoint resolves and the documents
//! synthesized from them.
//!
//! ## Primary document (`<state>/openclaw.json`)
//!
//! ```json
//! {
//!   "gateway": { "mode": "local", "bind": "lan", "port": 18789,
//!                "auth": { "mode": "token", "token": "<64 hex chars>" } },
//!   "logLevel": "info",
//!   "agents": { "defaults": { "workspace": "/data/workspace",
//!                             "model": { "primary": "github-copilot/claude-haiku-4.5" } } },
//!   "browser": { "enabled": true, "headless": true, "noSandbox": true }
//! }
//! ```
//!
//! ## Integration documents (`<state>/channels/<name>.json`)
//!
//! One per integration, written only when its identifier and its credential
//! both resolved.

use serde_json::json;
use std::fmt;

use crate::domain::bootstrap_config::DataLayout;
use crate::domain::document::{DocumentSpec, SectionSpec, Slot};
use crate::domain::setting::{SecretReference, SettingKey, SettingSpec, ValueKind};

pub mod keys {
    pub const AUTH_MODE: &str = "gateway.auth.mode";
    pub const AUTH_TOKEN: &str = "gateway.auth.token";
    pub const BIND: &str = "gateway.bind";
    pub const PORT: &str = "gateway.port";
    pub const LOG_LEVEL: &str = "logLevel";
    pub const DEFAULT_MODEL: &str = "agents.defaults.model.primary";
}

pub const DEFAULT_PORT: u16 = 18789;
pub const DEFAULT_MODEL: &str = "github-copilot/claude-haiku-4.5";
/// Random bytes in a generated gateway token (64 hex characters)
pub const GATEWAY_TOKEN_BYTES: usize = 32;

const AUTH_MODES: &[&str] = &["token", "none"];
const BIND_MODES: &[&str] = &["lan", "loopback", "auto", "tailnet"];
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Gateway authorization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Token,
    /// Anonymous access
    None,
}

impl AuthMode {
    /// Interpret the resolved `gateway.auth.mode` value
    pub fn from_resolved(value: Option<&str>) -> Self {
        match value {
            Some("none") => Self::None,
            _ => Self::Token,
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token => f.write_str("token"),
            Self::None => f.write_str("none"),
        }
    }
}

/// One field of an integration block
#[derive(Debug, Clone, Copy)]
pub struct IntegrationField {
    /// Key inside the integration block, e.g. `appId`
    pub field: &'static str,
    pub env_var: &'static str,
    pub secret: Option<&'static str>,
    pub kind: ValueKind,
}

/// An external channel integration: enabled only with identifier + credential
#[derive(Debug, Clone, Copy)]
pub struct Integration {
    pub name: &'static str,
    pub identifier: IntegrationField,
    pub credential: IntegrationField,
    pub extras: &'static [IntegrationField],
}

impl Integration {
    fn section_path(&self) -> String {
        format!("channels.{}", self.name)
    }

    pub fn setting_key(&self, field: &IntegrationField) -> SettingKey {
        SettingKey::new(format!("{}.{}", self.section_path(), field.field))
    }

    fn fields(&self) -> impl Iterator<Item = &IntegrationField> {
        [&self.identifier, &self.credential]
            .into_iter()
            .chain(self.extras.iter())
    }
}

pub const INTEGRATIONS: &[Integration] = &[
    Integration {
        name: "msteams",
        identifier: IntegrationField {
            field: "appId",
            env_var: "OPENCLAW_MSTEAMS_APP_ID",
            secret: Some("msteams-app-id"),
            kind: ValueKind::Text,
        },
        credential: IntegrationField {
            field: "appPassword",
            env_var: "OPENCLAW_MSTEAMS_APP_PASSWORD",
            secret: Some("msteams-app-password"),
            kind: ValueKind::Secret,
        },
        extras: &[IntegrationField {
            field: "tenantId",
            env_var: "OPENCLAW_MSTEAMS_TENANT_ID",
            secret: None,
            kind: ValueKind::Text,
        }],
    },
    Integration {
        name: "discord",
        identifier: IntegrationField {
            field: "applicationId",
            env_var: "OPENCLAW_DISCORD_APPLICATION_ID",
            secret: Some("discord-application-id"),
            kind: ValueKind::Text,
        },
        credential: IntegrationField {
            field: "token",
            env_var: "OPENCLAW_DISCORD_BOT_TOKEN",
            secret: Some("discord-bot-token"),
            kind: ValueKind::Secret,
        },
        extras: &[],
    },
];

/// Setting and document declarations for one data layout
#[derive(Debug, Clone, Copy)]
pub struct GatewayCatalog<'a> {
    layout: &'a DataLayout,
}

impl<'a> GatewayCatalog<'a> {
    pub fn new(layout: &'a DataLayout) -> Self {
        Self { layout }
    }

    /// Resolved first: decides whether a token is needed at all
    pub fn auth_mode_setting(&self) -> SettingSpec {
        SettingSpec::new(keys::AUTH_MODE, ValueKind::Choice(AUTH_MODES))
            .env("OPENCLAW_GATEWAY_AUTH_MODE")
            .default_literal("token")
    }

    /// All remaining settings for the given auth mode
    pub fn settings(&self, auth_mode: AuthMode) -> Vec<SettingSpec> {
        let mut settings = Vec::new();

        if auth_mode == AuthMode::Token {
            settings.push(
                SettingSpec::new(keys::AUTH_TOKEN, ValueKind::Secret)
                    .env("OPENCLAW_GATEWAY_TOKEN")
                    .secret(SecretReference::named("gateway-token"))
                    .required()
                    .generate_hex(GATEWAY_TOKEN_BYTES),
            );
        }

        settings.push(
            SettingSpec::new(keys::BIND, ValueKind::Choice(BIND_MODES))
                .env("OPENCLAW_GATEWAY_BIND")
                .default_literal("lan"),
        );
        settings.push(
            SettingSpec::new(keys::PORT, ValueKind::Port)
                .env("OPENCLAW_GATEWAY_PORT")
                .default_literal(DEFAULT_PORT.to_string()),
        );
        settings.push(
            SettingSpec::new(keys::LOG_LEVEL, ValueKind::Choice(LOG_LEVELS))
                .env("OPENCLAW_LOG_LEVEL")
                .default_literal("info"),
        );
        settings.push(
            SettingSpec::new(keys::DEFAULT_MODEL, ValueKind::Text)
                .env("OPENCLAW_DEFAULT_MODEL")
                .default_literal(DEFAULT_MODEL),
        );

        for integration in INTEGRATIONS {
            for field in integration.fields() {
                let mut spec = SettingSpec::new(integration.setting_key(field), field.kind)
                    .env(field.env_var);
                if let Some(secret) = field.secret {
                    spec = spec.secret(SecretReference::named(secret));
                }
                settings.push(spec);
            }
        }

        settings
    }

    pub fn primary_document(&self, auth_mode: AuthMode) -> DocumentSpec {
        let auth = match auth_mode {
            AuthMode::Token => SectionSpec::new("gateway.auth")
                .mandatory(Slot::fixed("mode", "token"))
                .mandatory(Slot::setting("token", keys::AUTH_TOKEN)),
            AuthMode::None => SectionSpec::new("gateway.auth").mandatory(Slot::fixed("mode", "none")),
        };

        DocumentSpec::new("openclaw", self.layout.primary_document())
            .slot(Slot::fixed("gateway.mode", "local"))
            .slot(Slot::setting("gateway.bind", keys::BIND))
            .slot(Slot::setting("gateway.port", keys::PORT))
            .section(auth)
            .slot(Slot::setting("logLevel", keys::LOG_LEVEL))
            .slot(Slot::fixed(
                "agents.defaults.workspace",
                self.layout.workspace.to_string_lossy().into_owned(),
            ))
            .slot(Slot::setting("agents.defaults.model.primary", keys::DEFAULT_MODEL))
            .slot(Slot::fixed("browser", json!({
                "enabled": true,
                "headless": true,
                "noSandbox": true
            })))
    }

    pub fn integration_documents(&self) -> Vec<DocumentSpec> {
        INTEGRATIONS
            .iter()
            .map(|integration| {
                let mut section = SectionSpec::new(integration.section_path())
                    .mandatory(Slot::fixed("enabled", true))
                    .mandatory(Slot::setting(
                        integration.identifier.field,
                        integration.setting_key(&integration.identifier),
                    ))
                    .mandatory(Slot::setting(
                        integration.credential.field,
                        integration.setting_key(&integration.credential),
                    ));
                for extra in integration.extras {
                    section = section.optional(Slot::setting(extra.field, integration.setting_key(extra)));
                }

                DocumentSpec::new(
                    integration.name,
                    self.layout.channels_dir().join(format!("{}.json", integration.name)),
                )
                .section(section)
                .only_when_configured()
            })
            .collect()
    }
}
