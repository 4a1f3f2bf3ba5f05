// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Bootstrap Configuration - the entrypoint's own settings
//
// Everything here is environment-driven; there is no config file for the
// entrypoint itself. Covers:
// - Data layout (data root, home, state, workspace, logs, cache)
// - Low-privilege account the gateway runs as
// - Secret store locator (Azure Key Vault or a mounted directory)
// - Regenerate/preserve policy for existing documents
// - Target command and the curated environment handed to it

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::domain::environment::EnvSnapshot;
use crate::domain::outcome::ConfigurationError;

pub const DEFAULT_DATA_ROOT: &str = "/data";
pub const DEFAULT_RUN_AS: &str = "openclaw";
pub const PRIMARY_DOCUMENT_FILE: &str = "openclaw.json";
pub const DEFAULT_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Variables forwarded to the gateway unchanged when present
const FORWARDED_VARS: &[&str] = &["TZ", "LANG"];

/// Filesystem layout under the data root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    pub data_root: PathBuf,
    /// `HOME` of the gateway process
    pub home: PathBuf,
    /// Gateway state directory; the primary document lives here
    pub state_dir: PathBuf,
    /// Working directory of the gateway process
    pub workspace: PathBuf,
    pub logs: PathBuf,
    pub cache: PathBuf,
}

impl DataLayout {
    /// Default layout below `data_root`
    pub fn under(data_root: impl Into<PathBuf>) -> Self {
        let data_root = data_root.into();
        let home = data_root.join("home");
        Self {
            state_dir: home.join(".openclaw"),
            home,
            workspace: data_root.join("workspace"),
            logs: data_root.join("logs"),
            cache: data_root.join("cache"),
            data_root,
        }
    }

    pub fn primary_document(&self) -> PathBuf {
        self.state_dir.join(PRIMARY_DOCUMENT_FILE)
    }

    /// Directory holding one document per configured integration
    pub fn channels_dir(&self) -> PathBuf {
        self.state_dir.join("channels")
    }

    /// Directories that must exist and be writable by the gateway identity
    pub fn required_directories(&self) -> Vec<PathBuf> {
        vec![
            self.home.clone(),
            self.state_dir.clone(),
            self.channels_dir(),
            self.workspace.clone(),
            self.logs.clone(),
            self.cache.clone(),
        ]
    }
}

/// What to do when a document already exists at its destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePolicy {
    #[default]
    Regenerate,
    /// Keep hand-edited files. Opt-in only.
    Preserve,
}

impl FromStr for WritePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "regenerate" | "always" => Ok(Self::Regenerate),
            "preserve" | "keep" => Ok(Self::Preserve),
            other => Err(format!("'{}'. Expected regenerate or preserve", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretStoreLocator {
    KeyVault { vault_name: String },
    Directory { path: PathBuf },
}

/// Program and arguments the orchestrator replaces itself with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl TargetCommand {
    /// `openclaw gateway start --foreground`
    pub fn gateway() -> Self {
        Self {
            program: "openclaw".to_string(),
            args: ["gateway", "start", "--foreground"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    pub fn from_argv(argv: Vec<String>) -> Option<Self> {
        let mut argv = argv.into_iter();
        let program = argv.next()?;
        Some(Self {
            program,
            args: argv.collect(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub layout: DataLayout,
    pub run_as: String,
    pub write_policy: WritePolicy,
    pub secret_store: Option<SecretStoreLocator>,
    pub command: TargetCommand,
    /// Extra variable names forwarded to the gateway
    pub passthrough: Vec<String>,
}

impl BootstrapConfig {
    /// Defaults for a data root, no secret store
    pub fn for_data_root(data_root: impl Into<PathBuf>) -> Self {
        Self {
            layout: DataLayout::under(data_root),
            run_as: DEFAULT_RUN_AS.to_string(),
            write_policy: WritePolicy::default(),
            secret_store: None,
            command: TargetCommand::gateway(),
            passthrough: Vec::new(),
        }
    }

    /// Build from the environment snapshot
    pub fn from_env(env: &EnvSnapshot) -> Result<Self, ConfigurationError> {
        let data_root = absolute_dir(env, "OPENCLAW_DATA_ROOT")?
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_ROOT));
        let mut config = Self::for_data_root(data_root);

        if let Some(home) = absolute_dir(env, "OPENCLAW_HOME")? {
            config.layout.state_dir = home.join(".openclaw");
            config.layout.home = home;
        }
        if let Some(state_dir) = absolute_dir(env, "OPENCLAW_STATE_DIR")? {
            config.layout.state_dir = state_dir;
        }
        if let Some(workspace) = absolute_dir(env, "OPENCLAW_WORKSPACE_DIR")? {
            config.layout.workspace = workspace;
        }
        if let Some(logs) = absolute_dir(env, "OPENCLAW_LOG_DIR")? {
            config.layout.logs = logs;
        }
        if let Some(cache) = absolute_dir(env, "OPENCLAW_CACHE_DIR")? {
            config.layout.cache = cache;
        }

        if let Some(user) = env.get("OPENCLAW_RUN_AS") {
            tracing::info!("Environment override: OPENCLAW_RUN_AS={}", user);
            config.run_as = user.to_string();
        }

        if let Some(policy) = env.get("OPENCLAW_CONFIG_POLICY") {
            config.write_policy = policy.parse().map_err(|reason| {
                ConfigurationError::InvalidOrchestratorSetting {
                    variable: "OPENCLAW_CONFIG_POLICY".to_string(),
                    reason,
                }
            })?;
            tracing::info!("Environment override: OPENCLAW_CONFIG_POLICY={:?}", config.write_policy);
        }

        config.secret_store = match (env.get("AZURE_KEYVAULT_NAME"), absolute_dir(env, "OPENCLAW_SECRETS_DIR")?) {
            (Some(_), Some(_)) => return Err(ConfigurationError::AmbiguousSecretStore),
            (Some(vault), None) => Some(SecretStoreLocator::KeyVault {
                vault_name: vault.to_string(),
            }),
            (None, Some(path)) => Some(SecretStoreLocator::Directory { path }),
            (None, None) => None,
        };

        if let Some(list) = env.get("OPENCLAW_ENV_PASSTHROUGH") {
            config.passthrough = list
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(ToString::to_string)
                .collect();
        }

        Ok(config)
    }

    /// Replace the default gateway command with an explicit argv, if one was given
    pub fn with_command(mut self, argv: Vec<String>) -> Self {
        if let Some(command) = TargetCommand::from_argv(argv) {
            self.command = command;
        }
        self
    }

    /// The complete environment of the gateway process. Nothing else is inherited.
    pub fn curated_environment(&self, env: &EnvSnapshot, user: &str) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        vars.insert("HOME".to_string(), path_string(&self.layout.home));
        vars.insert("USER".to_string(), user.to_string());
        vars.insert("LOGNAME".to_string(), user.to_string());
        vars.insert(
            "PATH".to_string(),
            env.get("PATH").unwrap_or(DEFAULT_PATH).to_string(),
        );
        vars.insert("NODE_ENV".to_string(), "production".to_string());
        vars.insert("OPENCLAW_STATE_DIR".to_string(), path_string(&self.layout.state_dir));
        vars.insert(
            "OPENCLAW_CONFIG_PATH".to_string(),
            path_string(&self.layout.primary_document()),
        );
        vars.insert("XDG_CACHE_HOME".to_string(), path_string(&self.layout.cache));

        let forwarded = FORWARDED_VARS
            .iter()
            .copied()
            .chain(self.passthrough.iter().map(String::as_str));
        for name in forwarded {
            if vars.contains_key(name) {
                tracing::warn!("Ignoring passthrough of {}, the entrypoint sets it", name);
                continue;
            }
            if let Some(value) = env.get_raw(name) {
                vars.insert(name.to_string(), value.to_string());
            }
        }
        vars
    }
}

fn absolute_dir(env: &EnvSnapshot, variable: &str) -> Result<Option<PathBuf>, ConfigurationError> {
    let Some(raw) = env.get(variable) else {
        return Ok(None);
    };
    let path = PathBuf::from(raw);
    if !path.is_absolute() {
        return Err(ConfigurationError::InvalidOrchestratorSetting {
            variable: variable.to_string(),
            reason: format!("'{}' must be an absolute path", raw),
        });
    }
    tracing::info!("Environment override: {}={}", variable, raw);
    Ok(Some(path))
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
