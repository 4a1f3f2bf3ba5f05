// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command line and top-level wiring.
//!
//! Usage: `openclaw-entrypoint [--check] [--log-level LEVEL] [-- COMMAND...]`
//!
//! Without a command the gateway is started with
//! `openclaw gateway start --foreground`.

use clap::Parser;
use tracing::{error, info};

use openclaw_bootstrap_core::application::BootstrapService;
use openclaw_bootstrap_core::domain::bootstrap_config::BootstrapConfig;
use openclaw_bootstrap_core::domain::environment::EnvSnapshot;
use openclaw_bootstrap_core::domain::outcome::BootstrapError;
use openclaw_bootstrap_core::infrastructure::privileges::ExecLauncher;
use openclaw_bootstrap_core::infrastructure::TargetIdentity;

/// OpenClaw container entrypoint - configure, drop privileges, start the gateway
#[derive(Parser, Debug)]
#[command(name = "openclaw-entrypoint")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Prepare and validate, then exit without starting the gateway
    #[arg(long)]
    pub check: bool,

    /// Log level of the entrypoint itself (trace, debug, info, warn, error)
    #[arg(long, env = "OPENCLAW_ENTRYPOINT_LOG", default_value = "info")]
    pub log_level: String,

    /// Command to run instead of the gateway
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Run the bootstrap sequence and return the process exit code.
///
/// On success without `--check` this does not return: the process image is
/// replaced by the target command.
pub async fn run(cli: Cli) -> i32 {
    let env = EnvSnapshot::capture();

    let config = match BootstrapConfig::from_env(&env) {
        Ok(config) => config.with_command(cli.command),
        Err(e) => return fail(e.into()),
    };
    let identity = match TargetIdentity::lookup(&config.run_as) {
        Ok(identity) => identity,
        Err(e) => return fail(e.into()),
    };

    info!(
        user = %identity.user,
        uid = identity.uid,
        program = %config.command.program,
        "Starting OpenClaw entrypoint"
    );
    let service = BootstrapService::new(config, env, identity);

    if cli.check {
        return match service.prepare().await {
            Ok(prepared) => {
                info!(documents = prepared.documents().len(), "Check passed");
                0
            }
            Err(e) => fail(e),
        };
    }

    // exec only returns on failure
    service.run(&ExecLauncher).await.exit_code()
}

fn fail(error: BootstrapError) -> i32 {
    let code = error.exit_code();
    error!(exit_code = code, "{}", error);
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults_start_gateway() {
        let cli = Cli::try_parse_from(["openclaw-entrypoint"]).unwrap();
        assert!(!cli.check);
        assert!(cli.command.is_empty());
    }

    #[test]
    fn test_trailing_command_keeps_its_flags() {
        let cli = Cli::try_parse_from([
            "openclaw-entrypoint",
            "--check",
            "--log-level",
            "debug",
            "--",
            "node",
            "gateway.js",
            "--port",
            "18789",
        ])
        .unwrap();

        assert!(cli.check);
        assert_eq!(cli.log_level, "debug");
        assert_eq!(cli.command, vec!["node", "gateway.js", "--port", "18789"]);
    }

    #[test]
    fn test_command_without_separator() {
        let cli = Cli::try_parse_from(["openclaw-entrypoint", "openclaw", "gateway", "--verbose"]).unwrap();
        assert_eq!(cli.command, vec!["openclaw", "gateway", "--verbose"]);
    }
}
