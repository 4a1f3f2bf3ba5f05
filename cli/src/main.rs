// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # OpenClaw Entrypoint
//!
//! PID 1 of the OpenClaw container. Resolves the gateway configuration from
//! the environment, an optional secret store and generated defaults, writes
//! the gateway documents, validates the data directories, drops root and
//! execs the gateway.
//!
//! ## Exit codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | `--check` passed |
//! | 65 | validation failed |
//! | 71 | environment error (identity, ownership, privilege drop, exec) |
//! | 78 | configuration error |
//! | 128+n | aborted by signal n before the handoff |

use anyhow::{Context, Result};
use clap::Parser;

use openclaw_entrypoint::entrypoint::{self, Cli};
use openclaw_entrypoint::signals;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    signals::install_abort_handlers()?;

    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli.log_level)?;

    let code = entrypoint::run(cli).await;
    std::process::exit(code);
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
