// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod resolver;
pub mod synthesizer;
pub mod validator;
pub mod bootstrap;

// Re-export use cases for convenience
pub use bootstrap::{BootstrapService, PreparedLaunch};
pub use resolver::ConfigurationResolver;
pub use synthesizer::DocumentSynthesizer;
pub use validator::Validator;
