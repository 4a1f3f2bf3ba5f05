// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Immutable capture of the process environment.
//!
//! Taken once when the orchestrator starts and passed to everything that
//! needs environment input. Nothing downstream reads `std::env` directly.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment. Non-UTF-8 entries are skipped.
    pub fn capture() -> Self {
        Self::from_pairs(std::env::vars_os().filter_map(|(key, value)| {
            Some((key.into_string().ok()?, value.into_string().ok()?))
        }))
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    /// Trimmed value of `name`; unset, empty and whitespace-only all count as absent.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Raw value of `name`, preserving whitespace. Used for passthrough variables.
    pub fn get_raw(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values_count_as_unset() {
        let env = EnvSnapshot::from_pairs([
            ("OPENCLAW_GATEWAY_TOKEN", ""),
            ("OPENCLAW_LOG_LEVEL", "   "),
            ("OPENCLAW_GATEWAY_BIND", " lan \n"),
        ]);

        assert_eq!(env.get("OPENCLAW_GATEWAY_TOKEN"), None);
        assert_eq!(env.get("OPENCLAW_LOG_LEVEL"), None);
        assert_eq!(env.get("OPENCLAW_GATEWAY_BIND"), Some("lan"));
        assert_eq!(env.get("UNSET"), None);
        assert_eq!(env.get_raw("OPENCLAW_LOG_LEVEL"), Some("   "));
    }

    #[test]
    fn test_capture_reads_process_environment() {
        let env = EnvSnapshot::capture();
        if let Ok(path) = std::env::var("PATH") {
            assert_eq!(env.get_raw("PATH"), Some(path.as_str()));
        }
    }
}
