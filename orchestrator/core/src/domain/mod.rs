// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain model of the bootstrap sequence
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Settings, documents, outcomes and the secret store port

pub mod setting;
pub mod outcome;
pub mod validation;
pub mod environment;
pub mod document;
pub mod secret_store;
pub mod bootstrap_config;
pub mod gateway_catalog;
