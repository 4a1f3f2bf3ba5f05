// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! OpenClaw Bootstrap Core
//!
//! Resolves gateway configuration, synthesizes its documents, validates the
//! result and hands the process over to the gateway under a low-privilege
//! identity.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Container entrypoint orchestration

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
