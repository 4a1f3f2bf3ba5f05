// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! OpenClaw entrypoint library - exposes testable components
//!
//! # Architecture
//!
//! - **Layer:** Interface / Presentation Layer
//! - **Purpose:** Command line, process signals and wiring of the bootstrap service

pub mod entrypoint;
pub mod signals;
