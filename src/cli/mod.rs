// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI module for viewer-chat
//!
//! Handles command-line argument parsing and REPL input parsing.

pub mod args;
pub mod repl;

pub use args::*;
