// Copyright 2026 Slipscan Contributors
// SPDX-License-Identifier: Apache-2.0

//! Slipscan runtime: acquires markup for receipt and product URLs and runs
//! it through the `slipscan` extractor.
//!
//! The library crate exposes the pipeline and its parts for embedding and
//! integration testing; the `slipscan` binary is a thin CLI over it.

pub mod acquisition;
pub mod cli;
pub mod config;
pub mod pipeline;
pub mod renderer;
pub mod stealth;

pub use config::RuntimeConfig;
pub use pipeline::Pipeline;
