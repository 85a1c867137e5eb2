//! Core library for the `curload` CLI.
//!
//! This crate provides the internal building blocks used by the binary: CLI
//! argument types, the batch dispatch loop, request execution, statistics
//! aggregation, the interactive dashboard, and result exports. The primary
//! user-facing interface is the `curload` command-line application; library
//! APIs may evolve as the CLI grows.
pub mod args;
pub mod cancel;
pub mod dashboard;
pub mod error;
pub mod executor;
pub mod export;
pub mod http;
pub mod logger;
pub mod reporter;
pub mod runner;
pub mod stats;
pub mod summary;
