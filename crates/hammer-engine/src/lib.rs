//! Load-driving engine for the `hammer` HTTP(S) load generator.
//!
//! This crate implements the core concurrency machinery that drives a
//! configurable fleet of worker tasks against a target, independent of any
//! particular HTTP transport. The transport is supplied by the caller as an
//! implementation of [`client::HttpClient`]; concrete transports live in the
//! `hammer-client` crate.
//!
//! # Module Organization
//!
//! - [`config`] - validated run configuration
//! - [`error`] - engine-level error kinds
//! - [`histogram`] - sharded concurrent frequency tables
//! - [`error_map`] - canonicalized, counted error messages
//! - [`rate`] - rate estimation and token-bucket pacing
//! - [`barrier`] - completion barriers (counted, timed)
//! - [`client`] - the HTTP client trait the engine drives
//! - [`bytes`] - shared byte counters
//! - [`progress`] - RPS sampling and progress fraction reporting
//! - [`report`] - result aggregation and the final report record
//! - [`signal`] - external cancellation wiring
//! - [`engine`] - the worker pool and orchestrator

pub mod barrier;
pub mod bytes;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod error_map;
pub mod histogram;
pub mod progress;
pub mod rate;
pub mod report;
pub mod signal;

pub use config::Settings;
pub use engine::Engine;
pub use error::EngineError;
pub use report::RunReport;
