//! lampstack synthesizer library entry.
//!
//! This crate assembles the security-policy unit (regional web ACL) and the
//! workload unit (auto scaled fleet behind a TLS load balancer) from a YAML
//! config, and renders both into a cloud assembly. It is consumed by the
//! binary (`main.rs`) and by integration tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod app;
pub mod assembly;
pub mod compose;
pub mod config;
pub mod waf;
pub mod workload;

pub use compose::{build_app, synth};
