//! lampstack core: the template model, intrinsic functions, and error types.
//!
//! This crate defines the provider-template contract shared by the stack
//! assemblers and the synthesizer binary. It carries no knowledge of any
//! particular stack so the same model can back other resource graphs.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `LampstackError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod template;

/// Shared result type.
pub use error::{LampstackError, Result};
