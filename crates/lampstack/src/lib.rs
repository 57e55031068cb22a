//! Top-level facade crate for lampstack.
//!
//! Re-exports the template model and the synthesizer so users can depend on a single crate.

pub mod core {
    pub use lampstack_core::*;
}

pub mod synth {
    pub use lampstack_synth::*;
}
