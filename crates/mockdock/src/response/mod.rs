//! Response synthesis for matched rules.

mod builder;
mod synthesizer;

pub use builder::{MockResponse, TEXT_PLAIN};
pub use synthesizer::{render, synthesize};
