//! Dockyard - container image builds with an artifact cache
//!
//! Hashes each artifact's build inputs and reuses the image from the last
//! build with the same hash, as long as the image store still has it.

pub mod artifact;
pub mod build;
pub mod cache;
pub mod cli;
pub mod config;
pub mod deps;
pub mod digest;
pub mod error;
pub mod orchestration;
pub mod ui;

#[cfg(test)]
mod testing;

pub use error::{DockyardError, DockyardResult};
