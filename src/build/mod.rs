//! Build backends
//!
//! The cache only needs "build these artifacts with these tags and tell me
//! what you produced". Anything satisfying [`Builder`] can sit behind it.

mod runtime_builder;

pub use runtime_builder::RuntimeBuilder;

use crate::artifact::{Artifact, BuildResult, ImageTags};
use crate::error::DockyardResult;
use async_trait::async_trait;
use std::io::Write;

/// Builds artifacts and reports the resulting tags
#[async_trait]
pub trait Builder: Send + Sync {
    /// Build every artifact in `artifacts` using its tag from `tags`
    ///
    /// Returns one result per artifact. A returned tag may be pinned as
    /// `tag@digest` when the backend knows the pushed digest.
    async fn build_and_test(
        &self,
        out: &mut (dyn Write + Send),
        tags: &ImageTags,
        artifacts: &[Artifact],
    ) -> DockyardResult<Vec<BuildResult>>;
}
