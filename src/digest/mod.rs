//! Image digest resolution
//!
//! A cache hit is only trusted once the image store confirms the image
//! still exists. Where that confirmation comes from (the local runtime or
//! a remote registry) is decided once, when the source is created.

mod local;
pub mod reference;
mod remote;

pub use local::LocalDigestSource;
pub use reference::{split_digest, ImageReference};
pub use remote::RemoteDigestSource;

use crate::error::DockyardResult;
use crate::orchestration::ContainerRuntime;
use async_trait::async_trait;
use std::sync::Arc;

/// Answers "what digest does the image store report for this tag?"
#[async_trait]
pub trait DigestSource: Send + Sync {
    /// Current digest for `tag`, or an error if the image is not there
    async fn digest(&self, tag: &str) -> DockyardResult<String>;

    /// Tag handed to consumers for an image confirmed at `digest`
    fn result_tag(&self, tag: &str, digest: &str) -> String;

    /// Short label for logs
    fn name(&self) -> &'static str;
}

/// Pick the digest source for a build
///
/// Local lookups ask the runtime's image store; otherwise the registry
/// named in each tag is queried.
pub fn create_digest_source(
    use_local_lookup: bool,
    runtime: Arc<dyn ContainerRuntime>,
    insecure_registries: &[String],
) -> Arc<dyn DigestSource> {
    if use_local_lookup {
        Arc::new(LocalDigestSource::new(runtime))
    } else {
        Arc::new(RemoteDigestSource::new(
            insecure_registries.iter().cloned().collect(),
        ))
    }
}
