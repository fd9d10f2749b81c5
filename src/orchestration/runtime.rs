//! Container runtime abstraction
//!
//! Provides a trait for the image operations dockyard needs, so the
//! builder and the local digest source can run against podman, docker,
//! or an in-memory fake in tests.

use crate::error::DockyardResult;
use crate::orchestration::build_spec::BuildSpec;
use async_trait::async_trait;

/// Abstract container runtime interface
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Check if the runtime is available on this system
    async fn is_available(&self) -> DockyardResult<bool>;

    /// Content identifier of a local image (`sha256:...`)
    ///
    /// Returns `DigestNotFound` when the image is not present.
    async fn image_digest(&self, image: &str) -> DockyardResult<String>;

    /// Build an image, streaming build output line by line
    async fn build_image(
        &self,
        spec: &BuildSpec,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> DockyardResult<()>;

    /// Push an image and return the registry manifest digest
    async fn push_image(&self, tag: &str) -> DockyardResult<String>;

    /// Get the human-readable runtime name for display
    fn runtime_name(&self) -> &'static str;
}
