//! Runtime factory for creating the configured container runtime

use crate::config::Config;
use crate::error::{DockyardError, DockyardResult};
use crate::orchestration::cli_runtime::{CliRuntime, RuntimeKind};
use crate::orchestration::runtime::ContainerRuntime;
use std::sync::Arc;

/// Create the container runtime named in `runtime.binary`
///
/// # Returns
/// * `Ok(Arc<dyn ContainerRuntime>)` - A shared runtime implementation
/// * `Err` - If the configured binary is not a supported runtime
pub fn create_runtime(config: &Config) -> DockyardResult<Arc<dyn ContainerRuntime>> {
    let kind = RuntimeKind::from_binary(&config.runtime.binary)
        .ok_or_else(|| DockyardError::RuntimeNotFound(config.runtime.binary.clone()))?;
    Ok(Arc::new(CliRuntime::new(kind)))
}
