//! Builder backed by the local container runtime

use super::Builder;
use crate::artifact::{Artifact, ArtifactType, BuildResult, CustomArtifact, ImageTags};
use crate::error::{DockyardError, DockyardResult};
use crate::orchestration::{BuildSpec, ContainerRuntime};
use async_trait::async_trait;
use std::io::Write;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::process::Command;
use tracing::{debug, info};

/// Builds Dockerfile artifacts with the runtime and custom artifacts with
/// their own command, optionally pushing the result
pub struct RuntimeBuilder {
    runtime: Arc<dyn ContainerRuntime>,
    push: bool,
}

impl RuntimeBuilder {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, push: bool) -> Self {
        Self { runtime, push }
    }

    async fn build_one(
        &self,
        out: &mut (dyn Write + Send),
        artifact: &Artifact,
        tag: &str,
    ) -> DockyardResult<BuildResult> {
        let _ = writeln!(out, "Building [{}]...", artifact.image);

        {
            let sink = Mutex::new(&mut *out);
            let forward = |line: String| {
                if let Ok(mut w) = sink.lock() {
                    let _ = writeln!(w, "{}", line);
                }
            };

            match &artifact.kind {
                ArtifactType::Docker(docker) => {
                    let spec = BuildSpec::from_docker(&artifact.workspace, docker, tag);
                    self.runtime.build_image(&spec, &forward).await?;
                }
                ArtifactType::Custom(custom) => {
                    run_custom(artifact, custom, tag, &forward).await?;
                }
            }
        }

        let tag = if self.push {
            let digest = self.runtime.push_image(tag).await?;
            format!("{}@{}", tag, digest)
        } else {
            tag.to_string()
        };

        info!("Built {} as {}", artifact.image, tag);
        Ok(BuildResult::new(artifact.image.clone(), tag))
    }
}

/// Run a custom build command in the artifact workspace with `$IMAGE` set
async fn run_custom(
    artifact: &Artifact,
    custom: &CustomArtifact,
    tag: &str,
    on_output: &(dyn Fn(String) + Send + Sync),
) -> DockyardResult<()> {
    debug!("Running custom build for {}: {}", artifact.image, custom.command);

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(&custom.command)
        .current_dir(&artifact.workspace)
        .env("IMAGE", tag)
        .env("BUILD_CONTEXT", &artifact.workspace)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| DockyardError::command_failed(custom.command.clone(), e))?;

    let all_output = crate::orchestration::stream_child_output(&mut child, on_output).await?;

    let status = child
        .wait()
        .await
        .map_err(|e| DockyardError::command_failed(custom.command.clone(), e))?;

    if !status.success() {
        return Err(DockyardError::ImageBuild {
            tag: tag.to_string(),
            reason: crate::orchestration::build_error_output(&all_output.join("\n"), ""),
        });
    }

    Ok(())
}

#[async_trait]
impl Builder for RuntimeBuilder {
    async fn build_and_test(
        &self,
        out: &mut (dyn Write + Send),
        tags: &ImageTags,
        artifacts: &[Artifact],
    ) -> DockyardResult<Vec<BuildResult>> {
        let mut results = Vec::with_capacity(artifacts.len());

        for artifact in artifacts {
            let tag = tags
                .get(&artifact.image)
                .ok_or_else(|| DockyardError::MissingTag(artifact.image.clone()))?;
            results.push(self.build_one(out, artifact, tag).await?);
        }

        Ok(results)
    }
}
