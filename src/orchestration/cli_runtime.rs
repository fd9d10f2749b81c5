//! Container runtime driven through the podman or docker CLI
//!
//! Both CLIs accept the same `build`, `image inspect` and `push`
//! invocations; only digest reporting after a push differs.

use crate::error::{DockyardError, DockyardResult};
use crate::orchestration::build_spec::BuildSpec;
use crate::orchestration::runtime::ContainerRuntime;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Which CLI to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeKind {
    Podman,
    Docker,
}

impl RuntimeKind {
    /// Parse a configured binary name
    pub fn from_binary(name: &str) -> Option<Self> {
        match name {
            "podman" => Some(Self::Podman),
            "docker" => Some(Self::Docker),
            _ => None,
        }
    }

    fn binary(&self) -> &'static str {
        match self {
            Self::Podman => "podman",
            Self::Docker => "docker",
        }
    }
}

/// Container runtime backed by a local CLI
pub struct CliRuntime {
    kind: RuntimeKind,
}

impl CliRuntime {
    /// Create a runtime for the given CLI
    pub fn new(kind: RuntimeKind) -> Self {
        Self { kind }
    }

    /// Execute a runtime command and return the output
    async fn exec(&self, args: &[&str]) -> DockyardResult<std::process::Output> {
        let binary = self.kind.binary();
        debug!("Executing: {} {:?}", binary, args);

        Command::new(binary)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| DockyardError::command_failed(format!("{} {:?}", binary, args), e))
    }

    /// Spawn a runtime command with stdout/stderr piped for streaming
    fn spawn_piped(&self, args: &[String]) -> DockyardResult<tokio::process::Child> {
        let binary = self.kind.binary();
        debug!("Spawning: {} {:?}", binary, args);

        Command::new(binary)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DockyardError::command_failed(format!("{} {:?}", binary, args), e))
    }

    /// Push with podman, reading the digest from `--digestfile`
    async fn push_podman(&self, tag: &str) -> DockyardResult<String> {
        let digest_file = std::env::temp_dir().join(format!(
            "dockyard-{}-{}.digest",
            std::process::id(),
            sanitize(tag)
        ));
        let digest_arg = digest_file.display().to_string();

        let output = self
            .exec(&["push", "--digestfile", &digest_arg, tag])
            .await?;

        if !output.status.success() {
            let _ = tokio::fs::remove_file(&digest_file).await;
            return Err(push_error(tag, &output));
        }

        let digest = tokio::fs::read_to_string(&digest_file)
            .await
            .map_err(|e| DockyardError::io(format!("reading {}", digest_file.display()), e));
        let _ = tokio::fs::remove_file(&digest_file).await;

        let digest = digest?.trim().to_string();
        if digest.is_empty() {
            return Err(DockyardError::DigestNotFound(tag.to_string()));
        }
        Ok(digest)
    }

    /// Push with docker, reading the digest from its status output
    async fn push_docker(&self, tag: &str) -> DockyardResult<String> {
        let output = self.exec(&["push", tag]).await?;

        if !output.status.success() {
            return Err(push_error(tag, &output));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_push_digest(&stdout).ok_or_else(|| DockyardError::DigestNotFound(tag.to_string()))
    }
}

fn push_error(tag: &str, output: &std::process::Output) -> DockyardError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    DockyardError::ImagePush {
        tag: tag.to_string(),
        reason: super::build_error_output(&stdout, &stderr),
    }
}

fn sanitize(tag: &str) -> String {
    tag.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Extract `sha256:...` from a `docker push` summary line
///
/// e.g. `v1: digest: sha256:abcd... size: 1234`
fn parse_push_digest(output: &str) -> Option<String> {
    output.lines().rev().find_map(|line| {
        let rest = line.split("digest: ").nth(1)?;
        let digest = rest.split_whitespace().next()?;
        digest.starts_with("sha256:").then(|| digest.to_string())
    })
}

/// Normalize an image ID to `sha256:<hex>`
///
/// Podman prints bare hex IDs, docker prefixes the algorithm.
fn normalize_image_id(raw: &str) -> Option<String> {
    let id = raw.trim();
    if id.is_empty() {
        None
    } else if id.contains(':') {
        Some(id.to_string())
    } else {
        Some(format!("sha256:{}", id))
    }
}

/// Whether `image inspect` failed because the image does not exist
fn is_missing_image(stderr: &str) -> bool {
    let stderr = stderr.to_ascii_lowercase();
    stderr.contains("no such image")
        || stderr.contains("no such object")
        || stderr.contains("image not known")
}

#[async_trait]
impl ContainerRuntime for CliRuntime {
    async fn is_available(&self) -> DockyardResult<bool> {
        let status = Command::new(self.kind.binary())
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        Ok(status.map(|s| s.success()).unwrap_or(false))
    }

    async fn image_digest(&self, image: &str) -> DockyardResult<String> {
        let output = self
            .exec(&["image", "inspect", "--format", "{{.Id}}", image])
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_missing_image(&stderr) {
                debug!("Image not present locally: {}", image);
                return Err(DockyardError::DigestNotFound(image.to_string()));
            }
            return Err(DockyardError::command_exec(
                format!("{} image inspect {}", self.kind.binary(), image),
                stderr.trim(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        normalize_image_id(&stdout).ok_or_else(|| DockyardError::DigestNotFound(image.to_string()))
    }

    async fn build_image(
        &self,
        spec: &BuildSpec,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> DockyardResult<()> {
        let mut child = self.spawn_piped(&spec.to_args())?;

        let all_output = super::stream_child_output(&mut child, on_output).await?;

        let status = child
            .wait()
            .await
            .map_err(|e| DockyardError::command_failed(format!("{} build", self.kind.binary()), e))?;

        if !status.success() {
            let combined = all_output.join("\n");
            let tail = super::build_error_output(&combined, "");
            return Err(DockyardError::ImageBuild {
                tag: spec.tag.clone(),
                reason: tail,
            });
        }

        info!("Built image {}", spec.tag);
        Ok(())
    }

    async fn push_image(&self, tag: &str) -> DockyardResult<String> {
        info!("Pushing image: {}", tag);
        let digest = match self.kind {
            RuntimeKind::Podman => self.push_podman(tag).await?,
            RuntimeKind::Docker => self.push_docker(tag).await?,
        };
        debug!("Pushed {} as {}", tag, digest);
        Ok(digest)
    }

    fn runtime_name(&self) -> &'static str {
        match self.kind {
            RuntimeKind::Podman => "Podman",
            RuntimeKind::Docker => "Docker",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_kind_from_binary() {
        assert_eq!(RuntimeKind::from_binary("podman"), Some(RuntimeKind::Podman));
        assert_eq!(RuntimeKind::from_binary("docker"), Some(RuntimeKind::Docker));
        assert_eq!(RuntimeKind::from_binary("nerdctl"), None);
    }

    #[test]
    fn missing_image_detected_for_both_runtimes() {
        assert!(is_missing_image("Error: app:v1: image not known"));
        assert!(is_missing_image(
            "Error response from daemon: No such image: app:v1"
        ));
        assert!(is_missing_image("Error: No such object: app:v1"));
        assert!(!is_missing_image("Cannot connect to the Docker daemon"));
    }

    #[test]
    fn runtime_name() {
        assert_eq!(CliRuntime::new(RuntimeKind::Podman).runtime_name(), "Podman");
        assert_eq!(CliRuntime::new(RuntimeKind::Docker).runtime_name(), "Docker");
    }

    #[test]
    fn docker_push_digest_parsed() {
        let output = "\
The push refers to repository [localhost:5000/app]
5f70bf18a086: Pushed
v1: digest: sha256:35bdf2619f59e6f2372a92cb5486f4a0bf9b86e0e89ee0672864db6ed9c51539 size: 528
";
        assert_eq!(
            parse_push_digest(output).as_deref(),
            Some("sha256:35bdf2619f59e6f2372a92cb5486f4a0bf9b86e0e89ee0672864db6ed9c51539")
        );
        assert_eq!(parse_push_digest("Pushed\n"), None);
    }

    #[test]
    fn image_ids_normalized() {
        assert_eq!(normalize_image_id("abc123\n").as_deref(), Some("sha256:abc123"));
        assert_eq!(
            normalize_image_id("sha256:abc123").as_deref(),
            Some("sha256:abc123")
        );
        assert_eq!(normalize_image_id("  "), None);
    }

    #[test]
    fn tag_sanitized_for_file_names() {
        assert_eq!(sanitize("localhost:5000/app:v1"), "localhost_5000_app_v1");
    }
}
