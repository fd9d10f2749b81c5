//! Image build request shared by runtime implementations

use crate::artifact::DockerArtifact;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Everything a runtime needs to build one Dockerfile artifact
#[derive(Debug, Clone)]
pub struct BuildSpec {
    /// Build context directory
    pub context_dir: PathBuf,
    /// Dockerfile path, relative to the context
    pub dockerfile: String,
    /// Tag to apply to the built image
    pub tag: String,
    /// Build arguments; `None` forwards the value from the environment
    pub build_args: BTreeMap<String, Option<String>>,
    /// Multi-stage target
    pub target: Option<String>,
}

impl BuildSpec {
    pub fn from_docker(workspace: &Path, docker: &DockerArtifact, tag: &str) -> Self {
        Self {
            context_dir: workspace.to_path_buf(),
            dockerfile: docker.dockerfile.clone(),
            tag: tag.to_string(),
            build_args: docker.build_args.clone(),
            target: docker.target.clone(),
        }
    }

    /// Arguments for `<runtime> build`
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "build".to_string(),
            "-t".to_string(),
            self.tag.clone(),
            "-f".to_string(),
            self.context_dir
                .join(&self.dockerfile)
                .display()
                .to_string(),
        ];

        for (key, value) in &self.build_args {
            args.push("--build-arg".to_string());
            match value {
                Some(v) => args.push(format!("{}={}", key, v)),
                None => args.push(key.clone()),
            }
        }

        if let Some(ref target) = self.target {
            args.push("--target".to_string());
            args.push(target.clone());
        }

        args.push(self.context_dir.display().to_string());
        args
    }
}
