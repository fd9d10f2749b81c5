//! Project manifest (`dockyard.toml`)
//!
//! Lists the artifacts a project builds. Discovered by walking up from the
//! current directory; artifact contexts are resolved relative to the
//! directory holding the manifest.

use super::schema::BuildConfig;
use crate::artifact::{Artifact, ArtifactType, CustomArtifact, DockerArtifact};
use crate::error::{DockyardError, DockyardResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Manifest file name
pub const PROJECT_FILE: &str = "dockyard.toml";

/// Parsed project manifest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    /// Artifacts in build order
    pub artifacts: Vec<ArtifactSpec>,

    /// Per-project build settings layered over the global config
    pub build: BuildOverrides,

    /// Directory containing the manifest
    #[serde(skip)]
    pub root: PathBuf,
}

/// One `[[artifacts]]` entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactSpec {
    pub image: String,
    /// Build context relative to the manifest directory
    pub context: Option<PathBuf>,
    pub docker: Option<DockerArtifact>,
    pub custom: Option<CustomArtifact>,
}

/// `[build]` table of the manifest; unset keys keep the global value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOverrides {
    pub push: Option<bool>,
    pub tag: Option<String>,
    /// Added to the globally configured insecure registries
    pub insecure_registries: Vec<String>,
}

impl BuildOverrides {
    /// Layer these overrides onto `build`
    pub fn apply(&self, build: &mut BuildConfig) {
        if let Some(push) = self.push {
            build.push = push;
        }
        if let Some(ref tag) = self.tag {
            build.tag = tag.clone();
        }
        for registry in &self.insecure_registries {
            if !build.insecure_registries.contains(registry) {
                build.insecure_registries.push(registry.clone());
            }
        }
    }
}

impl Project {
    /// Find the nearest `dockyard.toml` at or above `start`
    pub fn find(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(PROJECT_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Load and parse a manifest file
    pub async fn load(path: &Path) -> DockyardResult<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| DockyardError::io(format!("reading {}", path.display()), e))?;

        let mut project: Project =
            toml::from_str(&content).map_err(|e| DockyardError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        project.root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        debug!(
            "Loaded {} artifact(s) from {}",
            project.artifacts.len(),
            path.display()
        );
        Ok(project)
    }

    /// Discover and load the manifest for `start`
    pub async fn discover(start: &Path) -> DockyardResult<Self> {
        let path =
            Self::find(start).ok_or_else(|| DockyardError::ProjectNotFound(start.to_path_buf()))?;
        Self::load(&path).await
    }

    /// Resolve artifact descriptors, optionally restricted to `only`
    ///
    /// Manifest order is kept; names in `only` that are not declared are
    /// rejected.
    pub fn artifacts(&self, only: &[String]) -> DockyardResult<Vec<Artifact>> {
        if let Some(unknown) = only
            .iter()
            .find(|name| !self.artifacts.iter().any(|spec| &spec.image == *name))
        {
            return Err(DockyardError::UnknownArtifact(unknown.clone()));
        }

        self.artifacts
            .iter()
            .filter(|spec| only.is_empty() || only.contains(&spec.image))
            .map(|spec| self.resolve(spec))
            .collect()
    }

    fn resolve(&self, spec: &ArtifactSpec) -> DockyardResult<Artifact> {
        let invalid = |reason: String| DockyardError::ConfigInvalid {
            path: self.root.join(PROJECT_FILE),
            reason,
        };

        if spec.image.trim().is_empty() {
            return Err(invalid("artifact without an image name".to_string()));
        }

        let kind = match (&spec.docker, &spec.custom) {
            (Some(_), Some(_)) => {
                return Err(invalid(format!(
                    "{}: set either docker or custom, not both",
                    spec.image
                )))
            }
            (Some(docker), None) => ArtifactType::Docker(docker.clone()),
            (None, Some(custom)) => ArtifactType::Custom(custom.clone()),
            (None, None) => ArtifactType::Docker(DockerArtifact::default()),
        };

        let workspace = match &spec.context {
            Some(context) => self.root.join(context),
            None => self.root.clone(),
        };

        Ok(Artifact {
            image: spec.image.clone(),
            workspace,
            kind,
        })
    }
}
