//! Image reference parsing
//!
//! Splits `[registry/]repository[:tag][@digest]` into the pieces needed
//! to address a registry's manifest endpoint, applying the Docker Hub
//! defaults for short names.

use crate::error::{DockyardError, DockyardResult};

/// Registry used when a reference names none
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// API host that serves Docker Hub
const DOCKER_HUB_API_HOST: &str = "registry-1.docker.io";

/// A parsed image reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry host (with port, if any)
    pub registry: String,
    /// Repository path inside the registry
    pub repository: String,
    /// Tag or digest to resolve
    pub reference: String,
}

impl ImageReference {
    /// Parse an image reference
    pub fn parse(image: &str) -> DockyardResult<Self> {
        let image = image.trim();
        if image.is_empty() || image.contains(char::is_whitespace) {
            return Err(DockyardError::InvalidReference(image.to_string()));
        }

        let (name, digest) = split_digest(image);

        // A colon after the last slash separates the tag
        let (name, tag) = match name.rfind(':') {
            Some(idx) if !name[idx..].contains('/') => (&name[..idx], Some(&name[idx + 1..])),
            _ => (name, None),
        };

        let (registry, repository) = match name.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (first.to_string(), rest.to_string())
            }
            _ => (DEFAULT_REGISTRY.to_string(), name.to_string()),
        };

        let repository = if registry == DEFAULT_REGISTRY && !repository.contains('/') {
            format!("library/{}", repository)
        } else {
            repository
        };

        if repository.is_empty() || repository.ends_with('/') {
            return Err(DockyardError::InvalidReference(image.to_string()));
        }

        let reference = match (digest, tag) {
            (Some(digest), _) => digest.to_string(),
            (None, Some(tag)) if !tag.is_empty() => tag.to_string(),
            (None, Some(_)) => return Err(DockyardError::InvalidReference(image.to_string())),
            (None, None) => "latest".to_string(),
        };

        Ok(Self {
            registry,
            repository,
            reference,
        })
    }

    /// Host serving the registry API
    pub fn api_host(&self) -> &str {
        if self.registry == DEFAULT_REGISTRY {
            DOCKER_HUB_API_HOST
        } else {
            &self.registry
        }
    }

    /// Manifest endpoint for this reference
    pub fn manifest_url(&self, scheme: &str) -> String {
        format!(
            "{}://{}/v2/{}/manifests/{}",
            scheme,
            self.api_host(),
            self.repository,
            self.reference
        )
    }
}

/// Split `name@sha256:...` into the name and the digest
pub fn split_digest(tag: &str) -> (&str, Option<&str>) {
    match tag.split_once('@') {
        Some((name, digest)) if !digest.is_empty() => (name, Some(digest)),
        Some((name, _)) => (name, None),
        None => (tag, None),
    }
}
