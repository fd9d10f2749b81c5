//! Digest lookup against a remote registry
//!
//! Issues a `HEAD` on the manifest endpoint and reads the
//! `Docker-Content-Digest` header. Registries that answer 401 with a
//! Bearer challenge get an anonymous token exchange; credentials are the
//! runtime's business, not ours.

use super::reference::ImageReference;
use super::DigestSource;
use crate::error::{DockyardError, DockyardResult};
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;
use ureq::tls::TlsConfig;
use ureq::Agent;

/// Manifest media types we accept, newest first
const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.index.v1+json, \
application/vnd.docker.distribution.manifest.list.v2+json, \
application/vnd.oci.image.manifest.v1+json, \
application/vnd.docker.distribution.manifest.v2+json";

const DIGEST_HEADER: &str = "docker-content-digest";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolves digests by asking the registry named in each tag
pub struct RemoteDigestSource {
    insecure_registries: HashSet<String>,
    agent: Agent,
    insecure_agent: Agent,
}

impl RemoteDigestSource {
    /// `insecure_registries` are contacted without TLS verification, and
    /// over plain HTTP if TLS fails entirely.
    pub fn new(insecure_registries: HashSet<String>) -> Self {
        let agent: Agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build()
            .into();
        let insecure_agent: Agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(REQUEST_TIMEOUT))
            .tls_config(TlsConfig::builder().disable_verification(true).build())
            .build()
            .into();

        Self {
            insecure_registries,
            agent,
            insecure_agent,
        }
    }

    fn is_insecure(&self, registry: &str) -> bool {
        self.insecure_registries.contains(registry)
    }
}

#[async_trait]
impl DigestSource for RemoteDigestSource {
    async fn digest(&self, tag: &str) -> DockyardResult<String> {
        let reference = ImageReference::parse(tag)?;
        let insecure = self.is_insecure(&reference.registry);
        let agent = if insecure {
            self.insecure_agent.clone()
        } else {
            self.agent.clone()
        };
        let tag = tag.to_string();

        tokio::task::spawn_blocking(move || {
            match fetch_digest(&agent, &reference, "https", &tag) {
                Err(DockyardError::RegistryLookup { reason, .. }) if insecure => {
                    debug!("HTTPS lookup for {} failed ({}), retrying over HTTP", tag, reason);
                    fetch_digest(&agent, &reference, "http", &tag)
                }
                other => other,
            }
        })
        .await
        .map_err(|e| DockyardError::Internal(format!("registry lookup task failed: {}", e)))?
    }

    fn result_tag(&self, tag: &str, digest: &str) -> String {
        format!("{}@{}", tag, digest)
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

/// Blocking manifest HEAD with one anonymous-token retry
fn fetch_digest(
    agent: &Agent,
    reference: &ImageReference,
    scheme: &str,
    tag: &str,
) -> DockyardResult<String> {
    let url = reference.manifest_url(scheme);
    let lookup_error = |reason: String| DockyardError::RegistryLookup {
        reference: tag.to_string(),
        reason,
    };

    debug!("Resolving digest: HEAD {}", url);
    let response = agent
        .head(&url)
        .header("Accept", MANIFEST_ACCEPT)
        .call()
        .map_err(|e| lookup_error(e.to_string()))?;

    let response = if response.status().as_u16() == 401 {
        let challenge = response
            .headers()
            .get("www-authenticate")
            .and_then(|v| v.to_str().ok())
            .and_then(BearerChallenge::parse)
            .ok_or_else(|| lookup_error("unauthorized and no bearer challenge".to_string()))?;

        let token = exchange_token(agent, &challenge).map_err(lookup_error)?;
        agent
            .head(&url)
            .header("Accept", MANIFEST_ACCEPT)
            .header("Authorization", format!("Bearer {}", token))
            .call()
            .map_err(|e| lookup_error(e.to_string()))?
    } else {
        response
    };

    match response.status().as_u16() {
        200..=299 => response
            .headers()
            .get(DIGEST_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| DockyardError::DigestNotFound(tag.to_string())),
        404 => Err(DockyardError::DigestNotFound(tag.to_string())),
        status => Err(lookup_error(format!("registry returned HTTP {}", status))),
    }
}

/// Fetch an anonymous pull token for a bearer challenge
fn exchange_token(agent: &Agent, challenge: &BearerChallenge) -> Result<String, String> {
    debug!("Exchanging for anonymous token at: {}", challenge.realm);

    let mut request = agent.get(&challenge.realm);
    if let Some(ref service) = challenge.service {
        request = request.query("service", service);
    }
    if let Some(ref scope) = challenge.scope {
        request = request.query("scope", scope);
    }

    let mut response = request.call().map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!(
            "token exchange failed with status {}",
            response.status()
        ));
    }

    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| e.to_string())?;
    parse_token(&body).ok_or_else(|| "token not found in response".to_string())
}

fn parse_token(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("token")
        .or_else(|| value.get("access_token"))
        .and_then(|t| t.as_str())
        .map(str::to_string)
}

/// Parameters of a `WWW-Authenticate: Bearer ...` challenge
#[derive(Debug, Clone, PartialEq, Eq)]
struct BearerChallenge {
    realm: String,
    service: Option<String>,
    scope: Option<String>,
}

impl BearerChallenge {
    fn parse(header: &str) -> Option<Self> {
        let params = header.strip_prefix("Bearer ")?;
        let mut realm = None;
        let mut service = None;
        let mut scope = None;

        for param in split_params(params) {
            if let Some((key, value)) = param.split_once('=') {
                let value = value.trim().trim_matches('"').to_string();
                match key.trim() {
                    "realm" => realm = Some(value),
                    "service" => service = Some(value),
                    "scope" => scope = Some(value),
                    _ => {}
                }
            }
        }

        Some(Self {
            realm: realm?,
            service,
            scope,
        })
    }
}

/// Split challenge params on commas outside of quotes
///
/// Scopes may themselves contain commas (`repository:x:pull,push`).
fn split_params(params: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;

    for (idx, c) in params.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(params[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(params[start..].trim());
    parts.into_iter().filter(|p| !p.is_empty()).collect()
}
