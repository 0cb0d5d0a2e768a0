//! Utility functions

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Version information for the worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Cooldown options for exponential backoff
#[derive(Debug, Clone)]
pub struct CooldownOptions {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for CooldownOptions {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300), // 5 minutes
            multiplier: 2.0,
        }
    }
}

/// Calculate exponential backoff delay
pub fn calc_exp_backoff(options: &CooldownOptions, attempt: u32) -> Duration {
    let delay_secs = options.base_delay.as_secs_f64() * options.multiplier.powi(attempt as i32);
    let capped_delay = delay_secs.min(options.max_delay.as_secs_f64());
    Duration::from_secs_f64(capped_delay)
}

/// Extract the short repository name from a clone URL.
///
/// `https://github.com/vky5/RaktConnect.git` -> `RaktConnect`
pub fn repo_short_name(repo_url: &str) -> String {
    let last = repo_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(repo_url);
    last.trim_end_matches(".git").to_string()
}

/// Lowercased short repository name, safe for use inside an image tag.
pub fn slugify(repo_url: &str) -> String {
    repo_short_name(repo_url).to_lowercase()
}

/// Derive the image name for a deployment:
/// `<namespace>/<slug(repository)>-<first 8 chars of deployment id>`
pub fn derive_image_name(namespace: &str, repo_url: &str, deployment_id: &str) -> String {
    format!("{}/{}-{}", namespace, slugify(repo_url), short_id(deployment_id))
}

/// Derive the container name for a deployment:
/// `<namespace>-<first 8 chars of deployment id>`
pub fn derive_container_name(namespace: &str, deployment_id: &str) -> String {
    format!("{}-{}", namespace, short_id(deployment_id))
}

/// First 8 characters of a deployment id (the whole id when shorter).
pub fn short_id(deployment_id: &str) -> &str {
    let end = deployment_id
        .char_indices()
        .nth(8)
        .map(|(i, _)| i)
        .unwrap_or(deployment_id.len());
    &deployment_id[..end]
}

/// Inject an access token into a clone URL as a basic-auth credential:
/// `https://<token>@github.com/vky5/RaktConnect.git`.
///
/// Falls back to returning the URL untouched when it does not parse; the
/// clone collaborator will surface the failure. The returned string holds
/// the token and must never be logged.
pub fn inject_token_in_url(repo_url: &str, token: &SecretString) -> String {
    match Url::parse(repo_url) {
        Ok(mut url) => {
            if url.set_username(token.expose_secret()).is_err() {
                return repo_url.to_string();
            }
            url.to_string()
        }
        Err(_) => repo_url.to_string(),
    }
}

/// Parse a string-encoded port number from a job message.
///
/// Empty strings and garbage both yield `None`; the message format carries
/// ports as strings and an absent port is encoded as `""`.
pub fn parse_port(raw: &str) -> Option<u16> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse().ok()
}
