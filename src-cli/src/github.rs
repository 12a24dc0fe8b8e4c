//! Repository listing through the GitHub REST API.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use repomirror::RepositoryRef;

const API_BASE: &str = "https://api.github.com";

/// Environment variable holding a personal access token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Maximum length for error bodies echoed back to the user.
const MAX_ERROR_BODY_LENGTH: usize = 200;

fn truncate_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &body[..end])
    } else {
        body.to_string()
    }
}

/// The fields of a repository listing entry we care about.
#[derive(Debug, Deserialize)]
struct ApiRepository {
    name: String,
    #[serde(default)]
    ssh_url: Option<String>,
    #[serde(default)]
    clone_url: Option<String>,
}

impl ApiRepository {
    /// Prefers the ssh endpoint; falls back to https.
    fn into_reference(self) -> RepositoryRef {
        let url = self
            .ssh_url
            .filter(|url| !url.is_empty())
            .or(self.clone_url)
            .unwrap_or_default();
        RepositoryRef::new(self.name, url)
    }
}

/// Parses a `/users/<user>/repos` response body.
pub fn parse_listing(body: &str) -> Result<Vec<RepositoryRef>> {
    let repos: Vec<ApiRepository> =
        serde_json::from_str(body).context("Unexpected GitHub API JSON")?;
    Ok(repos.into_iter().map(ApiRepository::into_reference).collect())
}

pub struct GitHubClient {
    http: Client,
    token: Option<SecretString>,
}

impl GitHubClient {
    /// Client authenticated with `GITHUB_TOKEN` when set.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var(TOKEN_ENV)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(SecretString::from);

        if token.is_none() {
            warn!(
                "No {} set, GitHub API rate limit will be low",
                TOKEN_ENV
            );
        }
        Self::new(token)
    }

    pub fn new(token: Option<SecretString>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("repomirror/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http, token })
    }

    /// Lists up to 100 public repositories owned by `user`.
    pub async fn list_repositories(&self, user: &str) -> Result<Vec<RepositoryRef>> {
        let user = user.trim();
        if user.is_empty() {
            bail!("GitHub username required");
        }

        info!("Listing repositories for {}", user);
        let url = format!("{}/users/{}/repos?per_page=100", API_BASE, user);

        let mut request = self
            .http
            .get(&url)
            .header(ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("token {}", token.expose_secret()));
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read GitHub API response")?;

        if !status.is_success() {
            bail!("GitHub API returned {}: {}", status, truncate_body(&body));
        }

        let repos = parse_listing(&body)?;
        info!("Loaded {} repositories", repos.len());
        Ok(repos)
    }
}
