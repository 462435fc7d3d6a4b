//! Release publishing
//!
//! A release is described by a [`ReleaseDescriptor`] and handed to a
//! [`ReleasePublisher`]. The GitHub publisher posts the descriptor to the
//! REST API's create-release endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shipyard_core::Version;
use tracing::{debug, info};

const DEFAULT_API_URL: &str = "https://api.github.com";

/// Payload of GitHub's create-release call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseDescriptor {
    pub tag_name: String,

    #[serde(rename = "name")]
    pub title: String,

    #[serde(rename = "body")]
    pub notes: String,

    pub draft: bool,
    pub prerelease: bool,
}

impl ReleaseDescriptor {
    /// Descriptor for a built version, using the changelog as release notes.
    pub fn for_version(version: &Version, changelog: &str) -> Self {
        let tag_name = version.tag_name();
        let notes = if changelog.trim().is_empty() {
            format!("Automatic release {}", tag_name)
        } else {
            changelog.to_string()
        };
        ReleaseDescriptor {
            title: format!("Release {}", tag_name),
            tag_name,
            notes,
            draft: false,
            prerelease: false,
        }
    }
}

/// A release the host accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedRelease {
    pub tag_name: String,
    pub url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("release {tag} rejected with HTTP {status}: {body}")]
    Rejected { tag: String, status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("invalid repository '{0}': expected OWNER/REPO")]
    InvalidRepository(String),
}

impl From<reqwest::Error> for PublishError {
    fn from(err: reqwest::Error) -> Self {
        PublishError::Http(err.to_string())
    }
}

/// Creates releases on a hosting service.
#[async_trait]
pub trait ReleasePublisher: Send + Sync {
    /// Short name used in logs and outcome details.
    fn name(&self) -> &str;

    async fn create_release(
        &self,
        descriptor: &ReleaseDescriptor,
    ) -> Result<PublishedRelease, PublishError>;
}

/// GitHub credentials and target repository.
#[derive(Clone)]
pub struct GithubConfig {
    /// API base, `https://api.github.com` unless overridden.
    pub api_url: String,
    /// `OWNER/REPO`
    pub repository: String,
    pub token: String,
}

impl std::fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubConfig")
            .field("api_url", &self.api_url)
            .field("repository", &self.repository)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl GithubConfig {
    pub fn new(repository: &str, token: &str) -> Self {
        GithubConfig {
            api_url: DEFAULT_API_URL.to_string(),
            repository: repository.to_string(),
            token: token.to_string(),
        }
    }

    /// Read `GITHUB_TOKEN`, `GITHUB_REPOSITORY` and `GITHUB_API_URL`.
    ///
    /// Returns `None` unless both the token and repository are set.
    pub fn from_env() -> Option<Self> {
        let token = non_empty_var("GITHUB_TOKEN")?;
        let repository = non_empty_var("GITHUB_REPOSITORY")?;
        let api_url = non_empty_var("GITHUB_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Some(GithubConfig {
            api_url,
            repository,
            token,
        })
    }

    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.to_string();
        self
    }

    /// `{api}/repos/{owner}/{repo}/releases`
    pub fn releases_url(&self) -> String {
        format!(
            "{}/repos/{}/releases",
            self.api_url.trim_end_matches('/'),
            self.repository
        )
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Deserialize)]
struct CreatedRelease {
    html_url: Option<String>,
}

/// Publishes releases through the GitHub REST API.
pub struct GithubReleasePublisher {
    config: GithubConfig,
    http_client: reqwest::Client,
}

impl GithubReleasePublisher {
    pub fn new(config: GithubConfig) -> Result<Self, PublishError> {
        let valid = config
            .repository
            .split_once('/')
            .is_some_and(|(owner, repo)| !owner.is_empty() && !repo.is_empty() && !repo.contains('/'));
        if !valid {
            return Err(PublishError::InvalidRepository(config.repository));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(format!("shipyard/{}", shipyard_core::VERSION))
            .build()?;

        Ok(GithubReleasePublisher {
            config,
            http_client,
        })
    }
}

#[async_trait]
impl ReleasePublisher for GithubReleasePublisher {
    fn name(&self) -> &str {
        "github"
    }

    async fn create_release(
        &self,
        descriptor: &ReleaseDescriptor,
    ) -> Result<PublishedRelease, PublishError> {
        let url = self.config.releases_url();
        debug!(url = %url, tag = %descriptor.tag_name, "Creating GitHub release");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.config.token)
            .header("Accept", "application/vnd.github+json")
            .json(descriptor)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected {
                tag: descriptor.tag_name.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let created: CreatedRelease = response.json().await?;
        info!(tag = %descriptor.tag_name, url = ?created.html_url, "GitHub release created");

        Ok(PublishedRelease {
            tag_name: descriptor.tag_name.clone(),
            url: created.html_url,
        })
    }
}
