use crate::constants::defaults;
use crate::error::{Result, ReviewError};
use crate::page::{ChangeReference, Provider};

/// Downloads the raw patch of a change.
#[async_trait::async_trait]
pub trait PatchFetcher: Send + Sync {
    async fn fetch_patch(&self, change: &ChangeReference) -> Result<String>;
}

pub struct HttpPatchFetcher {
    client: reqwest::Client,
    github_token: Option<String>,
    gitlab_token: Option<String>,
}

impl HttpPatchFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(defaults::USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            github_token: None,
            gitlab_token: None,
        })
    }

    pub fn with_tokens(mut self, github: Option<String>, gitlab: Option<String>) -> Self {
        self.github_token = github;
        self.gitlab_token = gitlab;
        self
    }
}

#[async_trait::async_trait]
impl PatchFetcher for HttpPatchFetcher {
    async fn fetch_patch(&self, change: &ChangeReference) -> Result<String> {
        tracing::info!("Fetching patch {}", change.diff_url);

        let mut request = self.client.get(&change.diff_url);
        match (change.provider, &self.github_token, &self.gitlab_token) {
            (Provider::GitHub, Some(token), _) => request = request.bearer_auth(token),
            (Provider::GitLab, _, Some(token)) => request = request.header("PRIVATE-TOKEN", token),
            _ => {}
        }

        let response = request
            .send()
            .await
            .map_err(|e| ReviewError::DiffFetch(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ReviewError::DiffFetch(format!(
                "{} returned {}",
                change.diff_url, status
            )));
        }
        response
            .text()
            .await
            .map_err(|e| ReviewError::DiffFetch(e.to_string()))
    }
}
