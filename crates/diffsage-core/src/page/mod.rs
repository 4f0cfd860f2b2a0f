//! Page context extraction: which forge hosts the tab and what the author
//! wrote about the change.

mod html;

pub use html::HttpPageInspector;

use serde::{Deserialize, Serialize};

use crate::constants::endpoints;
use crate::diff::locate_diff;
use crate::error::Result;

/// The page the review is requested for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub url: String,
    pub title: String,
}

impl Tab {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
        }
    }

    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    GitHub,
    GitLab,
}

impl Provider {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GitHub => "GitHub",
            Self::GitLab => "GitLab",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything the review needs to know about one pull/merge request.
/// Built once per popup open and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeReference {
    pub provider: Provider,
    pub diff_url: String,
    pub title: String,
    pub description: String,
}

/// Queries run against the page shown in a tab.
#[async_trait::async_trait]
pub trait PageInspector: Send + Sync {
    /// Number of `<meta content="GitLab">` tags on the page.
    async fn gitlab_meta_count(&self, tab: &Tab) -> Result<usize>;

    /// Author-written description of the change, if the page has one.
    async fn query_description(&self, tab: &Tab, provider: Provider) -> Result<Option<String>>;
}

/// GitHub is recognised by host; any other host is GitLab when the page
/// carries the GitLab meta tag, which also covers self-hosted instances.
pub async fn detect_provider(tab: &Tab, inspector: &dyn PageInspector) -> Option<Provider> {
    if tab.host().as_deref() == Some(endpoints::GITHUB_HOST) {
        return Some(Provider::GitHub);
    }
    match inspector.gitlab_meta_count(tab).await {
        Ok(count) if count > 0 => Some(Provider::GitLab),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("GitLab detection failed for {}: {}", tab.url, e);
            None
        }
    }
}

/// Missing elements and failed queries give an empty description.
pub async fn extract_description(
    tab: &Tab,
    provider: Provider,
    inspector: &dyn PageInspector,
) -> String {
    match inspector.query_description(tab, provider).await {
        Ok(Some(text)) => text,
        Ok(None) => String::new(),
        Err(e) => {
            tracing::warn!("Could not read the change description: {}", e);
            String::new()
        }
    }
}

/// Detect the provider, derive the patch URL and collect the description.
pub async fn inspect_tab(tab: &Tab, inspector: &dyn PageInspector) -> Result<ChangeReference> {
    let provider = detect_provider(tab, inspector).await;
    let diff_url = locate_diff(provider, &tab.url)?;
    // locate_diff only succeeds for a detected provider.
    let provider = provider.ok_or(crate::error::ReviewError::Unsupported)?;
    let description = extract_description(tab, provider, inspector).await;

    Ok(ChangeReference {
        provider,
        diff_url,
        title: tab.title.clone(),
        description,
    })
}
