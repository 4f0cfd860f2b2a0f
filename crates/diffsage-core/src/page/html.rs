use std::collections::HashMap;

use scraper::{Html, Selector};
use tokio::sync::Mutex;

use crate::constants::{defaults, endpoints, selectors};
use crate::error::{Result, ReviewError};
use crate::page::{PageInspector, Provider, Tab};

/// Inspects a tab by downloading its HTML and querying it with CSS selectors.
/// Each URL is downloaded once per inspector.
pub struct HttpPageInspector {
    client: reqwest::Client,
    github_token: Option<String>,
    pages: Mutex<HashMap<String, String>>,
}

impl HttpPageInspector {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(defaults::USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            github_token: None,
            pages: Mutex::new(HashMap::new()),
        })
    }

    /// Token sent along with requests to github.com pages.
    pub fn with_github_token(mut self, token: Option<String>) -> Self {
        self.github_token = token;
        self
    }

    async fn page(&self, tab: &Tab) -> Result<String> {
        let mut pages = self.pages.lock().await;
        if let Some(html) = pages.get(&tab.url) {
            return Ok(html.clone());
        }

        let mut request = self.client.get(&tab.url);
        if tab.host().as_deref() == Some(endpoints::GITHUB_HOST) {
            if let Some(ref token) = self.github_token {
                request = request.bearer_auth(token);
            }
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ReviewError::Other(format!(
                "Page request returned {}",
                response.status()
            )));
        }
        let html = response.text().await?;
        pages.insert(tab.url.clone(), html.clone());
        Ok(html)
    }

    /// The page's `<title>`, used when no title is given explicitly.
    pub async fn page_title(&self, tab: &Tab) -> Result<Option<String>> {
        let html = self.page(tab).await?;
        title_from_html(&html)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ReviewError::Other(format!("Bad selector {css}: {e}")))
}

pub(crate) fn count_gitlab_meta(html: &str) -> Result<usize> {
    let document = Html::parse_document(html);
    let meta = selector(selectors::GITLAB_META)?;
    Ok(document.select(&meta).count())
}

pub(crate) fn title_from_html(html: &str) -> Result<Option<String>> {
    let document = Html::parse_document(html);
    let title = selector("title")?;
    Ok(document
        .select(&title)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty()))
}

pub(crate) fn description_from_html(html: &str, provider: Provider) -> Result<Option<String>> {
    let document = Html::parse_document(html);
    let description = match provider {
        Provider::GitHub => {
            let body = selector(selectors::GITHUB_DESCRIPTION)?;
            document
                .select(&body)
                .next()
                .map(|el| el.text().collect::<String>())
        }
        Provider::GitLab => {
            let textarea = selector(selectors::GITLAB_DESCRIPTION)?;
            document.select(&textarea).next().and_then(|el| {
                el.value()
                    .attr(selectors::GITLAB_DESCRIPTION_ATTR)
                    .map(|s| s.to_string())
            })
        }
    };
    Ok(description)
}

#[async_trait::async_trait]
impl PageInspector for HttpPageInspector {
    async fn gitlab_meta_count(&self, tab: &Tab) -> Result<usize> {
        let html = self.page(tab).await?;
        count_gitlab_meta(&html)
    }

    async fn query_description(&self, tab: &Tab, provider: Provider) -> Result<Option<String>> {
        let html = self.page(tab).await?;
        description_from_html(&html, provider)
    }
}
