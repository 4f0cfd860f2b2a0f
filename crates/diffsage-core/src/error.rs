use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Only GitHub or GitLab (SaaS & self-hosted) are supported.")]
    Unsupported,

    #[error("Please open a specific Pull Request or Merge Request on {provider}")]
    NotAChangePage { provider: String },

    #[error("Please add your OpenAI API key to the diffsage settings.")]
    MissingApiKey,

    #[error("Failed to fetch diff: {0}")]
    DiffFetch(String),

    #[error("{0}")]
    Llm(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl ReviewError {
    pub fn not_a_change_page(provider: impl Into<String>) -> Self {
        Self::NotAChangePage {
            provider: provider.into(),
        }
    }

    /// Errors raised before any review work starts; the popup closes on its own.
    pub fn is_page_error(&self) -> bool {
        matches!(self, Self::Unsupported | Self::NotAChangePage { .. })
    }
}

pub type Result<T> = std::result::Result<T, ReviewError>;
