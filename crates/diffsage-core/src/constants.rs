/// diffsage: centralized constants.
/// Limits, endpoints and defaults shared across modules.

// ─── Models ───────────────────────────────────────────────────────────────────

pub mod models {
    pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
}

// ─── API Endpoints ────────────────────────────────────────────────────────────

pub mod endpoints {
    pub const OPENAI_BASE_URL: &str = "https://api.openai.com";
    pub const GITHUB_HOST: &str = "github.com";
    pub const GITHUB_PATCH_BASE_URL: &str = "https://patch-diff.githubusercontent.com/raw";
    pub const GITLAB_MERGE_REQUEST_MARKER: &str = "/-/merge_requests/";
}

// ─── Default Settings ─────────────────────────────────────────────────────────

pub mod defaults {
    pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
    pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";
    pub const GITLAB_TOKEN_ENV: &str = "GITLAB_TOKEN";
    /// Roughly 4096 tokens at ~4 characters each, minus a 1000 character margin.
    pub const MAX_CHUNK_CHARS: usize = 15_384;
    pub const CLOSE_DELAY_SECS: u64 = 4;
    pub const IGNORED_PATHS: &[&str] = &["lock.json"];
    pub const USER_AGENT: &str = "diffsage/0.1";
}

// ─── Page Selectors ───────────────────────────────────────────────────────────

pub mod selectors {
    pub const GITLAB_META: &str = r#"meta[content="GitLab"]"#;
    pub const GITHUB_DESCRIPTION: &str = ".markdown-body";
    pub const GITLAB_DESCRIPTION: &str = ".description textarea";
    pub const GITLAB_DESCRIPTION_ATTR: &str = "data-value";
}
