use crate::constants::endpoints;
use crate::error::{Result, ReviewError};
use crate::page::Provider;

/// Derive the raw patch URL for the change shown at `tab_url`.
///
/// GitHub pull requests map onto the patch-diff host, GitLab merge requests
/// serve their patch at the page URL plus `.patch`.
pub fn locate_diff(provider: Option<Provider>, tab_url: &str) -> Result<String> {
    match provider {
        Some(Provider::GitHub) => {
            github_patch_url(tab_url).ok_or_else(|| ReviewError::not_a_change_page("GitHub"))
        }
        Some(Provider::GitLab) if tab_url.contains(endpoints::GITLAB_MERGE_REQUEST_MARKER) => {
            Ok(gitlab_patch_url(tab_url))
        }
        Some(Provider::GitLab) => Err(ReviewError::not_a_change_page("GitLab")),
        None => Err(ReviewError::Unsupported),
    }
}

fn github_patch_url(tab_url: &str) -> Option<String> {
    let url = url::Url::parse(tab_url).ok()?;
    let segments: Vec<&str> = url.path_segments()?.collect();
    match segments.as_slice() {
        [org, repo, "pull", number, ..] if !org.is_empty() && !repo.is_empty() && !number.is_empty() => {
            Some(format!(
                "{}/{}/{}/pull/{}.patch",
                endpoints::GITHUB_PATCH_BASE_URL,
                org,
                repo,
                number
            ))
        }
        _ => None,
    }
}

fn gitlab_patch_url(tab_url: &str) -> String {
    let base = match url::Url::parse(tab_url) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => tab_url.to_string(),
    };
    format!("{}.patch", base.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn github_pull_request() {
        let url = locate_diff(Some(Provider::GitHub), "https://github.com/acme/widgets/pull/42");
        assert_eq!(
            url.unwrap(),
            "https://patch-diff.githubusercontent.com/raw/acme/widgets/pull/42.patch"
        );
    }

    #[test]
    fn github_pull_request_subpage() {
        let url = locate_diff(
            Some(Provider::GitHub),
            "https://github.com/acme/widgets/pull/42/files?w=1",
        );
        assert_eq!(
            url.unwrap(),
            "https://patch-diff.githubusercontent.com/raw/acme/widgets/pull/42.patch"
        );
    }

    #[test]
    fn github_non_pull_page() {
        let err = locate_diff(Some(Provider::GitHub), "https://github.com/acme/widgets/issues/3")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Please open a specific Pull Request or Merge Request on GitHub"
        );
    }

    #[test]
    fn github_pull_without_number() {
        assert!(locate_diff(Some(Provider::GitHub), "https://github.com/acme/widgets/pull/").is_err());
    }

    #[test]
    fn gitlab_merge_request() {
        let url = locate_diff(
            Some(Provider::GitLab),
            "https://gitlab.example.com/acme/widgets/-/merge_requests/7",
        );
        assert_eq!(
            url.unwrap(),
            "https://gitlab.example.com/acme/widgets/-/merge_requests/7.patch"
        );
    }

    #[test]
    fn gitlab_non_merge_request() {
        let err = locate_diff(Some(Provider::GitLab), "https://gitlab.example.com/acme/widgets")
            .unwrap_err();
        assert!(matches!(err, ReviewError::NotAChangePage { ref provider } if provider == "GitLab"));
    }

    #[test]
    fn unknown_provider() {
        let err = locate_diff(None, "https://bitbucket.org/acme/widgets/pull-requests/1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Only GitHub or GitLab (SaaS & self-hosted) are supported."
        );
    }
}
