use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use diffsage_cli::{Cli, TerminalRenderer};
use diffsage_core::{
    FileSessionCache, HttpPageInspector, HttpPatchFetcher, Popup, PopupServices, PopupState,
    SessionCache, Tab,
};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut cache = FileSessionCache::open_default();
    if cli.clear_cache {
        cache.clear().context("Failed to clear the session cache")?;
        eprintln!("Session cache cleared ({})", cache.path().display());
        return Ok(ExitCode::SUCCESS);
    }

    let settings = cli.settings()?;
    let url = cli.url.clone().context("A pull request or merge request URL is required")?;
    eprintln!("{url}");

    let inspector = HttpPageInspector::new()?.with_github_token(settings.github_token());
    let fetcher = HttpPatchFetcher::new()?.with_tokens(settings.github_token(), settings.gitlab_token());

    let mut tab = Tab::new(url, cli.title.clone().unwrap_or_default());
    if tab.title.is_empty() {
        match inspector.page_title(&tab).await {
            Ok(Some(title)) => tab.title = title,
            Ok(None) => {}
            Err(e) => tracing::warn!("Could not read the page title: {}", e),
        }
    }

    let mut renderer = TerminalRenderer::new(std::io::stderr());
    let state = {
        let mut popup = Popup::new(
            PopupServices {
                settings: &settings,
                inspector: &inspector,
                fetcher: &fetcher,
                connector: &settings,
            },
            &mut cache,
            &mut renderer,
        );
        popup.open(&tab).await;
        if cli.rerun && popup.served_from_cache() {
            popup.rerun().await;
        }
        popup.state().clone()
    };

    match state {
        PopupState::Done { html, failed } => {
            match cli.output {
                Some(ref path) => std::fs::write(path, &html)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => print!("{html}"),
            }
            Ok(if failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        _ => Ok(ExitCode::from(2)),
    }
}
