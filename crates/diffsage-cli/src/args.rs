use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "diffsage")]
#[command(about = "diffsage - review a GitHub pull request or GitLab merge request with a chat model")]
#[command(version)]
pub struct Cli {
    /// URL of the pull request or merge request page
    #[arg(required_unless_present = "clear_cache")]
    pub url: Option<String>,

    /// Title of the change (defaults to the page title)
    #[arg(short, long)]
    pub title: Option<String>,

    /// Ignore a cached review and ask the model again
    #[arg(short, long)]
    pub rerun: bool,

    /// Write the rendered HTML to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Chat model to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// Review language (en, fr)
    #[arg(short, long)]
    pub language: Option<String>,

    /// Settings file to read instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Empty the session cache and exit
    #[arg(long)]
    pub clear_cache: bool,

    /// Log debug output to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Load settings and apply command-line overrides.
    pub fn settings(&self) -> anyhow::Result<diffsage_core::Settings> {
        let mut settings = match self.config {
            Some(ref path) => diffsage_core::Settings::load_from(path),
            None => diffsage_core::Settings::load(),
        };
        if let Some(ref model) = self.model {
            settings.llm.model = model.clone();
        }
        if let Some(ref language) = self.language {
            settings.review.language = language.parse()?;
        }
        Ok(settings)
    }
}
