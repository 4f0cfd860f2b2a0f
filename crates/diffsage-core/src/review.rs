use tokio::sync::mpsc::UnboundedSender;

use crate::config::Settings;
use crate::diff::{DiffChunker, PatchFetcher};
use crate::error::{Result, ReviewError};
use crate::llm::{ChatSession, ChatSessionState, LlmClient, SendOptions};
use crate::page::ChangeReference;
use crate::prompt::{PromptBuilder, PromptTexts};
use crate::render::render_answer;

/// Progress of a review run, in the order the popup should show it.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewEvent {
    /// A non-final prompt is in flight and `remaining` prompts follow it.
    Sending { remaining: usize, html: String },
    /// The final answer as streamed so far.
    Answer { text: String, html: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    pub html: String,
    pub failed: bool,
}

/// Creates chat clients once an API key is known.
pub trait LlmConnector: Send + Sync {
    fn connect(&self, api_key: &str) -> Box<dyn LlmClient>;
}

impl LlmConnector for Settings {
    fn connect(&self, api_key: &str) -> Box<dyn LlmClient> {
        self.build_llm_client(api_key)
    }
}

/// Send `prompts` one after another on `session`, each continuing from the
/// previous reply. Non-final prompts only report a status line; the final
/// prompt reports the streamed answer. The first failure stops the run.
pub async fn send_prompts(
    session: &mut ChatSession,
    prompts: &[String],
    texts: &PromptTexts,
    warning: Option<&str>,
    events: &UnboundedSender<ReviewEvent>,
) -> Result<String> {
    let mut state = ChatSessionState::default();
    let mut answer = String::new();

    for (index, prompt) in prompts.iter().enumerate() {
        let remaining = prompts.len() - index - 1;
        tracing::debug!(
            "Sending prompt {}/{} ({} chars)",
            index + 1,
            prompts.len(),
            prompt.chars().count()
        );

        let reply = if remaining > 0 {
            let status = texts.sending(remaining);
            let html = render_answer(&status, warning);
            let _ = events.send(ReviewEvent::Sending {
                remaining,
                html: html.clone(),
            });
            let mut on_progress = |_: &str| {
                let _ = events.send(ReviewEvent::Sending {
                    remaining,
                    html: html.clone(),
                });
            };
            session
                .send_message(
                    prompt,
                    SendOptions {
                        parent_message_id: state.last_message_id,
                        progress: Some(&mut on_progress as &mut (dyn FnMut(&str) + Send)),
                    },
                )
                .await?
        } else {
            let mut on_progress = |partial: &str| {
                let _ = events.send(ReviewEvent::Answer {
                    text: partial.to_string(),
                    html: render_answer(partial, warning),
                });
            };
            session
                .send_message(
                    prompt,
                    SendOptions {
                        parent_message_id: state.last_message_id,
                        progress: Some(&mut on_progress as &mut (dyn FnMut(&str) + Send)),
                    },
                )
                .await?
        };

        state.last_message_id = Some(reply.id);
        answer = reply.text;
    }

    Ok(answer)
}

/// Runs the whole review of one change: fetch, chunk, prompt, render.
pub struct Reviewer<'a> {
    settings: &'a Settings,
    fetcher: &'a dyn PatchFetcher,
    connector: &'a dyn LlmConnector,
}

impl<'a> Reviewer<'a> {
    pub fn new(
        settings: &'a Settings,
        fetcher: &'a dyn PatchFetcher,
        connector: &'a dyn LlmConnector,
    ) -> Self {
        Self {
            settings,
            fetcher,
            connector,
        }
    }

    /// Review `change`. Failures are rendered into the outcome rather than
    /// returned, so the popup always has something to show and cache.
    pub async fn review(
        &self,
        change: &ChangeReference,
        events: &UnboundedSender<ReviewEvent>,
    ) -> ReviewOutcome {
        let texts = PromptTexts::new(self.settings.review.language);
        let mut warning = None;

        match self.run(change, &texts, &mut warning, events).await {
            Ok(answer) => {
                tracing::info!("Review of {} complete", change.diff_url);
                ReviewOutcome {
                    html: render_answer(&answer, warning.as_deref()),
                    failed: false,
                }
            }
            Err(e) => {
                tracing::warn!("Review of {} failed: {}", change.diff_url, e);
                let message = match e {
                    ReviewError::MissingApiKey => texts.missing_api_key().to_string(),
                    other => other.to_string(),
                };
                ReviewOutcome {
                    html: render_answer(&message, warning.as_deref()),
                    failed: true,
                }
            }
        }
    }

    async fn run(
        &self,
        change: &ChangeReference,
        texts: &PromptTexts,
        warning: &mut Option<String>,
        events: &UnboundedSender<ReviewEvent>,
    ) -> Result<String> {
        let api_key = self.settings.api_key().ok_or(ReviewError::MissingApiKey)?;

        let patch = self.fetcher.fetch_patch(change).await?;

        let review = &self.settings.review;
        let chunked = DiffChunker::new(texts.hold_reply())
            .with_max_chars(review.max_chunk_chars)
            .with_ignored_paths(review.ignored_paths.clone())
            .chunk(&patch);
        if chunked.truncated {
            *warning = Some(texts.truncation_warning(review.max_chunk_chars));
        }

        let prompts = PromptBuilder::new(review.language).build(change, &chunked);
        tracing::info!(
            "Reviewing {} file(s) in {} prompt(s)",
            chunked.chunks.len(),
            prompts.len()
        );

        let mut session = ChatSession::new(self.connector.connect(&api_key), texts.system_message());
        send_prompts(&mut session, &prompts, texts, warning.as_deref(), events).await
    }
}
