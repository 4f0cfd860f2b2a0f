//! Popup lifecycle.
//!
//! `Idle → Detecting → Error` for pages that are not a pull/merge request,
//! otherwise `Detecting → Loading → Streaming → Done`. Rerun goes from `Done`
//! back to `Loading` after evicting the cached result. Every transition is
//! drawn through [`render_view`].

use std::time::Duration;

use tokio::sync::mpsc;

use crate::cache::SessionCache;
use crate::config::Settings;
use crate::diff::PatchFetcher;
use crate::page::{inspect_tab, ChangeReference, PageInspector, Tab};
use crate::review::{LlmConnector, ReviewEvent, Reviewer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopupState {
    Idle,
    Detecting,
    /// Terminal; the popup closes on its own after the configured delay.
    Error { message: String },
    Loading,
    Streaming { html: String },
    Done { html: String, failed: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusIcon {
    None,
    Spinner,
    Checkmark,
    Cross,
}

/// What the popup shows for a given state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupView {
    pub status: StatusIcon,
    pub rerun_enabled: bool,
    /// Content of the result area. Error messages are plain text, everything
    /// else is rendered HTML.
    pub result: String,
}

pub fn render_view(state: &PopupState) -> PopupView {
    match state {
        PopupState::Idle | PopupState::Detecting => PopupView {
            status: StatusIcon::None,
            rerun_enabled: false,
            result: String::new(),
        },
        PopupState::Error { message } => PopupView {
            status: StatusIcon::Cross,
            rerun_enabled: false,
            result: message.clone(),
        },
        PopupState::Loading => PopupView {
            status: StatusIcon::Spinner,
            rerun_enabled: false,
            result: String::new(),
        },
        PopupState::Streaming { html } => PopupView {
            status: StatusIcon::Spinner,
            rerun_enabled: false,
            result: html.clone(),
        },
        PopupState::Done { html, failed } => PopupView {
            status: if *failed {
                StatusIcon::Cross
            } else {
                StatusIcon::Checkmark
            },
            rerun_enabled: true,
            result: html.clone(),
        },
    }
}

/// Draws popup views. The terminal front end is one implementation.
pub trait PopupRenderer: Send {
    fn render(&mut self, view: &PopupView);
}

/// Services the popup talks to while it is open.
pub struct PopupServices<'a> {
    pub settings: &'a Settings,
    pub inspector: &'a dyn PageInspector,
    pub fetcher: &'a dyn PatchFetcher,
    pub connector: &'a dyn LlmConnector,
}

pub struct Popup<'a> {
    services: PopupServices<'a>,
    cache: &'a mut dyn SessionCache,
    renderer: &'a mut dyn PopupRenderer,
    state: PopupState,
    change: Option<ChangeReference>,
    from_cache: bool,
}

impl<'a> Popup<'a> {
    pub fn new(
        services: PopupServices<'a>,
        cache: &'a mut dyn SessionCache,
        renderer: &'a mut dyn PopupRenderer,
    ) -> Self {
        Self {
            services,
            cache,
            renderer,
            state: PopupState::Idle,
            change: None,
            from_cache: false,
        }
    }

    pub fn state(&self) -> &PopupState {
        &self.state
    }

    pub fn change(&self) -> Option<&ChangeReference> {
        self.change.as_ref()
    }

    /// Whether the result on display came from the session cache.
    pub fn served_from_cache(&self) -> bool {
        self.from_cache
    }

    fn transition(&mut self, state: PopupState) {
        self.state = state;
        self.renderer.render(&render_view(&self.state));
    }

    /// Open the popup on `tab`: show a cached review when there is one,
    /// otherwise run a fresh review.
    pub async fn open(&mut self, tab: &Tab) -> &PopupState {
        self.transition(PopupState::Detecting);

        let change = match inspect_tab(tab, self.services.inspector).await {
            Ok(change) => change,
            Err(e) => {
                self.transition(PopupState::Error {
                    message: e.to_string(),
                });
                let delay = Duration::from_secs(self.services.settings.review.close_delay_secs);
                tokio::time::sleep(delay).await;
                return &self.state;
            }
        };

        let cached = self.cache.get(&change.diff_url);
        self.change = Some(change);
        match cached {
            Some(html) => {
                tracing::info!("Showing cached review");
                self.from_cache = true;
                self.transition(PopupState::Done { html, failed: false });
            }
            None => self.run_review().await,
        }
        &self.state
    }

    /// Review the current change again, ignoring any cached result.
    /// Only available once a run has finished.
    pub async fn rerun(&mut self) -> &PopupState {
        if matches!(self.state, PopupState::Done { .. }) {
            self.run_review().await;
        }
        &self.state
    }

    async fn run_review(&mut self) {
        let Some(change) = self.change.clone() else {
            return;
        };

        self.from_cache = false;
        self.transition(PopupState::Loading);
        if let Err(e) = self.cache.remove(&change.diff_url) {
            tracing::warn!("Failed to evict cached review: {}", e);
        }

        let reviewer = Reviewer::new(
            self.services.settings,
            self.services.fetcher,
            self.services.connector,
        );
        let (tx, mut rx) = mpsc::unbounded_channel::<ReviewEvent>();

        let review = async move {
            let outcome = reviewer.review(&change, &tx).await;
            drop(tx);
            outcome
        };
        let show_progress = async {
            while let Some(event) = rx.recv().await {
                let html = match event {
                    ReviewEvent::Sending { html, .. } | ReviewEvent::Answer { html, .. } => html,
                };
                self.transition(PopupState::Streaming { html });
            }
        };
        let (outcome, ()) = tokio::join!(review, show_progress);

        if let Some(ref change) = self.change {
            if let Err(e) = self.cache.set(&change.diff_url, &outcome.html) {
                tracing::warn!("Failed to cache review: {}", e);
            }
        }
        self.transition(PopupState::Done {
            html: outcome.html,
            failed: outcome.failed,
        });
    }
}
