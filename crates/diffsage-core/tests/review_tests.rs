use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use diffsage_core::llm::SendOptions;
use diffsage_core::popup::render_view;
use diffsage_core::review::send_prompts;
use diffsage_core::*;
use futures::channel::mpsc;
use tokio::sync::mpsc::unbounded_channel;

const GITHUB_PR: &str = "https://github.com/acme/widgets/pull/42";
const GITHUB_PATCH: &str = "https://patch-diff.githubusercontent.com/raw/acme/widgets/pull/42.patch";

const PATCH: &str = "\
diff --git a/src/lib.rs b/src/lib.rs
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1 +1 @@
-pub fn old() {}
+pub fn new() {}
diff --git a/yarn.lock.json b/yarn.lock.json
--- a/yarn.lock.json
+++ b/yarn.lock.json
@@ -1 +1 @@
-1
+2
diff --git a/README.md b/README.md
--- a/README.md
+++ b/README.md
@@ -1 +1,2 @@
 # widgets
+Now with caching.
";

// ========================================================================
// Fakes
// ========================================================================

struct FakeInspector {
    gitlab_meta: usize,
    description: Option<String>,
}

impl FakeInspector {
    fn github(description: &str) -> Self {
        Self {
            gitlab_meta: 0,
            description: Some(description.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl PageInspector for FakeInspector {
    async fn gitlab_meta_count(&self, _tab: &Tab) -> Result<usize, ReviewError> {
        Ok(self.gitlab_meta)
    }

    async fn query_description(
        &self,
        _tab: &Tab,
        _provider: Provider,
    ) -> Result<Option<String>, ReviewError> {
        Ok(self.description.clone())
    }
}

#[derive(Default)]
struct FakeFetcher {
    patch: String,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeFetcher {
    fn with_patch(patch: &str) -> Self {
        Self {
            patch: patch.to_string(),
            ..Self::default()
        }
    }
}

#[async_trait::async_trait]
impl PatchFetcher for FakeFetcher {
    async fn fetch_patch(&self, _change: &ChangeReference) -> Result<String, ReviewError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ReviewError::DiffFetch("404 Not Found".to_string()));
        }
        Ok(self.patch.clone())
    }
}

/// Answers the n-th request with "reply n", streamed in two deltas, and
/// records every message list it is sent.
#[derive(Clone, Default)]
struct ScriptedLlm {
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
    fail_on: Option<usize>,
}

impl ScriptedLlm {
    fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedLlm {
    async fn chat_stream(
        &self,
        messages: &[Message],
    ) -> Result<mpsc::UnboundedReceiver<StreamEvent>, ReviewError> {
        let n = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(messages.to_vec());
            requests.len()
        };
        if self.fail_on == Some(n) {
            return Err(ReviewError::Llm("API error 500: boom".to_string()));
        }
        let (tx, rx) = mpsc::unbounded();
        tx.unbounded_send(StreamEvent::TextDelta("reply ".to_string())).unwrap();
        tx.unbounded_send(StreamEvent::TextDelta(n.to_string())).unwrap();
        tx.unbounded_send(StreamEvent::Done).unwrap();
        Ok(rx)
    }
}

#[derive(Default)]
struct FakeConnector {
    llm: ScriptedLlm,
    keys: Mutex<Vec<String>>,
}

impl FakeConnector {
    fn connects(&self) -> usize {
        self.keys.lock().unwrap().len()
    }
}

impl LlmConnector for FakeConnector {
    fn connect(&self, api_key: &str) -> Box<dyn LlmClient> {
        self.keys.lock().unwrap().push(api_key.to_string());
        Box::new(self.llm.clone())
    }
}

#[derive(Default)]
struct RecordingRenderer {
    views: Vec<PopupView>,
}

impl PopupRenderer for RecordingRenderer {
    fn render(&mut self, view: &PopupView) {
        self.views.push(view.clone());
    }
}

fn settings_with_key() -> Settings {
    let mut settings = Settings::default();
    settings.llm.api_key_env = String::new();
    settings.llm.api_key = Some("sk-test".to_string());
    settings
}

struct Run {
    state: PopupState,
    from_cache: bool,
    views: Vec<PopupView>,
}

async fn open_popup(
    settings: &Settings,
    inspector: &dyn PageInspector,
    fetcher: &dyn PatchFetcher,
    connector: &dyn LlmConnector,
    cache: &mut dyn SessionCache,
    tab: &Tab,
    rerun: bool,
) -> Run {
    let mut renderer = RecordingRenderer::default();
    let (state, from_cache) = {
        let mut popup = Popup::new(
            PopupServices {
                settings,
                inspector,
                fetcher,
                connector,
            },
            cache,
            &mut renderer,
        );
        popup.open(tab).await;
        if rerun {
            popup.rerun().await;
        }
        (popup.state().clone(), popup.served_from_cache())
    };
    Run {
        state,
        from_cache,
        views: renderer.views,
    }
}

// ========================================================================
// Chat Session Tests (llm/session.rs)
// ========================================================================

#[tokio::test]
async fn test_session_threads_messages_through_parents() {
    let llm = ScriptedLlm::default();
    let mut session = ChatSession::new(Box::new(llm.clone()), "SYS");

    let first = session.send_message("one", SendOptions::default()).await.unwrap();
    assert_eq!(first.text, "reply 1");

    let second = session
        .send_message(
            "two",
            SendOptions {
                parent_message_id: Some(first.id),
                ..SendOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(second.text, "reply 2");
    assert_ne!(second.parent_message_id, first.id);
    assert_eq!(session.len(), 4);

    let requests = llm.requests();
    assert_eq!(
        requests[1],
        vec![
            Message::system("SYS"),
            Message::user("one"),
            Message::assistant("reply 1"),
            Message::user("two"),
        ]
    );

    session.send_message("three", SendOptions::default()).await.unwrap();
    assert_eq!(
        llm.requests()[2],
        vec![Message::system("SYS"), Message::user("three")]
    );
}

#[tokio::test]
async fn test_session_reports_accumulated_progress() {
    let mut session = ChatSession::new(Box::new(ScriptedLlm::default()), "");
    let mut seen = Vec::new();
    let mut record = |partial: &str| seen.push(partial.to_string());

    session
        .send_message(
            "hi",
            SendOptions {
                parent_message_id: None,
                progress: Some(&mut record as &mut (dyn FnMut(&str) + Send)),
            },
        )
        .await
        .unwrap();
    assert_eq!(seen, vec!["reply ", "reply 1"]);
}

#[tokio::test]
async fn test_session_rejects_unknown_parent() {
    let mut other = ChatSession::new(Box::new(ScriptedLlm::default()), "");
    let foreign = other.send_message("x", SendOptions::default()).await.unwrap();

    let llm = ScriptedLlm::default();
    let mut session = ChatSession::new(Box::new(llm.clone()), "");
    let result = session
        .send_message(
            "y",
            SendOptions {
                parent_message_id: Some(foreign.id),
                ..SendOptions::default()
            },
        )
        .await;
    assert!(result.is_err());
    assert!(llm.requests().is_empty());
}

// ========================================================================
// Prompt Sending Tests (review.rs)
// ========================================================================

#[tokio::test]
async fn test_send_prompts_is_sequential_and_reports_status() {
    let llm = ScriptedLlm::default();
    let mut session = ChatSession::new(Box::new(llm.clone()), "SYS");
    let texts = PromptTexts::new(Language::En);
    let prompts: Vec<String> = vec!["p1".into(), "p2".into(), "p3".into()];
    let (tx, mut rx) = unbounded_channel();

    let answer = send_prompts(&mut session, &prompts, &texts, None, &tx).await.unwrap();
    drop(tx);
    assert_eq!(answer, "reply 3");

    // Each request extends the previous thread.
    let requests = llm.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[2].len(), 6);
    assert_eq!(requests[2][3], Message::user("p2"));
    assert_eq!(requests[2][4], Message::assistant("reply 2"));

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    let remaining: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            ReviewEvent::Sending { remaining, .. } => Some(*remaining),
            ReviewEvent::Answer { .. } => None,
        })
        .collect();
    assert_eq!(remaining, vec![2, 2, 2, 1, 1, 1]);
    match events.last() {
        Some(ReviewEvent::Answer { text, html }) => {
            assert_eq!(text, "reply 3");
            assert!(html.contains("reply 3"));
        }
        other => panic!("expected final answer, got {other:?}"),
    }
    if let ReviewEvent::Sending { html, .. } = &events[0] {
        assert!(html.contains("Prompts left to send: 2"));
    }
}

#[tokio::test]
async fn test_send_prompts_stops_at_first_failure() {
    let llm = ScriptedLlm {
        fail_on: Some(2),
        ..ScriptedLlm::default()
    };
    let mut session = ChatSession::new(Box::new(llm.clone()), "SYS");
    let texts = PromptTexts::new(Language::En);
    let prompts: Vec<String> = vec!["p1".into(), "p2".into(), "p3".into()];
    let (tx, _rx) = unbounded_channel();

    let err = send_prompts(&mut session, &prompts, &texts, None, &tx)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "API error 500: boom");
    assert_eq!(llm.requests().len(), 2);
}

// ========================================================================
// Popup Tests (popup.rs)
// ========================================================================

#[test]
fn test_render_view_per_state() {
    let error = render_view(&PopupState::Error {
        message: "nope".into(),
    });
    assert_eq!(error.status, StatusIcon::Cross);
    assert!(!error.rerun_enabled);
    assert_eq!(error.result, "nope");

    assert_eq!(render_view(&PopupState::Loading).status, StatusIcon::Spinner);
    assert!(!render_view(&PopupState::Streaming { html: "x".into() }).rerun_enabled);

    let done = render_view(&PopupState::Done {
        html: "<p>ok</p>".into(),
        failed: false,
    });
    assert_eq!(done.status, StatusIcon::Checkmark);
    assert!(done.rerun_enabled);

    let failed = render_view(&PopupState::Done {
        html: "<p>bad</p>".into(),
        failed: true,
    });
    assert_eq!(failed.status, StatusIcon::Cross);
    assert!(failed.rerun_enabled);
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_page_shows_error_then_closes() {
    let settings = settings_with_key();
    let inspector = FakeInspector {
        gitlab_meta: 0,
        description: None,
    };
    let fetcher = FakeFetcher::with_patch(PATCH);
    let connector = FakeConnector::default();
    let mut cache = MemorySessionCache::new();

    let started = tokio::time::Instant::now();
    let run = open_popup(
        &settings,
        &inspector,
        &fetcher,
        &connector,
        &mut cache,
        &Tab::new("https://example.com/blog/post", "Post"),
        false,
    )
    .await;

    assert!(started.elapsed() >= std::time::Duration::from_secs(4));
    assert_eq!(
        run.state,
        PopupState::Error {
            message: "Only GitHub or GitLab (SaaS & self-hosted) are supported.".into()
        }
    );
    let last = run.views.last().unwrap();
    assert_eq!(last.status, StatusIcon::Cross);
    assert!(!last.rerun_enabled);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    assert_eq!(connector.connects(), 0);
    assert!(cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_github_page_that_is_not_a_pull_request() {
    let settings = settings_with_key();
    let inspector = FakeInspector::github("");
    let fetcher = FakeFetcher::with_patch(PATCH);
    let connector = FakeConnector::default();
    let mut cache = MemorySessionCache::new();

    let run = open_popup(
        &settings,
        &inspector,
        &fetcher,
        &connector,
        &mut cache,
        &Tab::new("https://github.com/acme/widgets/issues/3", "Issue"),
        false,
    )
    .await;

    assert_eq!(
        run.state,
        PopupState::Error {
            message: "Please open a specific Pull Request or Merge Request on GitHub".into()
        }
    );
}

#[tokio::test]
async fn test_full_review_streams_and_caches() {
    let settings = settings_with_key();
    let inspector = FakeInspector::github("Adds a **cache**.");
    let fetcher = FakeFetcher::with_patch(PATCH);
    let connector = FakeConnector::default();
    let mut cache = MemorySessionCache::new();

    let run = open_popup(
        &settings,
        &inspector,
        &fetcher,
        &connector,
        &mut cache,
        &Tab::new(GITHUB_PR, "Add cache"),
        false,
    )
    .await;

    // instructions, description, two files (lockfile skipped), closing prompt
    let requests = connector.llm.requests();
    assert_eq!(requests.len(), 5);
    let last = requests.last().unwrap();
    assert_eq!(last.len(), 1 + 5 + 4);
    assert_eq!(last[0], Message::system(PromptTexts::new(Language::En).system_message()));
    assert!(last[1].content.contains("Add cache"));
    assert!(last[3].content.ends_with("Adds a **cache**."));
    assert!(last[5].content.contains("src/lib.rs"));
    assert!(last[7].content.contains("README.md"));
    assert!(requests.iter().flatten().all(|m| !m.content.contains("yarn.lock.json")));

    assert_eq!(connector.keys.lock().unwrap().as_slice(), ["sk-test".to_string()]);
    assert!(!run.from_cache);

    let PopupState::Done { html, failed } = run.state else {
        panic!("expected Done, got {:?}", run.state);
    };
    assert!(!failed);
    assert!(html.contains("reply 5"));
    assert_eq!(cache.get(GITHUB_PATCH), Some(html));

    assert_eq!(run.views.first().unwrap().status, StatusIcon::None);
    assert!(run
        .views
        .iter()
        .any(|v| v.status == StatusIcon::Spinner && v.result.contains("Prompts left to send: 4")));
    assert_eq!(run.views.last().unwrap().status, StatusIcon::Checkmark);
}

#[tokio::test]
async fn test_cached_review_skips_chat_and_rerun_refreshes() {
    let settings = settings_with_key();
    let inspector = FakeInspector::github("");
    let fetcher = FakeFetcher::with_patch(PATCH);
    let connector = FakeConnector::default();
    let mut cache = MemorySessionCache::new();
    cache.set(GITHUB_PATCH, "<p>cached</p>").unwrap();

    let run = open_popup(
        &settings,
        &inspector,
        &fetcher,
        &connector,
        &mut cache,
        &Tab::new(GITHUB_PR, "Add cache"),
        false,
    )
    .await;
    assert!(run.from_cache);
    assert_eq!(
        run.state,
        PopupState::Done {
            html: "<p>cached</p>".into(),
            failed: false
        }
    );
    assert_eq!(connector.connects(), 0);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);

    let run = open_popup(
        &settings,
        &inspector,
        &fetcher,
        &connector,
        &mut cache,
        &Tab::new(GITHUB_PR, "Add cache"),
        true,
    )
    .await;
    assert!(!run.from_cache);
    assert_eq!(connector.connects(), 1);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    let cached = cache.get(GITHUB_PATCH).unwrap();
    assert!(cached.contains("reply"));
    assert!(run.views.iter().any(|v| v.status == StatusIcon::Spinner));
}

#[tokio::test]
async fn test_missing_api_key_never_connects() {
    let mut settings = settings_with_key();
    settings.llm.api_key = None;
    let inspector = FakeInspector::github("");
    let fetcher = FakeFetcher::with_patch(PATCH);
    let connector = FakeConnector::default();
    let mut cache = MemorySessionCache::new();

    let run = open_popup(
        &settings,
        &inspector,
        &fetcher,
        &connector,
        &mut cache,
        &Tab::new(GITHUB_PR, "Add cache"),
        false,
    )
    .await;

    assert_eq!(connector.connects(), 0);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    let PopupState::Done { html, failed } = run.state else {
        panic!("expected Done, got {:?}", run.state);
    };
    assert!(failed);
    assert!(html.contains("Please add your OpenAI API key"));
    assert_eq!(run.views.last().unwrap().status, StatusIcon::Cross);
    assert!(run.views.last().unwrap().rerun_enabled);
}

#[tokio::test]
async fn test_chat_failure_is_shown_and_cached() {
    let settings = settings_with_key();
    let inspector = FakeInspector::github("");
    let fetcher = FakeFetcher::with_patch(PATCH);
    let connector = FakeConnector {
        llm: ScriptedLlm {
            fail_on: Some(3),
            ..ScriptedLlm::default()
        },
        ..FakeConnector::default()
    };
    let mut cache = MemorySessionCache::new();

    let run = open_popup(
        &settings,
        &inspector,
        &fetcher,
        &connector,
        &mut cache,
        &Tab::new(GITHUB_PR, "Add cache"),
        false,
    )
    .await;

    assert_eq!(connector.llm.requests().len(), 3);
    let PopupState::Done { html, failed } = run.state else {
        panic!("expected Done, got {:?}", run.state);
    };
    assert!(failed);
    assert!(html.contains("API error 500: boom"));
    assert_eq!(cache.get(GITHUB_PATCH), Some(html));
}

#[tokio::test]
async fn test_diff_fetch_failure_is_shown() {
    let settings = settings_with_key();
    let inspector = FakeInspector::github("");
    let fetcher = FakeFetcher {
        fail: true,
        ..FakeFetcher::default()
    };
    let connector = FakeConnector::default();
    let mut cache = MemorySessionCache::new();

    let run = open_popup(
        &settings,
        &inspector,
        &fetcher,
        &connector,
        &mut cache,
        &Tab::new(GITHUB_PR, "Add cache"),
        false,
    )
    .await;

    assert_eq!(connector.llm.requests().len(), 0);
    let PopupState::Done { html, failed } = run.state else {
        panic!("expected Done, got {:?}", run.state);
    };
    assert!(failed);
    assert!(html.contains("Failed to fetch diff: 404 Not Found"));
}

#[tokio::test]
async fn test_truncation_warning_follows_answer() {
    let mut settings = settings_with_key();
    settings.review.max_chunk_chars = 60;
    let inspector = FakeInspector::github("");
    let fetcher = FakeFetcher::with_patch(PATCH);
    let connector = FakeConnector::default();
    let mut cache = MemorySessionCache::new();

    let run = open_popup(
        &settings,
        &inspector,
        &fetcher,
        &connector,
        &mut cache,
        &Tab::new(GITHUB_PR, "Add cache"),
        false,
    )
    .await;

    let PopupState::Done { html, failed } = run.state else {
        panic!("expected Done, got {:?}", run.state);
    };
    assert!(!failed);
    let answer = html.find("reply 5").unwrap();
    let warning = html.find("exceeded 60 characters").unwrap();
    assert!(answer < warning);

    // Intermediate status lines carry the warning too.
    assert!(run
        .views
        .iter()
        .filter(|v| v.result.contains("Prompts left to send"))
        .all(|v| v.result.contains("exceeded 60 characters")));
}

#[tokio::test]
async fn test_french_review_uses_french_persona() {
    let mut settings = settings_with_key();
    settings.review.language = Language::Fr;
    let inspector = FakeInspector::github("");
    let fetcher = FakeFetcher::with_patch(PATCH);
    let connector = FakeConnector::default();
    let mut cache = MemorySessionCache::new();

    open_popup(
        &settings,
        &inspector,
        &fetcher,
        &connector,
        &mut cache,
        &Tab::new(GITHUB_PR, "Ajout du cache"),
        false,
    )
    .await;

    let first = &connector.llm.requests()[0];
    assert!(first[0].content.contains("réponds en français"));
    assert!(first[1].content.starts_with("Le changement a le titre suivant: Ajout du cache."));
}
