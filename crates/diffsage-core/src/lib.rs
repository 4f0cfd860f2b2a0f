pub mod cache;
pub mod config;
pub mod constants;
pub mod diff;
pub mod error;
pub mod llm;
pub mod page;
pub mod popup;
pub mod prompt;
pub mod render;
pub mod review;

// Re-export key types
pub use cache::{FileSessionCache, MemorySessionCache, SessionCache};
pub use config::{Language, Settings};
pub use diff::{ChunkedDiff, DiffChunk, DiffChunker, HttpPatchFetcher, PatchFetcher};
pub use error::ReviewError;
pub use llm::{ChatSession, LlmClient, Message, OpenAIClient, Role, StreamEvent};
pub use page::{ChangeReference, HttpPageInspector, PageInspector, Provider, Tab};
pub use popup::{Popup, PopupRenderer, PopupServices, PopupState, PopupView, StatusIcon};
pub use prompt::{PromptBuilder, PromptTexts};
pub use review::{LlmConnector, ReviewEvent, ReviewOutcome, Reviewer};
