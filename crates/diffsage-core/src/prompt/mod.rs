//! Assembles the ordered prompt sequence sent to the chat model.
//!
//! A single chat turn is size-limited, so the review is spread over several
//! turns: instructions, the author's description, one turn per file diff and
//! a closing turn asking for the review.

mod texts;

pub use texts::PromptTexts;

use crate::config::Language;
use crate::diff::ChunkedDiff;
use crate::page::ChangeReference;

pub struct PromptBuilder {
    texts: PromptTexts,
}

impl PromptBuilder {
    pub fn new(language: Language) -> Self {
        Self {
            texts: PromptTexts::new(language),
        }
    }

    pub fn build(&self, change: &ChangeReference, diff: &ChunkedDiff) -> Vec<String> {
        let mut prompts = Vec::with_capacity(diff.chunks.len() + 3);
        prompts.push(self.texts.instructions(&change.title));
        prompts.push(self.texts.description(&change.description));
        prompts.extend(diff.texts().map(str::to_string));
        prompts.push(self.texts.all_sent().to_string());
        prompts
    }
}
