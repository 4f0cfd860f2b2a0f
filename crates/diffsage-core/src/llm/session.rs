use std::collections::HashMap;

use futures::StreamExt;
use uuid::Uuid;

use crate::error::ReviewError;
use crate::llm::{LlmClient, Message, Role, StreamEvent};

/// Threads sequential sends of one review run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatSessionState {
    pub last_message_id: Option<Uuid>,
}

/// Options for a single `ChatSession::send_message` call.
pub struct SendOptions<'a> {
    /// Reply this message continues from; `None` starts a fresh thread.
    pub parent_message_id: Option<Uuid>,
    /// Called with the accumulated reply text after every streamed delta.
    pub progress: Option<&'a mut (dyn FnMut(&str) + Send)>,
}

impl Default for SendOptions<'_> {
    fn default() -> Self {
        Self {
            parent_message_id: None,
            progress: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub id: Uuid,
    pub text: String,
    pub parent_message_id: Uuid,
}

#[derive(Debug, Clone)]
struct StoredMessage {
    role: Role,
    content: String,
    parent: Option<Uuid>,
}

/// A chat conversation kept in memory. Every stored message points at its
/// parent, and each request replays the chain ending at the new message.
pub struct ChatSession {
    llm: Box<dyn LlmClient>,
    system_message: String,
    messages: HashMap<Uuid, StoredMessage>,
}

impl ChatSession {
    pub fn new(llm: Box<dyn LlmClient>, system_message: impl Into<String>) -> Self {
        Self {
            llm,
            system_message: system_message.into(),
            messages: HashMap::new(),
        }
    }

    pub fn system_message(&self) -> &str {
        &self.system_message
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Send `text` as a user message and wait for the streamed reply.
    pub async fn send_message(
        &mut self,
        text: &str,
        options: SendOptions<'_>,
    ) -> Result<ChatReply, ReviewError> {
        let SendOptions {
            parent_message_id,
            mut progress,
        } = options;

        if let Some(parent) = parent_message_id {
            if !self.messages.contains_key(&parent) {
                return Err(ReviewError::Llm(format!("Unknown parent message {parent}")));
            }
        }

        let user_id = Uuid::new_v4();
        self.messages.insert(
            user_id,
            StoredMessage {
                role: Role::User,
                content: text.to_string(),
                parent: parent_message_id,
            },
        );

        let thread = self.thread_to(user_id);
        let mut rx = self.llm.chat_stream(&thread).await?;

        let mut reply = String::new();
        while let Some(event) = rx.next().await {
            match event {
                StreamEvent::TextDelta(delta) => {
                    reply.push_str(&delta);
                    if let Some(callback) = progress.as_mut() {
                        callback(&reply);
                    }
                }
                StreamEvent::Done => break,
                StreamEvent::Error(e) => return Err(ReviewError::Llm(e)),
            }
        }

        let reply_id = Uuid::new_v4();
        self.messages.insert(
            reply_id,
            StoredMessage {
                role: Role::Assistant,
                content: reply.clone(),
                parent: Some(user_id),
            },
        );

        Ok(ChatReply {
            id: reply_id,
            text: reply,
            parent_message_id: user_id,
        })
    }

    /// System message followed by the chain of messages ending at `id`.
    fn thread_to(&self, id: Uuid) -> Vec<Message> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(stored) = self.messages.get(&current) else {
                break;
            };
            chain.push(Message {
                role: stored.role,
                content: stored.content.clone(),
            });
            cursor = stored.parent;
        }

        let mut messages = Vec::with_capacity(chain.len() + 1);
        if !self.system_message.is_empty() {
            messages.push(Message::system(&self.system_message));
        }
        messages.extend(chain.into_iter().rev());
        messages
    }
}
