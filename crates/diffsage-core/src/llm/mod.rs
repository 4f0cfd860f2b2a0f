mod openai;
mod session;
mod traits;

pub use openai::OpenAIClient;
pub use session::{ChatReply, ChatSession, ChatSessionState, SendOptions};
pub use traits::*;
