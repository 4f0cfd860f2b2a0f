use crate::error::ReviewError;
use crate::llm::traits::*;
use futures::channel::mpsc;
use serde::Serialize;
use serde_json::Value;

pub struct OpenAIClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: Option<f32>,
}

impl OpenAIClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: crate::constants::models::DEFAULT_OPENAI_MODEL.to_string(),
            base_url: crate::constants::endpoints::OPENAI_BASE_URL.to_string(),
            temperature: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// One `data:` line of the completion stream.
#[derive(Debug, PartialEq)]
enum SseLine {
    Delta(String),
    Done,
}

fn parse_sse_line(line: &str) -> Option<SseLine> {
    let data = line.trim().strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(SseLine::Done);
    }
    let event: Value = serde_json::from_str(data).ok()?;
    event
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(|content| content.as_str())
        .filter(|content| !content.is_empty())
        .map(|content| SseLine::Delta(content.to_string()))
}

/// Splits a byte stream into lines. Bytes are only decoded once a whole line
/// is in, so characters cut between network chunks survive.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(end) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Whatever followed the last newline.
    fn finish(self) -> String {
        String::from_utf8_lossy(&self.pending).into_owned()
    }
}

/// Turn a failed response into the text the user sees.
fn api_error_message(status: reqwest::StatusCode, body: &str) -> String {
    match status.as_u16() {
        401 => "Invalid OpenAI API key (401). Check the key in your diffsage settings.".to_string(),
        429 => format!(
            "Rate limited by the OpenAI API (429). Try again in a few minutes. {}",
            body.trim()
        )
        .trim_end()
        .to_string(),
        _ => format!("API error {}: {}", status, body.trim()),
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAIClient {
    async fn chat_stream(
        &self,
        messages: &[Message],
    ) -> Result<mpsc::UnboundedReceiver<StreamEvent>, ReviewError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let request_body = OpenAIRequest {
            model: &self.model,
            messages,
            stream: true,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| ReviewError::Llm(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ReviewError::Llm(api_error_message(status, &text)));
        }

        let (tx, rx) = mpsc::unbounded();

        let mut stream = response.bytes_stream();
        tokio::spawn(async move {
            use futures::StreamExt;
            let mut lines = LineBuffer::default();

            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = tx.unbounded_send(StreamEvent::Error(e.to_string()));
                        return;
                    }
                };

                for line in lines.push(&chunk) {
                    match parse_sse_line(&line) {
                        Some(SseLine::Delta(text)) => {
                            let _ = tx.unbounded_send(StreamEvent::TextDelta(text));
                        }
                        Some(SseLine::Done) => {
                            let _ = tx.unbounded_send(StreamEvent::Done);
                            return;
                        }
                        None => {}
                    }
                }
            }

            if let Some(SseLine::Delta(text)) = parse_sse_line(&lines.finish()) {
                let _ = tx.unbounded_send(StreamEvent::TextDelta(text));
            }
            let _ = tx.unbounded_send(StreamEvent::Done);
        });

        Ok(rx)
    }
}
