use crate::config::Config;
use crate::error::EndpointError;
use crate::transcript::Turn;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::time::Duration;

/// Receives each reply fragment as it arrives.
pub type OnFragment<'a> = dyn for<'f> FnMut(&'f str) + Send + 'a;

/// A remote endpoint that turns an ordered conversation into a streamed reply.
///
/// `on_fragment` is called zero or more times, in delivery order, before the
/// call returns. On success the returned text equals the concatenation of
/// every fragment passed to `on_fragment`.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn send(
        &self,
        turns: &[Turn],
        on_fragment: &mut OnFragment<'_>,
    ) -> Result<String, EndpointError>;
}

/// Streaming client for OpenAI-compatible `/chat/completions` endpoints.
#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    api_key: Option<String>,
    api_key_env: String,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Result<Self, EndpointError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            api_key: config.api_key(),
            api_key_env: config.api_key_env.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn payload(&self, turns: &[Turn]) -> Value {
        let mut payload = serde_json::json!({
            "model": self.model,
            "messages": turns,
            "stream": true,
            "temperature": self.temperature,
        });
        if let Some(max_tokens) = self.max_tokens {
            payload["max_tokens"] = max_tokens.into();
        }
        payload
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn send(
        &self,
        turns: &[Turn],
        on_fragment: &mut OnFragment<'_>,
    ) -> Result<String, EndpointError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| EndpointError::MissingCredential {
                env: self.api_key_env.clone(),
            })?;

        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(%url, model = %self.model, turns = turns.len(), "opening completion stream");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&self.payload(turns))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EndpointError::Status {
                status: status.as_u16(),
                body,
            });
        }

        process_sse_stream(response.bytes_stream(), on_fragment).await
    }
}

/// One decoded line of a chat completion event stream.
#[derive(Debug, PartialEq, Eq)]
enum StreamLine {
    Fragment(String),
    Done,
    Skip,
}

/// Consume a server-sent event body, forwarding each content delta.
///
/// Lines are split on raw bytes so multi-byte characters that straddle a
/// chunk boundary decode correctly.
pub async fn process_sse_stream<S, B, E>(
    mut stream: S,
    on_fragment: &mut OnFragment<'_>,
) -> Result<String, EndpointError>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<EndpointError>,
{
    let mut buffer: Vec<u8> = Vec::new();
    let mut assistant_text = String::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(Into::<EndpointError>::into)?;
        buffer.extend_from_slice(chunk.as_ref());

        while let Some(newline_pos) = buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=newline_pos).collect();
            if apply_line(&line, &mut assistant_text, on_fragment)? {
                return Ok(assistant_text);
            }
        }
    }

    // Flush any remaining buffer line (without newline)
    if !buffer.is_empty() {
        apply_line(&buffer, &mut assistant_text, on_fragment)?;
    }

    Ok(assistant_text)
}

/// Returns `true` once the terminating `[DONE]` marker is seen.
fn apply_line(
    raw: &[u8],
    assistant_text: &mut String,
    on_fragment: &mut OnFragment<'_>,
) -> Result<bool, EndpointError> {
    let line = std::str::from_utf8(raw)
        .map_err(|err| EndpointError::Malformed(format!("invalid UTF-8 in stream: {err}")))?;

    match parse_line(line)? {
        StreamLine::Fragment(content) => {
            tracing::trace!(len = content.len(), "fragment");
            assistant_text.push_str(&content);
            on_fragment(&content);
            Ok(false)
        }
        StreamLine::Done => Ok(true),
        StreamLine::Skip => Ok(false),
    }
}

fn parse_line(line: &str) -> Result<StreamLine, EndpointError> {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        // Blank separators, comments and `event:` lines carry no content.
        return Ok(StreamLine::Skip);
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return Ok(StreamLine::Done);
    }

    let chunk: Value = serde_json::from_str(data)
        .map_err(|err| EndpointError::Malformed(format!("{err}: {data}")))?;

    if let Some(error) = chunk.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(EndpointError::Api { message });
    }

    let content = chunk
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(Value::as_str);

    Ok(match content {
        Some(content) => StreamLine::Fragment(content.to_string()),
        None => StreamLine::Skip,
    })
}
