//! Chat-completion client.
//!
//! [`Executor`] is the boundary the pipeline talks to; [`ChatClient`] is
//! the implementation for OpenAI-compatible `/chat/completions` endpoints.

use crate::config::Settings;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader};
use tracing::{debug, trace};

/// Instruction appended to the file content when the answer replaces the file.
pub const IN_PLACE_SUFFIX: &str =
    "# Please only return the modified file content, and nothing else.";

/// Instruction appended to the file content when the answer is printed.
pub const CONSOLE_SUFFIX: &str =
    "# Please only return the modified code, with no additional explanations or preface.";

/// Lazily produced response chunks.
pub type ChunkStream<'a> = Box<dyn Iterator<Item = Result<String>> + 'a>;

/// Applies an action to file content.
pub trait Executor {
    /// Returns the complete response once it has been fully received.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Executor`] on transport, HTTP or decoding failures.
    fn complete(&self, content: &str, settings: &Settings) -> Result<String>;

    /// Returns the response as chunks in arrival order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Executor`] if the request cannot be started; each
    /// chunk may carry its own error.
    fn stream(&self, content: &str, settings: &Settings) -> Result<ChunkStream<'_>>;
}

impl<E: Executor + ?Sized> Executor for &E {
    fn complete(&self, content: &str, settings: &Settings) -> Result<String> {
        (**self).complete(content, settings)
    }

    fn stream(&self, content: &str, settings: &Settings) -> Result<ChunkStream<'_>> {
        (**self).stream(content, settings)
    }
}

/// How the response will be used; selects the trailing instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Response overwrites the file
    InPlace,
    /// Response is printed
    Console,
}

impl OutputMode {
    const fn suffix(self) -> &'static str {
        match self {
            Self::InPlace => IN_PLACE_SUFFIX,
            Self::Console => CONSOLE_SUFFIX,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

/// Builds the system + user messages for one file.
fn build_messages(content: &str, action: &str, mode: OutputMode) -> Vec<Message> {
    vec![
        Message {
            role: "system",
            content: action.to_string(),
        },
        Message {
            role: "user",
            content: format!("{content}\n\n{}", mode.suffix()),
        },
    ]
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl ChatResponse {
    fn into_content(self) -> Result<String> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::executor("response contained no choices"))?;
        Ok(choice.message.content.unwrap_or_default())
    }
}

/// Blocking client for OpenAI-compatible chat-completion APIs.
#[derive(Clone)]
pub struct ChatClient {
    agent: ureq::Agent,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient").finish_non_exhaustive()
    }
}

impl Default for ChatClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatClient {
    /// Creates a client with default transport settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    fn send(
        &self,
        content: &str,
        settings: &Settings,
        mode: OutputMode,
        stream: bool,
    ) -> Result<ureq::http::Response<ureq::Body>> {
        let url = endpoint(&settings.api_base_url);
        let request = ChatRequest {
            model: &settings.model,
            messages: build_messages(content, &settings.action, mode),
            stream,
        };

        debug!(url = %url, model = %settings.model, stream, "Sending chat completion request");

        let response = self
            .agent
            .post(&url)
            .header("Authorization", format!("Bearer {}", settings.api_key))
            .send_json(&request)?;

        trace!(status = %response.status(), "Received response headers");
        Ok(response)
    }
}

impl Executor for ChatClient {
    fn complete(&self, content: &str, settings: &Settings) -> Result<String> {
        let mut response = self.send(content, settings, OutputMode::InPlace, false)?;
        let body: ChatResponse = response.body_mut().read_json()?;
        body.into_content()
    }

    fn stream(&self, content: &str, settings: &Settings) -> Result<ChunkStream<'_>> {
        let response = self.send(content, settings, OutputMode::Console, true)?;
        let reader = BufReader::new(response.into_body().into_reader());
        Ok(Box::new(SseChunks::new(reader)))
    }
}

/// `{base}/chat/completions`, tolerating a trailing slash on the base.
fn endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// Server-sent-event decoder yielding `delta.content` pieces.
struct SseChunks<R> {
    lines: std::io::Lines<R>,
    done: bool,
}

impl<R: BufRead> SseChunks<R> {
    fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            done: false,
        }
    }

    fn fail(&mut self, error: Error) -> Option<Result<String>> {
        self.done = true;
        Some(Err(error))
    }
}

impl<R: BufRead> Iterator for SseChunks<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return self.fail(Error::executor(format!("stream interrupted: {e}"))),
            };

            let Some(data) = line.trim_end().strip_prefix("data:") else {
                continue;
            };
            let data = data.trim_start();

            if data == "[DONE]" {
                self.done = true;
                break;
            }

            let chunk: StreamChunk = match serde_json::from_str(data) {
                Ok(chunk) => chunk,
                Err(e) => return self.fail(e.into()),
            };

            if let Some(error) = chunk.error {
                return self.fail(Error::executor(error.message));
            }

            let piece = chunk
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.delta.content)
                .unwrap_or_default();

            if !piece.is_empty() {
                return Some(Ok(piece));
            }
        }
        None
    }
}
