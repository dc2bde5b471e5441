use std::pin::Pin;

use {async_trait::async_trait, bytes::Bytes, tokio_stream::Stream};

// ── Conversation contents ───────────────────────────────────────────────────

/// Author of a [`Content`] turn, in the generative API's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// A single part of a turn: text or inline binary data.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    InlineData { mime_type: String, data: Bytes },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn inline(mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self::InlineData {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}

/// One turn of the conversation sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    /// A user turn with a single text part.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::text(text)],
        }
    }

    /// A model turn with a single text part.
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::text(text)],
        }
    }

    #[must_use]
    pub fn with_part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }
}

// ── Stream events ───────────────────────────────────────────────────────────

/// Events emitted while streaming a response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Text content delta.
    Delta(String),
    /// Stream completed successfully.
    Done(Usage),
    /// An error occurred.
    Error(String),
}

/// Generative model (Gemini and test doubles).
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    fn name(&self) -> &str;

    /// Model identifier (e.g. "gemini-1.5-flash-latest").
    fn id(&self) -> &str;

    async fn generate(&self, contents: &[Content]) -> anyhow::Result<GenerateResponse>;

    /// Stream a response, yielding delta/done/error events.
    fn stream(&self, contents: Vec<Content>) -> Pin<Box<dyn Stream<Item = StreamEvent> + Send + '_>>;
}

/// Response from a non-streaming call. `text` is `None` when the model
/// returned no text (blocked prompt, empty candidate list).
#[derive(Debug, Clone, Default)]
pub struct GenerateResponse {
    pub text: Option<String>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}
