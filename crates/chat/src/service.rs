//! In-memory chat session: ordered messages plus the awaiting-response flag.

use std::sync::Arc;

use {
    futures::StreamExt,
    genchat_media::Media,
    genchat_providers::{Content, GenerativeModel, Part, Role as ModelRole, StreamEvent, Usage},
    tokio::sync::broadcast,
    tracing::{debug, warn},
};

use crate::{
    error::{Context, Error, Result},
    message::{ChatMessage, Role},
};

pub const DEFAULT_GREETING: &str = "Hello! How can I help you today?";
pub const DEFAULT_FAILURE_MESSAGE: &str = "Sorry, I could not process that.\nPlease try again.";

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub greeting: String,
    /// Assistant text recorded when the model call fails.
    pub failure_message: String,
    /// Use the streaming endpoint and publish [`ChatEvent::Delta`]s.
    pub stream: bool,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.into(),
            failure_message: DEFAULT_FAILURE_MESSAGE.into(),
            stream: false,
        }
    }
}

/// State changes published to subscribers.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    MessageAppended(ChatMessage),
    AwaitingResponse(bool),
    /// Streamed text of the pending assistant reply.
    Delta(String),
}

/// A chat session. Sending takes `&mut self`, so at most one request is
/// outstanding per session.
pub struct ChatService {
    model: Arc<dyn GenerativeModel>,
    options: ChatOptions,
    messages: Vec<ChatMessage>,
    awaiting_response: bool,
    events: broadcast::Sender<ChatEvent>,
}

impl ChatService {
    pub fn new(model: Arc<dyn GenerativeModel>, options: ChatOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            model,
            options,
            messages: Vec::new(),
            awaiting_response: false,
            events,
        }
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[must_use]
    pub fn awaiting_response(&self) -> bool {
        self.awaiting_response
    }

    #[must_use]
    pub fn greeting(&self) -> &str {
        &self.options.greeting
    }

    #[must_use]
    pub fn model_id(&self) -> &str {
        self.model.id()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    /// Send a user turn and record the reply.
    ///
    /// Empty or whitespace-only `text` is rejected with
    /// [`Error::InvalidInput`] and leaves the session untouched. Otherwise
    /// the user message and an assistant message are both appended; a failed
    /// model call yields the configured failure text instead of an error.
    pub async fn send_message(
        &mut self,
        text: &str,
        attachments: Vec<Media>,
    ) -> Result<&ChatMessage> {
        if text.trim().is_empty() {
            return Err(Error::invalid_input("message text is empty"));
        }

        let contents = self.build_contents(text, &attachments);
        debug!(
            model = self.model.id(),
            turns = contents.len(),
            attachments = attachments.len(),
            stream = self.options.stream,
            "sending message"
        );

        self.append(ChatMessage::user(text, attachments));
        self.set_awaiting(true);

        let reply = if self.options.stream {
            self.stream_reply(contents).await
        } else {
            self.generate_reply(&contents).await
        };
        let message = match reply {
            Some((text, usage)) => ChatMessage::assistant(text, usage),
            None => ChatMessage::assistant(self.options.failure_message.clone(), None),
        };

        self.append(message);
        self.set_awaiting(false);
        self.messages.last().context("assistant reply was not recorded")
    }

    /// Prior turns as text, then the current turn with its attachments inline.
    fn build_contents(&self, text: &str, attachments: &[Media]) -> Vec<Content> {
        let mut contents: Vec<Content> = self
            .messages
            .iter()
            .map(|m| Content {
                role: match m.role() {
                    Role::User => ModelRole::User,
                    Role::Assistant => ModelRole::Model,
                },
                parts: vec![Part::text(m.text())],
            })
            .collect();

        let current = attachments.iter().fold(Content::user(text), |content, media| {
            content.with_part(Part::inline(media.mime_type.clone(), media.data.clone()))
        });
        contents.push(current);
        contents
    }

    async fn generate_reply(&self, contents: &[Content]) -> Option<(String, Option<Usage>)> {
        match self.model.generate(contents).await {
            Ok(resp) => match resp.text {
                Some(text) if !text.trim().is_empty() => Some((text, Some(resp.usage))),
                _ => {
                    warn!(model = self.model.id(), "model returned no text");
                    None
                },
            },
            Err(e) => {
                warn!(model = self.model.id(), error = %e, "model call failed");
                None
            },
        }
    }

    async fn stream_reply(&self, contents: Vec<Content>) -> Option<(String, Option<Usage>)> {
        let model = Arc::clone(&self.model);
        let mut stream = model.stream(contents);
        let mut text = String::new();
        let mut usage = None;

        while let Some(event) = stream.next().await {
            match event {
                StreamEvent::Delta(delta) => {
                    text.push_str(&delta);
                    self.publish(ChatEvent::Delta(delta));
                },
                StreamEvent::Done(u) => {
                    usage = Some(u);
                    break;
                },
                StreamEvent::Error(message) => {
                    warn!(model = model.id(), error = %message, "model stream failed");
                    return None;
                },
            }
        }

        if text.trim().is_empty() {
            warn!(model = model.id(), "model stream returned no text");
            return None;
        }
        Some((text, usage))
    }

    fn append(&mut self, message: ChatMessage) {
        self.messages.push(message.clone());
        self.publish(ChatEvent::MessageAppended(message));
    }

    fn set_awaiting(&mut self, awaiting: bool) {
        self.awaiting_response = awaiting;
        self.publish(ChatEvent::AwaitingResponse(awaiting));
    }

    fn publish(&self, event: ChatEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::{pin::Pin, sync::Mutex};

    use {
        super::*,
        async_trait::async_trait,
        bytes::Bytes,
        futures::Stream,
        genchat_media::Thumbnail,
        genchat_providers::GenerateResponse,
        image::DynamicImage,
        tokio::sync::broadcast::error::TryRecvError,
    };

    enum Reply {
        Text(&'static str),
        Empty,
        Fail,
        Stream(Vec<StreamEvent>),
    }

    struct ScriptedModel {
        reply: Reply,
        seen: Mutex<Vec<Vec<Content>>>,
    }

    impl ScriptedModel {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl GenerativeModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        fn id(&self) -> &str {
            "scripted-1"
        }

        async fn generate(&self, contents: &[Content]) -> anyhow::Result<GenerateResponse> {
            self.seen.lock().unwrap().push(contents.to_vec());
            match &self.reply {
                Reply::Text(text) => Ok(GenerateResponse {
                    text: Some((*text).to_string()),
                    usage: Usage {
                        input_tokens: 10,
                        output_tokens: 2,
                    },
                }),
                Reply::Empty => Ok(GenerateResponse::default()),
                Reply::Fail | Reply::Stream(_) => Err(anyhow::anyhow!("HTTP 500")),
            }
        }

        fn stream(
            &self,
            contents: Vec<Content>,
        ) -> Pin<Box<dyn Stream<Item = StreamEvent> + Send + '_>> {
            self.seen.lock().unwrap().push(contents);
            let events = match &self.reply {
                Reply::Stream(events) => events.clone(),
                _ => vec![StreamEvent::Error("not scripted".into())],
            };
            Box::pin(futures::stream::iter(events))
        }
    }

    fn service(model: Arc<ScriptedModel>, stream: bool) -> ChatService {
        ChatService::new(model, ChatOptions {
            stream,
            ..Default::default()
        })
    }

    fn jpeg_media() -> Media {
        Media {
            mime_type: "image/jpeg".into(),
            data: Bytes::from_static(b"\xff\xd8jpeg"),
            thumbnail: Thumbnail::new(DynamicImage::new_rgb8(4, 4)),
        }
    }

    fn drain(rx: &mut broadcast::Receiver<ChatEvent>) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn blank_text_changes_nothing() {
        let model = ScriptedModel::new(Reply::Text("unused"));
        let mut chat = service(model.clone(), false);
        let mut rx = chat.subscribe();

        for text in ["", "   ", "\n\t "] {
            let err = chat.send_message(text, Vec::new()).await.unwrap_err();
            assert!(matches!(err, Error::InvalidInput { .. }));
        }

        assert!(chat.messages().is_empty());
        assert!(!chat.awaiting_response());
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert!(model.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn successful_send_appends_user_then_assistant() {
        let model = ScriptedModel::new(Reply::Text("Hi there"));
        let mut chat = service(model, false);
        let mut rx = chat.subscribe();

        let reply = chat.send_message("Hello", Vec::new()).await.unwrap();
        assert_eq!(reply.text(), "Hi there");
        assert_eq!(reply.usage().unwrap().output_tokens, 2);

        let messages = chat.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role(), Role::User);
        assert_eq!(messages[0].text(), "Hello");
        assert_eq!(messages[1].role(), Role::Assistant);
        assert!(!chat.awaiting_response());

        let events = drain(&mut rx);
        assert_eq!(events.len(), 4);
        assert!(matches!(&events[0], ChatEvent::MessageAppended(m) if m.role() == Role::User));
        assert!(matches!(events[1], ChatEvent::AwaitingResponse(true)));
        assert!(matches!(&events[2], ChatEvent::MessageAppended(m) if m.text() == "Hi there"));
        assert!(matches!(events[3], ChatEvent::AwaitingResponse(false)));
    }

    #[tokio::test]
    async fn failed_call_records_fallback_text() {
        let mut chat = service(ScriptedModel::new(Reply::Fail), false);
        chat.send_message("Hello", Vec::new()).await.unwrap();

        let messages = chat.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text(), DEFAULT_FAILURE_MESSAGE);
        assert!(messages[1].usage().is_none());
        assert!(!chat.awaiting_response());
    }

    #[tokio::test]
    async fn reply_without_text_counts_as_failure() {
        let mut chat = service(ScriptedModel::new(Reply::Empty), false);
        let reply = chat.send_message("Hello", Vec::new()).await.unwrap();
        assert_eq!(reply.text(), DEFAULT_FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn custom_failure_message_is_used() {
        let mut chat = ChatService::new(ScriptedModel::new(Reply::Fail), ChatOptions {
            failure_message: "nope".into(),
            ..Default::default()
        });
        assert_eq!(chat.send_message("x", Vec::new()).await.unwrap().text(), "nope");
    }

    #[tokio::test]
    async fn history_is_sent_as_text_and_attachments_inline() {
        let model = ScriptedModel::new(Reply::Text("ok"));
        let mut chat = service(model.clone(), false);

        chat.send_message("first", Vec::new()).await.unwrap();
        chat.send_message("what is this?", vec![jpeg_media()])
            .await
            .unwrap();

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], vec![Content::user("first")]);

        let second = &seen[1];
        assert_eq!(second.len(), 3);
        assert_eq!(second[0], Content::user("first"));
        assert_eq!(second[1], Content::model("ok"));
        assert_eq!(second[2].role, ModelRole::User);
        assert_eq!(second[2].parts, vec![
            Part::text("what is this?"),
            Part::inline("image/jpeg", Bytes::from_static(b"\xff\xd8jpeg")),
        ]);

        assert_eq!(chat.messages()[2].attachments().len(), 1);
    }

    #[tokio::test]
    async fn streaming_publishes_deltas_and_appends_once() {
        let model = ScriptedModel::new(Reply::Stream(vec![
            StreamEvent::Delta("Hel".into()),
            StreamEvent::Delta("lo!".into()),
            StreamEvent::Done(Usage {
                input_tokens: 1,
                output_tokens: 2,
            }),
        ]));
        let mut chat = service(model, true);
        let mut rx = chat.subscribe();

        let reply = chat.send_message("Hi", Vec::new()).await.unwrap();
        assert_eq!(reply.text(), "Hello!");

        let deltas: Vec<String> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                ChatEvent::Delta(d) => Some(d),
                _ => None,
            })
            .collect();
        assert_eq!(deltas, vec!["Hel", "lo!"]);
        assert_eq!(chat.messages().len(), 2);
    }

    #[tokio::test]
    async fn stream_error_records_fallback() {
        let model = ScriptedModel::new(Reply::Stream(vec![
            StreamEvent::Delta("partial".into()),
            StreamEvent::Error("HTTP 503".into()),
        ]));
        let mut chat = service(model, true);

        let reply = chat.send_message("Hi", Vec::new()).await.unwrap();
        assert_eq!(reply.text(), DEFAULT_FAILURE_MESSAGE);
        assert!(!chat.awaiting_response());
    }
}
