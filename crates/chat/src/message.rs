//! Messages of an in-memory chat session.

use {genchat_media::Media, genchat_providers::Usage, serde::Serialize, uuid::Uuid};

/// Who authored a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the conversation. Immutable once created.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    id: Uuid,
    role: Role,
    text: String,
    attachments: Vec<Media>,
    created_at: u64,
    usage: Option<Usage>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>, attachments: Vec<Media>) -> Self {
        Self::new(Role::User, text.into(), attachments, None)
    }

    pub fn assistant(text: impl Into<String>, usage: Option<Usage>) -> Self {
        Self::new(Role::Assistant, text.into(), Vec::new(), usage)
    }

    fn new(role: Role, text: String, attachments: Vec<Media>, usage: Option<Usage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text,
            attachments,
            created_at: now_ms(),
            usage,
        }
    }

    /// Unique and stable for the lifetime of the session.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn attachments(&self) -> &[Media] {
        &self.attachments
    }

    /// Milliseconds since the Unix epoch.
    #[must_use]
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Token usage reported for an assistant reply, when the model sent it.
    #[must_use]
    pub fn usage(&self) -> Option<Usage> {
        self.usage
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = ChatMessage::user("hi", Vec::new());
        let b = ChatMessage::user("hi", Vec::new());
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn constructors_set_role() {
        let user = ChatMessage::user("question", Vec::new());
        assert_eq!(user.role(), Role::User);
        assert_eq!(user.text(), "question");
        assert!(user.usage().is_none());

        let usage = Usage {
            input_tokens: 3,
            output_tokens: 7,
        };
        let reply = ChatMessage::assistant("answer", Some(usage));
        assert_eq!(reply.role(), Role::Assistant);
        assert!(reply.attachments().is_empty());
        assert_eq!(reply.usage(), Some(usage));
        assert!(reply.created_at() > 0);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
    }
}
