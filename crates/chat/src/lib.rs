//! Chat session state: ordered messages, the awaiting-response flag, change
//! events, and staging of attachments for the next message.

pub mod error;
pub mod message;
pub mod service;
pub mod staging;

pub use {
    error::{Error, Result},
    message::{ChatMessage, Role},
    service::{ChatEvent, ChatOptions, ChatService},
    staging::{AttachmentStager, StagingFailure},
};
