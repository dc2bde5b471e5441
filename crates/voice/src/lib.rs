//! Voice input for genchat: live transcription into the chat input field.
//!
//! The [`TranscriptionBridge`] connects an [`AudioCapture`] to a
//! [`SpeechRecognizer`] and publishes interim text on a watch channel.
//! Batch speech-to-text services plug in through [`SttProvider`] and the
//! [`BufferedRecognizer`] adapter.

pub mod bridge;
pub mod capture;
pub mod config;
pub mod recognizer;
pub mod stt;

pub use {
    bridge::{
        AudioBuffer, AudioCapture, AudioStream, RecognitionEvent, RecognitionStream,
        SpeechRecognizer, TranscriptionBridge, TranscriptionPhase, TranscriptionState,
    },
    capture::{ChannelCapture, FileCapture},
    config::{GoogleSttConfig, SttConfig, VoiceConfig},
    recognizer::BufferedRecognizer,
    stt::{AudioFormat, GoogleStt, SttProvider, TranscribeRequest, Transcript},
};
