//! Generative model contract and the Gemini implementation.

pub mod gemini;
pub mod model;

pub use {
    gemini::{GeminiModelInfo, GeminiProvider},
    model::{Content, GenerateResponse, GenerativeModel, Part, Role, StreamEvent, Usage},
};

/// Shared HTTP client for providers.
///
/// Reusing one client shares the connection pool and TLS sessions.
pub fn shared_http_client() -> &'static reqwest::Client {
    static CLIENT: std::sync::LazyLock<reqwest::Client> =
        std::sync::LazyLock::new(reqwest::Client::new);
    &CLIENT
}
