use std::pin::Pin;

use {
    async_trait::async_trait,
    base64::Engine,
    bytes::BytesMut,
    futures::StreamExt,
    secrecy::{ExposeSecret, Secret},
    tokio_stream::Stream,
};

use tracing::{debug, trace, warn};

use crate::model::{Content, GenerateResponse, GenerativeModel, Part, StreamEvent, Usage};

/// Public endpoint of the Generative Language API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";

/// Information about a Gemini model returned from the API.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiModelInfo {
    /// Full resource name (e.g., "models/gemini-1.5-flash")
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub input_token_limit: u32,
    #[serde(default)]
    pub output_token_limit: u32,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl GeminiModelInfo {
    /// "models/gemini-1.5-flash" -> "gemini-1.5-flash"
    pub fn model_id(&self) -> &str {
        self.name.strip_prefix("models/").unwrap_or(&self.name)
    }

    pub fn supports_generation(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|m| m == "generateContent")
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<GeminiModelInfo>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// List models that support generation, sorted by name.
pub async fn list_models_with_base_url(
    client: &reqwest::Client,
    api_key: &str,
    base_url: &str,
) -> anyhow::Result<Vec<GeminiModelInfo>> {
    let url = format!("{}/v1beta/models", base_url.trim_end_matches('/'));
    let mut all_models = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let mut req = client.get(&url).header("x-goog-api-key", api_key);
        if let Some(ref token) = page_token {
            req = req.query(&[("pageToken", token)]);
        }
        let resp = req.send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Failed to list Gemini models: HTTP {status}: {body}");
        }

        let list_resp: ListModelsResponse = resp.json().await?;
        all_models.extend(list_resp.models);

        match list_resp.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }

    let mut models: Vec<_> = all_models
        .into_iter()
        .filter(|m| m.supports_generation())
        .collect();
    models.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(models)
}

#[derive(Debug)]
pub struct GeminiProvider {
    api_key: Secret<String>,
    model: String,
    base_url: String,
    max_output_tokens: Option<u32>,
    system_instruction: Option<String>,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: Secret<String>, model: String, base_url: String) -> Self {
        Self {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_output_tokens: None,
            system_instruction: None,
            client: crate::shared_http_client().clone(),
        }
    }

    #[must_use]
    pub fn with_max_output_tokens(mut self, max: Option<u32>) -> Self {
        self.max_output_tokens = max;
        self
    }

    #[must_use]
    pub fn with_system_instruction(mut self, instruction: Option<String>) -> Self {
        self.system_instruction = instruction.filter(|s| !s.trim().is_empty());
        self
    }

    /// List available models using this provider's API key.
    pub async fn list_available_models(&self) -> anyhow::Result<Vec<GeminiModelInfo>> {
        list_models_with_base_url(&self.client, self.api_key.expose_secret(), &self.base_url).await
    }

    fn build_body(&self, contents: &[Content]) -> serde_json::Value {
        let mut body = serde_json::json!({ "contents": to_gemini_contents(contents) });

        if let Some(max) = self.max_output_tokens {
            body["generationConfig"] = serde_json::json!({ "maxOutputTokens": max });
        }
        if let Some(ref sys) = self.system_instruction {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{ "text": sys }]
            });
        }
        body
    }

    fn url(&self, method: &str) -> String {
        format!("{}/v1beta/models/{}:{method}", self.base_url, self.model)
    }
}

/// Convert turns to Gemini's `contents` array.
///
/// Text parts become `{ "text": ... }`, inline data becomes
/// `{ "inlineData": { "mimeType": ..., "data": <base64> } }`.
fn to_gemini_contents(contents: &[Content]) -> Vec<serde_json::Value> {
    contents
        .iter()
        .map(|content| {
            let parts: Vec<serde_json::Value> = content
                .parts
                .iter()
                .map(|part| match part {
                    Part::Text(text) => serde_json::json!({ "text": text }),
                    Part::InlineData { mime_type, data } => serde_json::json!({
                        "inlineData": {
                            "mimeType": mime_type,
                            "data": base64::engine::general_purpose::STANDARD.encode(data),
                        }
                    }),
                })
                .collect();
            serde_json::json!({
                "role": content.role.as_str(),
                "parts": parts,
            })
        })
        .collect()
}

/// Extract text content from Gemini response parts.
fn extract_text(parts: &[serde_json::Value]) -> Option<String> {
    let texts: Vec<&str> = parts
        .iter()
        .filter_map(|part| part["text"].as_str())
        .collect();

    if texts.is_empty() {
        None
    } else {
        Some(texts.join(""))
    }
}

fn parse_usage(resp: &serde_json::Value, usage: &mut Usage) {
    let meta = &resp["usageMetadata"];
    if let Some(pt) = meta["promptTokenCount"].as_u64() {
        usage.input_tokens = pt as u32;
    }
    if let Some(ct) = meta["candidatesTokenCount"].as_u64() {
        usage.output_tokens = ct as u32;
    }
}

/// Incremental parser for the `alt=sse` response body.
#[derive(Debug, Default)]
struct SseDecoder {
    buf: BytesMut,
    usage: Usage,
}

/// What one SSE event contributed.
#[derive(Debug, Default, PartialEq)]
struct SseUpdate {
    deltas: Vec<String>,
    finished: bool,
}

impl SseDecoder {
    /// Feed a chunk; returns the updates of every event it completes.
    ///
    /// Bytes are buffered until an event boundary, so characters split
    /// across chunks decode intact. `\r` never appears unescaped in the JSON
    /// payload and is dropped, which turns CRLF line endings into LF.
    fn push(&mut self, chunk: &[u8]) -> Vec<SseUpdate> {
        self.buf
            .extend(chunk.iter().copied().filter(|&b| b != b'\r'));

        let mut updates = Vec::new();
        while let Some(pos) = self.buf.windows(2).position(|w| w == b"\n\n") {
            let raw = self.buf.split_to(pos + 2);
            let block = String::from_utf8_lossy(&raw);
            for line in block.lines() {
                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                match serde_json::from_str::<serde_json::Value>(data.trim_start()) {
                    Ok(evt) => updates.push(self.apply(&evt)),
                    Err(e) => trace!(error = %e, data, "skipping malformed SSE data"),
                }
            }
        }
        updates
    }

    fn apply(&mut self, evt: &serde_json::Value) -> SseUpdate {
        parse_usage(evt, &mut self.usage);

        let candidate = &evt["candidates"][0];
        let deltas = candidate["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let finished = candidate["finishReason"]
            .as_str()
            .is_some_and(|reason| reason == "STOP" || reason == "MAX_TOKENS");

        SseUpdate { deltas, finished }
    }
}

#[async_trait]
impl GenerativeModel for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, contents: &[Content]) -> anyhow::Result<GenerateResponse> {
        let body = self.build_body(contents);

        debug!(
            model = %self.model,
            contents_count = contents.len(),
            has_system = self.system_instruction.is_some(),
            "gemini generate request"
        );
        trace!(body = %serde_json::to_string(&body).unwrap_or_default(), "gemini request body");

        let http_resp = self
            .client
            .post(self.url("generateContent"))
            .header("x-goog-api-key", self.api_key.expose_secret())
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = http_resp.status();
        if !status.is_success() {
            let body_text = http_resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body_text, "gemini API error");
            anyhow::bail!("Gemini API error HTTP {status}: {body_text}");
        }

        let resp = http_resp.json::<serde_json::Value>().await?;
        trace!(response = %resp, "gemini raw response");

        if let Some(reason) = resp["promptFeedback"]["blockReason"].as_str() {
            warn!(reason, "gemini blocked the prompt");
        }

        let parts = resp["candidates"][0]["content"]["parts"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        let mut usage = Usage::default();
        parse_usage(&resp, &mut usage);

        Ok(GenerateResponse {
            text: extract_text(&parts),
            usage,
        })
    }

    fn stream(&self, contents: Vec<Content>) -> Pin<Box<dyn Stream<Item = StreamEvent> + Send + '_>> {
        Box::pin(async_stream::stream! {
            let body = self.build_body(&contents);
            debug!(model = %self.model, contents_count = contents.len(), "gemini stream request");

            let resp = match self
                .client
                .post(self.url("streamGenerateContent"))
                .query(&[("alt", "sse")])
                .header("x-goog-api-key", self.api_key.expose_secret())
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await
            {
                Ok(r) => {
                    if let Err(e) = r.error_for_status_ref() {
                        let status = e.status().map(|s| s.as_u16()).unwrap_or(0);
                        let body_text = r.text().await.unwrap_or_default();
                        warn!(status, body = %body_text, "gemini stream error");
                        yield StreamEvent::Error(format!("HTTP {status}: {body_text}"));
                        return;
                    }
                    r
                }
                Err(e) => {
                    yield StreamEvent::Error(e.to_string());
                    return;
                }
            };

            let mut byte_stream = resp.bytes_stream();
            let mut decoder = SseDecoder::default();

            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        yield StreamEvent::Error(e.to_string());
                        return;
                    }
                };

                for update in decoder.push(&chunk) {
                    for delta in update.deltas {
                        yield StreamEvent::Delta(delta);
                    }
                    if update.finished {
                        yield StreamEvent::Done(decoder.usage);
                        return;
                    }
                }
            }

            // Body ended without a finish reason.
            yield StreamEvent::Done(decoder.usage);
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, mockito::Matcher};

    fn provider(base_url: &str) -> GeminiProvider {
        GeminiProvider::new(
            Secret::new("test-key".into()),
            "gemini-test".into(),
            base_url.into(),
        )
    }

    #[test]
    fn to_gemini_contents_encodes_inline_data() {
        let contents = vec![
            Content::user("hi"),
            Content::model("hello"),
            Content::user("what is this?").with_part(Part::inline("image/jpeg", &b"abc"[..])),
        ];

        let gemini = to_gemini_contents(&contents);

        assert_eq!(gemini.len(), 3);
        assert_eq!(gemini[1]["role"], "model");
        assert_eq!(gemini[2]["parts"][0]["text"], "what is this?");
        assert_eq!(gemini[2]["parts"][1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(gemini[2]["parts"][1]["inlineData"]["data"], "YWJj");
    }

    #[test]
    fn build_body_adds_optional_sections() {
        let p = provider("https://example.com");
        let body = p.build_body(&[Content::user("x")]);
        assert!(body.get("generationConfig").is_none());
        assert!(body.get("systemInstruction").is_none());

        let p = provider("https://example.com")
            .with_max_output_tokens(Some(256))
            .with_system_instruction(Some("Be brief".into()));
        let body = p.build_body(&[Content::user("x")]);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 256);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief");
    }

    #[test]
    fn blank_system_instruction_is_ignored() {
        let p = provider("https://example.com").with_system_instruction(Some("  ".into()));
        assert!(p.system_instruction.is_none());
    }

    #[test]
    fn extract_text_combines_text_parts() {
        let parts = vec![
            serde_json::json!({ "text": "Hello " }),
            serde_json::json!({ "text": "world!" }),
        ];
        assert_eq!(extract_text(&parts), Some("Hello world!".to_string()));
        assert_eq!(extract_text(&[]), None);
    }

    #[test]
    fn sse_decoder_handles_split_events() {
        let mut decoder = SseDecoder::default();
        assert!(decoder
            .push(b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hel")
            .is_empty());

        let updates = decoder.push(b"lo\"}]}}]}\n\ndata: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\" there\"}]},\"finishReason\":\"STOP\"}],\"usageMetadata\":{\"promptTokenCount\":4,\"candidatesTokenCount\":2}}\r\n\r\n");
        assert_eq!(updates, vec![
            SseUpdate {
                deltas: vec!["Hello".into()],
                finished: false,
            },
            SseUpdate {
                deltas: vec![" there".into()],
                finished: true,
            },
        ]);
        assert_eq!(decoder.usage, Usage {
            input_tokens: 4,
            output_tokens: 2,
        });
    }

    #[test]
    fn sse_decoder_keeps_characters_split_across_chunks() {
        let event = "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"café\"}]}}]}\r\n\r\n";
        let bytes = event.as_bytes();
        let split = event.find('é').unwrap() + 1;
        let crlf = bytes.len() - 3;

        let mut decoder = SseDecoder::default();
        assert!(decoder.push(&bytes[..split]).is_empty());
        assert!(decoder.push(&bytes[split..crlf]).is_empty());
        let updates = decoder.push(&bytes[crlf..]);

        assert_eq!(updates, vec![SseUpdate {
            deltas: vec!["café".into()],
            finished: false,
        }]);
        assert!(decoder.buf.is_empty());
    }

    #[test]
    fn sse_decoder_skips_malformed_data() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: not json\n\n: keep-alive\n\n").is_empty());
    }

    #[test]
    fn gemini_model_info_helpers() {
        let info = GeminiModelInfo {
            name: "models/gemini-1.5-flash".into(),
            display_name: "Gemini 1.5 Flash".into(),
            input_token_limit: 1_000_000,
            output_token_limit: 8192,
            supported_generation_methods: vec!["generateContent".into()],
        };
        assert_eq!(info.model_id(), "gemini-1.5-flash");
        assert!(info.supports_generation());
    }

    #[tokio::test]
    async fn generate_sends_key_and_contents() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-test:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "contents": [{ "role": "user", "parts": [{ "text": "Hello" }] }],
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "candidates": [{ "content": { "role": "model", "parts": [{ "text": "Hi!" }] } }],
                    "usageMetadata": { "promptTokenCount": 3, "candidatesTokenCount": 1 }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let resp = provider(&server.url())
            .generate(&[Content::user("Hello")])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(resp.text.as_deref(), Some("Hi!"));
        assert_eq!(resp.usage.input_tokens, 3);
        assert_eq!(resp.usage.output_tokens, 1);
    }

    #[tokio::test]
    async fn generate_without_candidates_has_no_text() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-test:generateContent")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#)
            .create_async()
            .await;

        let resp = provider(&server.url())
            .generate(&[Content::user("Hello")])
            .await
            .unwrap();
        assert!(resp.text.is_none());
    }

    #[tokio::test]
    async fn generate_http_error_is_err() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-test:generateContent")
            .with_status(403)
            .with_body("API key not valid")
            .create_async()
            .await;

        let err = provider(&server.url())
            .generate(&[Content::user("Hello")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("403"));
    }

    #[tokio::test]
    async fn stream_yields_deltas_then_done() {
        let mut server = mockito::Server::new_async().await;
        let body = concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Once \"}]}}]}\n\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"upon\"}]},\"finishReason\":\"STOP\"}],",
            "\"usageMetadata\":{\"promptTokenCount\":5,\"candidatesTokenCount\":2}}\n\n",
        );
        let mock = server
            .mock("POST", "/v1beta/models/gemini-test:streamGenerateContent")
            .match_query(Matcher::UrlEncoded("alt".into(), "sse".into()))
            .match_header("x-goog-api-key", "test-key")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let p = provider(&server.url());
        let events: Vec<StreamEvent> = p.stream(vec![Content::user("Tell a story")]).collect().await;

        mock.assert_async().await;
        assert_eq!(events, vec![
            StreamEvent::Delta("Once ".into()),
            StreamEvent::Delta("upon".into()),
            StreamEvent::Done(Usage {
                input_tokens: 5,
                output_tokens: 2,
            }),
        ]);
    }

    #[tokio::test]
    async fn stream_http_error_yields_error_event() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-test:streamGenerateContent")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let p = provider(&server.url());
        let events: Vec<StreamEvent> = p.stream(vec![Content::user("x")]).collect().await;
        assert_eq!(events, vec![StreamEvent::Error("HTTP 500: boom".into())]);
    }

    #[tokio::test]
    async fn list_models_follows_pages_and_filters() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/v1beta/models")
            .match_query(Matcher::Missing)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "models": [
                        { "name": "models/gemini-b", "supportedGenerationMethods": ["generateContent"] },
                        { "name": "models/embedding", "supportedGenerationMethods": ["embedContent"] }
                    ],
                    "nextPageToken": "p2"
                })
                .to_string(),
            )
            .create_async()
            .await;
        let second = server
            .mock("GET", "/v1beta/models")
            .match_query(Matcher::UrlEncoded("pageToken".into(), "p2".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "models": [
                        { "name": "models/gemini-a", "supportedGenerationMethods": ["generateContent"] }
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let models = provider(&server.url()).list_available_models().await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        let ids: Vec<_> = models.iter().map(GeminiModelInfo::model_id).collect();
        assert_eq!(ids, vec!["gemini-a", "gemini-b"]);
    }
}
