//! Adapter from batch [`SttProvider`]s to the streaming [`SpeechRecognizer`] contract.

use std::{sync::Arc, time::Duration};

use {
    bytes::BytesMut,
    futures::StreamExt,
    tracing::{debug, warn},
};

use crate::{
    bridge::{AudioStream, RecognitionEvent, RecognitionStream, SpeechRecognizer},
    stt::{AudioFormat, SttProvider, TranscribeRequest},
};

/// Accumulates captured audio and re-transcribes the whole clip every
/// `interim_interval` of new audio, emitting the result as a partial.
/// When the audio stream ends the full clip is transcribed once more and
/// emitted as final.
pub struct BufferedRecognizer {
    provider: Arc<dyn SttProvider>,
    interim_interval: Duration,
    language: Option<String>,
}

impl BufferedRecognizer {
    pub fn new(provider: Arc<dyn SttProvider>, interim_interval: Duration) -> Self {
        Self {
            provider,
            interim_interval,
            language: None,
        }
    }

    #[must_use]
    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }
}

impl SpeechRecognizer for BufferedRecognizer {
    fn recognize(&self, mut audio: AudioStream) -> RecognitionStream {
        let provider = Arc::clone(&self.provider);
        let interval = self.interim_interval;
        let language = self.language.clone();

        Box::pin(async_stream::stream! {
            let mut pcm = BytesMut::new();
            let mut sample_rate = None;
            let mut pending = Duration::ZERO;

            while let Some(buffer) = audio.next().await {
                sample_rate.get_or_insert(buffer.sample_rate);
                pending += buffer.duration();
                pcm.extend_from_slice(&buffer.samples);

                if interval.is_zero() || pending < interval {
                    continue;
                }
                pending = Duration::ZERO;

                let request = TranscribeRequest {
                    audio: pcm.clone().freeze(),
                    format: AudioFormat::Pcm,
                    sample_rate,
                    language: language.clone(),
                };
                match provider.transcribe(request).await {
                    Ok(transcript) if !transcript.text.is_empty() => {
                        yield RecognitionEvent::Partial(transcript.text);
                    },
                    Ok(_) => {},
                    Err(e) => {
                        warn!(provider = provider.id(), error = %e, "interim transcription failed");
                        yield RecognitionEvent::Failed(e.to_string());
                        return;
                    },
                }
            }

            if pcm.is_empty() {
                yield RecognitionEvent::Final(String::new());
                return;
            }

            debug!(provider = provider.id(), bytes = pcm.len(), "final transcription");
            let request = TranscribeRequest {
                audio: pcm.freeze(),
                format: AudioFormat::Pcm,
                sample_rate,
                language,
            };
            match provider.transcribe(request).await {
                Ok(transcript) => yield RecognitionEvent::Final(transcript.text),
                Err(e) => {
                    warn!(provider = provider.id(), error = %e, "transcription failed");
                    yield RecognitionEvent::Failed(e.to_string());
                },
            }
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use {
        super::*,
        crate::{bridge::AudioBuffer, stt::Transcript},
        anyhow::{Result, anyhow},
        async_trait::async_trait,
    };

    /// Reports how many bytes it was asked to transcribe.
    #[derive(Default)]
    struct LengthStt {
        calls: Mutex<Vec<usize>>,
        fail_after: Option<usize>,
    }

    #[async_trait]
    impl SttProvider for LengthStt {
        fn id(&self) -> &'static str {
            "length"
        }

        fn name(&self) -> &'static str {
            "Length"
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn transcribe(&self, request: TranscribeRequest) -> Result<Transcript> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(request.audio.len());
            if self.fail_after.is_some_and(|n| calls.len() > n) {
                return Err(anyhow!("quota exceeded"));
            }
            assert_eq!(request.format, AudioFormat::Pcm);
            assert_eq!(request.sample_rate, Some(1_000));
            Ok(Transcript {
                text: format!("{} bytes", request.audio.len()),
                ..Default::default()
            })
        }
    }

    /// 100ms of 1kHz audio.
    fn chunk() -> AudioBuffer {
        AudioBuffer::new(vec![0u8; 200], 1_000)
    }

    fn audio(chunks: usize) -> AudioStream {
        Box::pin(futures::stream::iter((0..chunks).map(|_| chunk())))
    }

    #[tokio::test]
    async fn emits_partials_at_interval_and_final_at_end() {
        let stt = Arc::new(LengthStt::default());
        let recognizer = BufferedRecognizer::new(stt.clone(), Duration::from_millis(200));

        let events: Vec<_> = recognizer.recognize(audio(5)).collect().await;
        assert_eq!(events, vec![
            RecognitionEvent::Partial("400 bytes".into()),
            RecognitionEvent::Partial("800 bytes".into()),
            RecognitionEvent::Final("1000 bytes".into()),
        ]);
        assert_eq!(*stt.calls.lock().unwrap(), vec![400, 800, 1000]);
    }

    #[tokio::test]
    async fn empty_audio_finishes_without_request() {
        let stt = Arc::new(LengthStt::default());
        let recognizer = BufferedRecognizer::new(stt.clone(), Duration::from_secs(1));

        let events: Vec<_> = recognizer.recognize(audio(0)).collect().await;
        assert_eq!(events, vec![RecognitionEvent::Final(String::new())]);
        assert!(stt.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn provider_error_ends_stream() {
        let stt = Arc::new(LengthStt {
            fail_after: Some(1),
            ..Default::default()
        });
        let recognizer = BufferedRecognizer::new(stt, Duration::from_millis(100));

        let events: Vec<_> = recognizer.recognize(audio(4)).collect().await;
        assert_eq!(events, vec![
            RecognitionEvent::Partial("200 bytes".into()),
            RecognitionEvent::Failed("quota exceeded".into()),
        ]);
    }
}
