//! Live transcription: capture → recognizer → published text.

use std::{
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use {
    anyhow::Result,
    bytes::Bytes,
    futures::StreamExt,
    tokio::{
        sync::{mpsc, watch},
        task::JoinHandle,
    },
    tokio_stream::{Stream, wrappers::ReceiverStream},
    tokio_util::sync::CancellationToken,
    tracing::{debug, warn},
};

/// A chunk of captured audio: 16-bit little-endian mono PCM.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub samples: Bytes,
    pub sample_rate: u32,
}

impl AudioBuffer {
    #[must_use]
    pub fn new(samples: impl Into<Bytes>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    /// Playback duration of this chunk.
    #[must_use]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let frames = self.samples.len() as u64 / 2;
        Duration::from_micros(frames * 1_000_000 / u64::from(self.sample_rate))
    }
}

/// Source of live audio.
///
/// `start` installs the tap and returns the receiving end of the buffer
/// channel. Capture is torn down once that receiver is dropped.
pub trait AudioCapture: Send + Sync {
    fn start(&self) -> Result<mpsc::Receiver<AudioBuffer>>;
}

/// Incremental output of a recognition request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Best transcript so far; replaces any earlier partial.
    Partial(String),
    /// Final transcript; the request is complete.
    Final(String),
    /// The request failed.
    Failed(String),
}

pub type AudioStream = Pin<Box<dyn Stream<Item = AudioBuffer> + Send>>;
pub type RecognitionStream = Pin<Box<dyn Stream<Item = RecognitionEvent> + Send>>;

/// Streaming speech recognizer.
///
/// The returned stream owns `audio`; dropping it cancels the request.
pub trait SpeechRecognizer: Send + Sync {
    fn recognize(&self, audio: AudioStream) -> RecognitionStream;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TranscriptionPhase {
    #[default]
    Idle,
    Listening,
    Finished,
    Cancelled,
    Failed(String),
}

/// What the input field binds to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptionState {
    pub text: String,
    pub phase: TranscriptionPhase,
}

struct Session {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Writes one session's updates into the shared state. Updates from a
/// session that has since been replaced are dropped.
struct Publisher {
    state: Arc<watch::Sender<TranscriptionState>>,
    generation: Arc<AtomicU64>,
    id: u64,
}

impl Publisher {
    fn update(&self, f: impl FnOnce(&mut TranscriptionState)) {
        // The generation is bumped under the same watch lock, so a check
        // here cannot interleave with a restart.
        self.state.send_if_modified(|s| {
            if self.generation.load(Ordering::Acquire) != self.id {
                return false;
            }
            f(s);
            true
        });
    }
}

/// Connects an [`AudioCapture`] to a [`SpeechRecognizer`] for the duration
/// of a press-and-hold gesture.
pub struct TranscriptionBridge {
    capture: Arc<dyn AudioCapture>,
    recognizer: Arc<dyn SpeechRecognizer>,
    state: Arc<watch::Sender<TranscriptionState>>,
    generation: Arc<AtomicU64>,
    session: Option<Session>,
}

impl TranscriptionBridge {
    pub fn new(capture: Arc<dyn AudioCapture>, recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        let (state, _) = watch::channel(TranscriptionState::default());
        Self {
            capture,
            recognizer,
            state: Arc::new(state),
            generation: Arc::new(AtomicU64::new(0)),
            session: None,
        }
    }

    /// Observe transcript updates.
    pub fn subscribe(&self) -> watch::Receiver<TranscriptionState> {
        self.state.subscribe()
    }

    /// Current transcript state.
    pub fn state(&self) -> TranscriptionState {
        self.state.borrow().clone()
    }

    /// Whether a recognition request is still running.
    pub fn is_running(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| !session.task.is_finished())
    }

    /// Start capturing and recognizing. Any previous session is cancelled.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Result<()> {
        if let Some(previous) = self.session.take() {
            previous.cancel.cancel();
        }

        let buffers = self.capture.start()?;
        let id = self.generation.load(Ordering::Acquire) + 1;
        self.state.send_modify(|s| {
            self.generation.store(id, Ordering::Release);
            *s = TranscriptionState {
                text: String::new(),
                phase: TranscriptionPhase::Listening,
            };
        });

        let events = self
            .recognizer
            .recognize(Box::pin(ReceiverStream::new(buffers)));
        let cancel = CancellationToken::new();
        let publisher = Publisher {
            state: Arc::clone(&self.state),
            generation: Arc::clone(&self.generation),
            id,
        };
        let task = tokio::spawn(run_session(events, publisher, cancel.clone()));

        debug!(session = id, "transcription started");
        self.session = Some(Session { cancel, task });
        Ok(())
    }

    /// Cancel the in-flight request, tear down capture and return the latest
    /// transcript.
    pub async fn stop(&mut self) -> String {
        if let Some(session) = self.session.take() {
            session.cancel.cancel();
            if let Err(e) = session.task.await {
                warn!(error = %e, "transcription task ended abnormally");
            }
        }
        self.state.borrow().text.clone()
    }
}

impl Drop for TranscriptionBridge {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel.cancel();
        }
    }
}

async fn run_session(
    mut events: RecognitionStream,
    state: Publisher,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                state.update(|s| s.phase = TranscriptionPhase::Cancelled);
                break;
            }
            event = events.next() => match event {
                Some(RecognitionEvent::Partial(text)) => {
                    state.update(|s| s.text = text);
                },
                Some(RecognitionEvent::Final(text)) => {
                    state.update(|s| {
                        s.text = text;
                        s.phase = TranscriptionPhase::Finished;
                    });
                    break;
                },
                Some(RecognitionEvent::Failed(message)) => {
                    warn!(error = %message, "speech recognition failed");
                    state.update(|s| s.phase = TranscriptionPhase::Failed(message));
                    break;
                },
                None => {
                    state.update(|s| s.phase = TranscriptionPhase::Finished);
                    break;
                },
            },
        }
    }
    // `events` owns the audio receiver; dropping it here removes the tap.
    drop(events);
    debug!("transcription session ended");
}
