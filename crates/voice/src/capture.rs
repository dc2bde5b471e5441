//! [`AudioCapture`] implementations that don't need a platform audio tap.

use std::{path::PathBuf, sync::Mutex, time::Duration};

use {
    anyhow::{Result, anyhow},
    bytes::Bytes,
    tokio::{io::AsyncReadExt, sync::mpsc},
    tracing::{debug, warn},
};

use crate::bridge::{AudioBuffer, AudioCapture};

/// Capture fed by an external producer through an mpsc sender.
///
/// Single-use: the receiver is handed out on the first `start`.
pub struct ChannelCapture {
    receiver: Mutex<Option<mpsc::Receiver<AudioBuffer>>>,
}

impl ChannelCapture {
    /// Returns the capture and the sender the producer pushes buffers into.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Sender<AudioBuffer>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                receiver: Mutex::new(Some(rx)),
            },
            tx,
        )
    }
}

impl AudioCapture for ChannelCapture {
    fn start(&self) -> Result<mpsc::Receiver<AudioBuffer>> {
        self.receiver
            .lock()
            .map_err(|_| anyhow!("capture lock poisoned"))?
            .take()
            .ok_or_else(|| anyhow!("channel capture already started"))
    }
}

/// Streams raw 16-bit little-endian mono PCM from a file in fixed-size chunks.
#[derive(Debug, Clone)]
pub struct FileCapture {
    path: PathBuf,
    sample_rate: u32,
    chunk: Duration,
    realtime: bool,
}

impl FileCapture {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, sample_rate: u32) -> Self {
        Self {
            path: path.into(),
            sample_rate,
            chunk: Duration::from_millis(100),
            realtime: false,
        }
    }

    /// Size of each emitted buffer.
    #[must_use]
    pub fn with_chunk(mut self, chunk: Duration) -> Self {
        self.chunk = chunk;
        self
    }

    /// Pace buffers at playback speed, like a microphone would.
    #[must_use]
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    fn chunk_bytes(&self) -> usize {
        let frames = u128::from(self.sample_rate) * self.chunk.as_millis() / 1000;
        // Keep chunks sample-aligned and non-empty.
        (frames as usize).max(1) * 2
    }
}

impl AudioCapture for FileCapture {
    fn start(&self) -> Result<mpsc::Receiver<AudioBuffer>> {
        let (tx, rx) = mpsc::channel(16);
        let capture = self.clone();
        let chunk_bytes = self.chunk_bytes();

        tokio::spawn(async move {
            let mut file = match tokio::fs::File::open(&capture.path).await {
                Ok(f) => f,
                Err(e) => {
                    warn!(path = %capture.path.display(), error = %e, "failed to open audio file");
                    return;
                },
            };

            let mut buf = vec![0u8; chunk_bytes];
            loop {
                let n = match read_full(&mut file, &mut buf).await {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) => {
                        warn!(error = %e, "failed to read audio file");
                        break;
                    },
                };
                let chunk = AudioBuffer::new(Bytes::copy_from_slice(&buf[..n]), capture.sample_rate);
                let pause = chunk.duration();
                if tx.send(chunk).await.is_err() {
                    debug!("audio receiver dropped, stopping file capture");
                    return;
                }
                if capture.realtime {
                    tokio::time::sleep(pause).await;
                }
            }
            debug!(path = %capture.path.display(), "file capture reached end of audio");
        });

        Ok(rx)
    }
}

/// Fill `buf` unless the file ends first.
async fn read_full(file: &mut tokio::fs::File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_capture_is_single_use() {
        let (capture, tx) = ChannelCapture::new(2);
        let mut rx = capture.start().unwrap();
        assert!(capture.start().is_err());

        tx.send(AudioBuffer::new(vec![1u8, 2], 8_000)).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().samples.as_ref(), &[1, 2]);
    }

    #[tokio::test]
    async fn file_capture_streams_chunks() {
        let file = tempfile::NamedTempFile::new().unwrap();
        // 250ms of 16kHz audio: 4000 frames, 8000 bytes.
        std::fs::write(file.path(), vec![7u8; 8_000]).unwrap();

        let capture = FileCapture::new(file.path(), 16_000).with_chunk(Duration::from_millis(100));
        assert_eq!(capture.chunk_bytes(), 3_200);

        let mut rx = capture.start().unwrap();
        let mut sizes = Vec::new();
        while let Some(buf) = rx.recv().await {
            assert_eq!(buf.sample_rate, 16_000);
            sizes.push(buf.samples.len());
        }
        assert_eq!(sizes, vec![3_200, 3_200, 1_600]);
    }

    #[tokio::test]
    async fn file_capture_missing_file_closes_channel() {
        let capture = FileCapture::new("/definitely/not/here.pcm", 16_000);
        let mut rx = capture.start().unwrap();
        assert!(rx.recv().await.is_none());
    }
}
