//! Pending attachments for the next message.

use {
    genchat_media::{AttachmentSource, Media, MediaNormalizer},
    tokio::task::JoinHandle,
    tracing::{debug, warn},
};

use crate::error::Result;

/// Maximum attachments per message unless configured otherwise.
pub const DEFAULT_MAX_ATTACHMENTS: usize = 2;

type Outcome = (String, genchat_media::Result<Media>);

/// A source that could not be normalized.
#[derive(Debug)]
pub struct StagingFailure {
    pub source: String,
    pub error: genchat_media::Error,
}

/// Normalizes a selection in the background and holds the results until
/// they are taken for a send.
///
/// A new selection replaces the previous one: its in-flight normalization is
/// aborted and its results are never staged.
pub struct AttachmentStager {
    normalizer: MediaNormalizer,
    max_attachments: usize,
    pending: Vec<Media>,
    task: Option<JoinHandle<Vec<Outcome>>>,
}

impl AttachmentStager {
    pub fn new(normalizer: MediaNormalizer, max_attachments: usize) -> Self {
        Self {
            normalizer,
            max_attachments,
            pending: Vec::new(),
            task: None,
        }
    }

    /// Start normalizing `sources`, superseding any previous selection.
    ///
    /// Returns how many sources were accepted; anything past the maximum is
    /// dropped.
    pub fn select(&mut self, mut sources: Vec<AttachmentSource>) -> usize {
        self.cancel();
        self.pending.clear();

        if sources.len() > self.max_attachments {
            warn!(
                selected = sources.len(),
                max = self.max_attachments,
                "too many attachments, keeping the first ones"
            );
            sources.truncate(self.max_attachments);
        }
        if sources.is_empty() {
            return 0;
        }

        let accepted = sources.len();
        let normalizer = self.normalizer.clone();
        self.task = Some(tokio::spawn(async move {
            let jobs = sources.into_iter().map(|source| {
                let normalizer = normalizer.clone();
                async move {
                    let label = source.label();
                    (label, normalizer.normalize(source).await)
                }
            });
            futures::future::join_all(jobs).await
        }));
        debug!(accepted, "attachment selection started");
        accepted
    }

    /// Wait for the current selection and stage its successes.
    ///
    /// Failures are returned for the caller to surface.
    pub async fn settle(&mut self) -> Result<Vec<StagingFailure>> {
        let Some(task) = self.task.take() else {
            return Ok(Vec::new());
        };

        let mut failures = Vec::new();
        for (source, outcome) in task.await? {
            match outcome {
                Ok(media) => self.pending.push(media),
                Err(error) => {
                    warn!(%source, %error, "attachment rejected");
                    failures.push(StagingFailure { source, error });
                },
            }
        }
        Ok(failures)
    }

    /// Whether a selection is still being normalized.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    #[must_use]
    pub fn pending(&self) -> &[Media] {
        &self.pending
    }

    /// Drain the staged attachments for a send.
    pub fn take(&mut self) -> Vec<Media> {
        std::mem::take(&mut self.pending)
    }

    /// Abort the in-flight selection and drop staged attachments.
    pub fn clear(&mut self) {
        self.cancel();
        self.pending.clear();
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            debug!("superseding in-flight attachment selection");
            task.abort();
        }
    }
}

impl Drop for AttachmentStager {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use {
        super::*,
        async_trait::async_trait,
        genchat_media::{
            NormalizeOptions, PdfRenderer, VideoFrameExtractor, image_ops::encode_png,
        },
        image::DynamicImage,
    };

    #[derive(Default)]
    struct SlowVideo {
        started: AtomicUsize,
        finished: AtomicUsize,
    }

    #[async_trait]
    impl VideoFrameExtractor for SlowVideo {
        async fn extract_frame(
            &self,
            _data: &[u8],
            _mime_type: &str,
            _offset: Duration,
        ) -> genchat_media::Result<DynamicImage> {
            self.started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(30)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(DynamicImage::new_rgb8(16, 9))
        }
    }

    struct NoPdf;

    #[async_trait]
    impl PdfRenderer for NoPdf {
        async fn render_first_page(
            &self,
            _data: &[u8],
            _max_dimension: u32,
        ) -> genchat_media::Result<DynamicImage> {
            Err(genchat_media::Error::thumbnail("pdftoppm binary not found in PATH"))
        }
    }

    fn stager(video: Arc<SlowVideo>, max: usize) -> AttachmentStager {
        let normalizer =
            MediaNormalizer::with_renderers(NormalizeOptions::default(), video, Arc::new(NoPdf));
        AttachmentStager::new(normalizer, max)
    }

    fn png() -> AttachmentSource {
        let data = encode_png(&DynamicImage::new_rgb8(32, 16)).unwrap();
        AttachmentSource::library(data, Some("image/png".into()))
    }

    fn text(body: &'static str) -> AttachmentSource {
        AttachmentSource::library(body.as_bytes(), Some("text/plain".into()))
    }

    #[tokio::test]
    async fn stages_successes_and_reports_failures() {
        let mut stager = stager(Arc::default(), DEFAULT_MAX_ATTACHMENTS);
        let pdf = AttachmentSource::library(&b"%PDF-1.4"[..], Some("application/pdf".into()));

        assert_eq!(stager.select(vec![png(), pdf]), 2);
        let failures = stager.settle().await.unwrap();

        assert_eq!(stager.pending().len(), 1);
        assert_eq!(stager.pending()[0].mime_type, "image/jpeg");
        assert_eq!(failures.len(), 1);
        assert!(failures[0].source.contains("application/pdf"));
        assert!(matches!(
            failures[0].error,
            genchat_media::Error::ThumbnailGeneration { .. }
        ));
        assert!(!stager.is_loading());
    }

    #[tokio::test]
    async fn keeps_at_most_max_attachments() {
        let mut stager = stager(Arc::default(), 2);
        assert_eq!(stager.select(vec![text("a"), text("b"), text("c")]), 2);
        stager.settle().await.unwrap();
        assert_eq!(stager.pending().len(), 2);
    }

    #[tokio::test]
    async fn new_selection_cancels_the_previous_one() {
        let video = Arc::new(SlowVideo::default());
        let mut stager = stager(video.clone(), 2);

        let clip = AttachmentSource::library(&b"ftypisom"[..], Some("video/mp4".into()));
        stager.select(vec![clip]);
        while video.started.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(stager.is_loading());

        stager.select(vec![text("replacement")]);
        let failures = stager.settle().await.unwrap();

        assert!(failures.is_empty());
        let staged = stager.take();
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].mime_type, "text/plain");
        assert_eq!(video.finished.load(Ordering::SeqCst), 0);
        assert!(stager.pending().is_empty());
    }

    #[tokio::test]
    async fn settle_without_selection_is_empty() {
        let mut stager = stager(Arc::default(), 2);
        assert!(stager.settle().await.unwrap().is_empty());
        assert_eq!(stager.select(Vec::new()), 0);
        assert!(!stager.is_loading());
    }

    #[tokio::test]
    async fn clear_drops_staged_attachments() {
        let mut stager = stager(Arc::default(), 2);
        stager.select(vec![text("note")]);
        stager.settle().await.unwrap();
        assert_eq!(stager.pending().len(), 1);

        stager.clear();
        assert!(stager.pending().is_empty());
    }
}
