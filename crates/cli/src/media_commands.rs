use std::path::{Path, PathBuf};

use {
    anyhow::Context,
    genchat_config::GenChatConfig,
    genchat_media::{AttachmentSource, Media},
};

use crate::setup;

pub async fn handle_normalize(
    config: &GenChatConfig,
    path: PathBuf,
    thumbnail: Option<&Path>,
) -> anyhow::Result<()> {
    let normalizer = setup::build_normalizer(config)?;
    let media = normalizer
        .normalize(AttachmentSource::file(&path))
        .await
        .with_context(|| format!("failed to normalize {}", path.display()))?;

    println!("{}", describe(&media));

    if let Some(out) = thumbnail {
        let png = media.thumbnail.encode_png()?;
        tokio::fs::write(out, png)
            .await
            .with_context(|| format!("failed to write {}", out.display()))?;
        println!("thumbnail written to {}", out.display());
    }
    Ok(())
}

/// One-line summary of a normalized attachment.
pub fn describe(media: &Media) -> String {
    let (w, h) = media.thumbnail.dimensions();
    format!(
        "{} ({} bytes, preview {w}x{h})",
        media.mime_type,
        media.data.len()
    )
}
