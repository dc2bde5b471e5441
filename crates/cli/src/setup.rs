//! Turn a loaded config into the runtime pieces: provider, normalizer, options.

use std::{path::Path, sync::Arc, time::Duration};

use {
    anyhow::{Context, bail},
    genchat_chat::ChatOptions,
    genchat_config::GenChatConfig,
    genchat_media::{
        FfmpegFrameExtractor, MediaNormalizer, NormalizeOptions, PopplerRenderer,
    },
    genchat_providers::GeminiProvider,
    tracing::debug,
};

/// Load the explicit config file, or discover one, then apply env overrides.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<GenChatConfig> {
    let config = match path {
        Some(path) => genchat_config::load_config(path)?,
        None => genchat_config::discover_and_load(),
    };
    Ok(genchat_config::apply_env_overrides(config))
}

pub fn build_provider(config: &GenChatConfig) -> anyhow::Result<GeminiProvider> {
    let model = &config.model;
    if model.provider != "gemini" {
        bail!("unsupported model provider \"{}\"", model.provider);
    }
    let obfuscator = config.obfuscation.obfuscator()?;
    let Some(api_key) = model.resolve_api_key(&obfuscator)? else {
        bail!("no API key configured; set GEMINI_API_KEY or [model].api_key");
    };
    debug!(model = %model.model, base_url = %model.base_url, "building Gemini provider");
    Ok(
        GeminiProvider::new(api_key, model.model.clone(), model.base_url.clone())
            .with_max_output_tokens(model.max_output_tokens)
            .with_system_instruction(model.system_instruction.clone()),
    )
}

pub fn normalize_options(config: &GenChatConfig) -> anyhow::Result<NormalizeOptions> {
    let media = &config.media;
    let frame_offset = Duration::try_from_secs_f64(media.video_frame_offset_secs)
        .context("media.video_frame_offset_secs")?;
    Ok(NormalizeOptions {
        max_dimension: media.max_dimension,
        jpeg_quality: media.jpeg_quality,
        frame_offset,
        text_preview_chars: media.text_preview_chars,
        ..NormalizeOptions::default()
    })
}

pub fn build_normalizer(config: &GenChatConfig) -> anyhow::Result<MediaNormalizer> {
    let media = &config.media;
    Ok(MediaNormalizer::with_renderers(
        normalize_options(config)?,
        Arc::new(FfmpegFrameExtractor::new(media.ffmpeg_path.clone())),
        Arc::new(PopplerRenderer::new(
            media.pdfinfo_path.clone(),
            media.pdftoppm_path.clone(),
        )),
    ))
}

pub fn chat_options(config: &GenChatConfig) -> ChatOptions {
    ChatOptions {
        greeting: config.chat.greeting.clone(),
        failure_message: config.chat.failure_message.clone(),
        stream: config.chat.stream,
    }
}
