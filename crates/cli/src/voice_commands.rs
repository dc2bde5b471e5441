use std::{io::Write, path::PathBuf, sync::Arc, time::Duration};

use {
    anyhow::bail,
    genchat_config::GenChatConfig,
    genchat_voice::{
        BufferedRecognizer, FileCapture, GoogleStt, SttProvider, TranscriptionBridge,
        TranscriptionPhase,
    },
    tracing::debug,
};

pub async fn handle_transcribe(
    config: &GenChatConfig,
    path: PathBuf,
    realtime: bool,
) -> anyhow::Result<()> {
    let text = transcribe_file(config, path, realtime).await?;
    println!("{text}");
    Ok(())
}

/// Run the transcription bridge over a PCM file, echoing partial text to
/// stderr, and return the final transcript.
pub async fn transcribe_file(
    config: &GenChatConfig,
    path: PathBuf,
    realtime: bool,
) -> anyhow::Result<String> {
    let stt = &config.voice.stt;
    if !stt.enabled {
        bail!("voice input is disabled; set voice.stt.enabled = true");
    }
    if stt.provider != "google" {
        bail!("unsupported speech-to-text provider \"{}\"", stt.provider);
    }
    let provider = GoogleStt::from_config(&stt.google, stt.language.clone());
    if !provider.is_configured() {
        bail!("no speech-to-text key configured; set GOOGLE_STT_API_KEY");
    }

    let recognizer = BufferedRecognizer::new(
        Arc::new(provider),
        Duration::from_millis(stt.interim_interval_ms),
    )
    .with_language(stt.language.clone());
    let capture = FileCapture::new(path, stt.sample_rate).realtime(realtime);

    let mut bridge = TranscriptionBridge::new(Arc::new(capture), Arc::new(recognizer));
    let mut updates = bridge.subscribe();
    bridge.start()?;

    let mut shown = String::new();
    loop {
        updates.changed().await?;
        let state = updates.borrow_and_update().clone();
        if state.text != shown {
            eprint!("\r\x1b[2K… {}", state.text);
            std::io::stderr().flush().ok();
            shown = state.text;
        }
        match state.phase {
            TranscriptionPhase::Idle | TranscriptionPhase::Listening => continue,
            TranscriptionPhase::Finished => break,
            TranscriptionPhase::Cancelled => bail!("transcription cancelled"),
            TranscriptionPhase::Failed(message) => bail!("transcription failed: {message}"),
        }
    }
    eprintln!();

    let text = bridge.stop().await;
    debug!(chars = text.chars().count(), "transcription finished");
    Ok(text)
}
