mod chat_commands;
mod doctor_commands;
mod media_commands;
mod setup;
mod voice_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "genchat", about = "genchat: chat with Gemini from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery in ./ and ~/.config/genchat/).
    #[arg(long, global = true, env = "GENCHAT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default when no subcommand is provided).
    Chat,
    /// Normalize an attachment and print what would be sent.
    Normalize {
        path: PathBuf,
        /// Write the preview thumbnail as PNG.
        #[arg(long)]
        thumbnail: Option<PathBuf>,
    },
    /// List Gemini models that support generation.
    Models,
    /// Print the obfuscated byte array for a string, using the configured salt.
    Obfuscate { text: String },
    /// Transcribe a raw 16-bit mono PCM file.
    Transcribe {
        path: PathBuf,
        /// Feed audio at playback speed instead of as fast as possible.
        #[arg(long, default_value_t = false)]
        realtime: bool,
    },
    /// Validate the config and check external tools.
    Doctor,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "genchat starting");

    let config = setup::load_config(cli.config.as_deref())?;

    match cli.command {
        None | Some(Commands::Chat) => chat_commands::run_chat(&config).await,
        Some(Commands::Normalize { path, thumbnail }) => {
            media_commands::handle_normalize(&config, path, thumbnail.as_deref()).await
        },
        Some(Commands::Models) => handle_models(&config).await,
        Some(Commands::Obfuscate { text }) => {
            let obfuscator = config.obfuscation.obfuscator()?;
            println!("{:?}", obfuscator.obfuscate(&text));
            Ok(())
        },
        Some(Commands::Transcribe { path, realtime }) => {
            voice_commands::handle_transcribe(&config, path, realtime).await
        },
        Some(Commands::Doctor) => doctor_commands::handle_doctor(&config, cli.config.as_deref()),
    }
}

async fn handle_models(config: &genchat_config::GenChatConfig) -> anyhow::Result<()> {
    let provider = setup::build_provider(config)?;
    let models = provider.list_available_models().await?;
    if models.is_empty() {
        println!("No generation models available.");
        return Ok(());
    }
    for model in &models {
        let marker = if model.model_id() == config.model.model {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {:<36} {} (in {}, out {})",
            model.model_id(),
            model.display_name,
            model.input_token_limit,
            model.output_token_limit
        );
    }
    Ok(())
}
