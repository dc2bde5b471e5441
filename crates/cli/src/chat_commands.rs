//! Interactive chat loop.

use std::{io::Write, path::PathBuf, sync::Arc};

use {
    genchat_chat::{AttachmentStager, ChatEvent, ChatService, Role},
    genchat_config::GenChatConfig,
    genchat_media::AttachmentSource,
    tokio::{
        io::{AsyncBufReadExt, BufReader},
        sync::{Notify, broadcast},
    },
    tracing::warn,
};

use crate::{media_commands::describe, setup, voice_commands};

const HELP: &str = "\
commands:
  /attach <path>...   stage attachments for the next message
  /listen <pcm-file>  transcribe audio into the next message
  /history            show the conversation so far
  /quit               exit";

/// A parsed line of REPL input.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Send(String),
    Attach(Vec<PathBuf>),
    Listen(PathBuf),
    History,
    Help,
    Quit,
    Unknown(String),
    Empty,
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    let Some(command) = line.strip_prefix('/') else {
        return if line.is_empty() {
            Input::Empty
        } else {
            Input::Send(line.to_string())
        };
    };

    let mut words = command.split_whitespace();
    match (words.next(), words.clone().next()) {
        (Some("attach"), Some(_)) => Input::Attach(words.map(PathBuf::from).collect()),
        (Some("listen"), Some(path)) => Input::Listen(PathBuf::from(path)),
        (Some("history"), _) => Input::History,
        (Some("help"), _) => Input::Help,
        (Some("quit" | "exit"), _) => Input::Quit,
        _ => Input::Unknown(line.to_string()),
    }
}

/// Join a dictated draft and a typed line into one message.
fn compose(draft: &str, typed: &str) -> String {
    match (draft.trim(), typed.trim()) {
        ("", typed) => typed.to_string(),
        (draft, "") => draft.to_string(),
        (draft, typed) => format!("{draft} {typed}"),
    }
}

pub async fn run_chat(config: &GenChatConfig) -> anyhow::Result<()> {
    let model = Arc::new(setup::build_provider(config)?);
    let mut chat = ChatService::new(model, setup::chat_options(config));
    let mut stager =
        AttachmentStager::new(setup::build_normalizer(config)?, config.chat.max_attachments);

    let reply_done = Arc::new(Notify::new());
    let printer = tokio::spawn(print_replies(chat.subscribe(), Arc::clone(&reply_done)));

    println!("[{}] {}", chat.model_id(), chat.greeting());
    println!("type /help for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut draft = String::new();

    loop {
        prompt(stager.pending().len(), &draft);
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_input(&line) {
            Input::Send(typed) => {
                let text = compose(&draft, &typed);
                draft.clear();
                send_turn(&mut chat, &mut stager, &reply_done, &text).await?;
            },
            Input::Empty if !draft.is_empty() => {
                let text = std::mem::take(&mut draft);
                send_turn(&mut chat, &mut stager, &reply_done, &text).await?;
            },
            Input::Empty => {},
            Input::Attach(paths) => {
                let selected = paths.len();
                let accepted =
                    stager.select(paths.into_iter().map(AttachmentSource::file).collect());
                if accepted < selected {
                    println!("only the first {accepted} of {selected} files are attached");
                }
                for failure in stager.settle().await? {
                    eprintln!("could not attach {}: {}", failure.source, failure.error);
                }
                for media in stager.pending() {
                    println!("attached {}", describe(media));
                }
            },
            Input::Listen(path) => {
                match voice_commands::transcribe_file(config, path, true).await {
                    Ok(text) if text.trim().is_empty() => println!("(no speech recognized)"),
                    Ok(text) => {
                        draft = compose(&draft, &text);
                        println!("dictated: {draft}");
                        println!("press enter to send, or keep typing to append");
                    },
                    Err(e) => eprintln!("{e:#}"),
                }
            },
            Input::History => print_history(&chat),
            Input::Help => println!("{HELP}"),
            Input::Quit => break,
            Input::Unknown(command) => eprintln!("unknown command {command}; try /help"),
        }
    }

    stager.clear();
    drop(chat);
    if let Err(e) = printer.await {
        warn!(error = %e, "reply printer ended abnormally");
    }
    Ok(())
}

async fn send_turn(
    chat: &mut ChatService,
    stager: &mut AttachmentStager,
    reply_done: &Notify,
    text: &str,
) -> anyhow::Result<()> {
    for failure in stager.settle().await? {
        eprintln!("could not attach {}: {}", failure.source, failure.error);
    }
    let attachments = stager.take();

    match chat.send_message(text, attachments).await {
        Ok(_) => reply_done.notified().await,
        Err(e) => eprintln!("not sent: {e}"),
    }
    Ok(())
}

fn prompt(attachments: usize, draft: &str) {
    let mut out = std::io::stdout();
    if attachments > 0 {
        write!(out, "[{attachments} attached] ").ok();
    }
    if !draft.is_empty() {
        write!(out, "{draft} ").ok();
    }
    write!(out, "> ").ok();
    out.flush().ok();
}

fn print_history(chat: &ChatService) {
    if chat.messages().is_empty() {
        println!("(no messages yet)");
        return;
    }
    for message in chat.messages() {
        let who = match message.role() {
            Role::User => "you",
            Role::Assistant => "model",
        };
        println!("{who}: {}", message.text());
        for media in message.attachments() {
            println!("    + {}", describe(media));
        }
        if let Some(usage) = message.usage() {
            println!(
                "    ({} tokens in, {} out)",
                usage.input_tokens, usage.output_tokens
            );
        }
    }
}

/// Terminal rendering of one assistant reply.
#[derive(Debug, Default)]
struct ReplyView {
    shown: String,
    gap: bool,
}

impl ReplyView {
    fn delta(&mut self, text: &str) -> String {
        let prefix = if self.shown.is_empty() { "model: " } else { "" };
        self.shown.push_str(text);
        format!("{prefix}{text}")
    }

    /// Some deltas were never received.
    fn lagged(&mut self) {
        self.gap = true;
    }

    /// Output for the recorded reply. The full text is printed again when it
    /// differs from what was streamed, as with a fallback after a failed
    /// stream.
    fn finish(&mut self, text: &str) -> String {
        let mut out = String::new();
        if !self.shown.is_empty() {
            out.push('\n');
        }
        if self.gap || self.shown != text {
            out.push_str(&format!("model: {text}\n"));
        }
        *self = Self::default();
        out
    }
}

/// Print streamed deltas as they arrive, then each recorded reply. Signals
/// `done` once a reply has been printed.
///
/// The assistant append is among the last events of a turn and the sender
/// waits on `done` before starting another, so a lag only ever drops deltas.
async fn print_replies(mut events: broadcast::Receiver<ChatEvent>, done: Arc<Notify>) {
    let mut view = ReplyView::default();
    loop {
        match events.recv().await {
            Ok(ChatEvent::Delta(text)) => {
                print!("{}", view.delta(&text));
                std::io::stdout().flush().ok();
            },
            Ok(ChatEvent::MessageAppended(message)) if message.role() == Role::Assistant => {
                print!("{}", view.finish(message.text()));
                std::io::stdout().flush().ok();
                done.notify_one();
            },
            Ok(_) => {},
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "reply printer fell behind");
                view.lagged();
            },
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
