use std::fs::{self, OpenOptions};
use std::future::Future;
use std::io::{self, Write};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use gemini_chat::app::App;
use gemini_chat::config::{Config, ConfigArgs, Settings};
use gemini_chat::handler::handle_event;
use gemini_chat::persist;
use gemini_chat::session::{ChatSession, StreamEvent, TurnId, TurnUpdate};
use gemini_chat::signature::Sha256Signer;
use gemini_chat::storage::LocalStorage;
use gemini_chat::{GenerateClient, GenerateRequest, tui, ui};

#[derive(Parser)]
#[command(name = "gemini-chat")]
#[command(version, about = "Chat with a Gemini generation endpoint from the terminal")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    /// Store an access passphrase sent with every request
    #[arg(long, global = true)]
    pass: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message and stream the reply to stdout
    Ask {
        /// Message text
        text: String,
    },
    /// Print the stored conversation
    History,
    /// Forget the stored conversation
    Clear,
    /// Save the given options to the config file
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    if let Some(Commands::Config) = cli.command {
        return save_config(cli.config);
    }

    let settings = Settings::resolve(Config::load()?, cli.config)?;
    init_tracing(cli.command.is_none(), &settings)?;

    if let Some(pass) = cli.pass {
        let mut storage = LocalStorage::open(&settings.storage_path);
        storage.set_item(persist::PASS_KEY, pass);
        storage.save()?;
    }

    match cli.command {
        None => run_tui(&settings).await,
        Some(Commands::Ask { text }) => ask(&settings, &text).await,
        Some(Commands::History) => print_history(&settings),
        Some(Commands::Clear) => clear_history(&settings),
        Some(Commands::Config) => Ok(()),
    }
}

/// The TUI owns the terminal, so its log goes to a file instead of stderr
fn init_tracing(to_file: bool, settings: &Settings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if to_file {
        let dir = settings
            .storage_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default();
        fs::create_dir_all(&dir)?;
        let log_path = dir.join("gemini-chat.log");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("opening log file {}", log_path.display()))?;

        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false).with_writer(io::stderr))
            .with(filter)
            .init();
    }
    Ok(())
}

async fn run_tui(settings: &Settings) -> Result<()> {
    let mut terminal = tui::init()?;
    tui::install_panic_hook();

    let mut events = tui::EventHandler::new();
    let mut app = App::new(settings, events.sender());
    tracing::info!(endpoint = %settings.base_url, "chat started");

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            match events.next().await {
                Some(event) => handle_event(&mut app, event),
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    if let Err(e) = app.persist() {
        tracing::error!(error = %e, "could not save chat history");
    }
    tui::restore()?;
    result
}

async fn ask(settings: &Settings, text: &str) -> Result<()> {
    let mut storage = LocalStorage::open(&settings.storage_path);
    let restored = persist::restore(&storage);

    let mut session = ChatSession::new(settings.max_history);
    session.restore(restored.messages);

    let turn = session.send(text)?;
    let id = turn.id;
    let signer = Sha256Signer::new(settings.secret_key.as_deref());
    let request = GenerateRequest::new(
        turn,
        chrono::Utc::now().timestamp_millis(),
        persist::passphrase(&storage),
        &signer,
    );

    let client = GenerateClient::new(&settings.base_url);
    tracing::info!(endpoint = client.endpoint(), "sending message");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        client
            .stream_turn(request, |event| {
                let _ = tx.send(event);
            })
            .await;
    });
    session.attach(id, task.abort_handle());

    relay_turn(&mut session, id, &mut rx, tokio::signal::ctrl_c(), &mut io::stdout()).await?;

    if let Some(error) = session.error() {
        eprintln!("Error: {error}");
    }

    persist::snapshot(&mut storage, session.messages(), restored.stick)
}

/// Print a turn's reply as it streams. Resolving `stop` ends the turn early and
/// keeps whatever arrived so far; text already queued is printed first.
async fn relay_turn<S, W>(
    session: &mut ChatSession,
    id: TurnId,
    events: &mut mpsc::UnboundedReceiver<StreamEvent>,
    stop: S,
    out: &mut W,
) -> Result<()>
where
    S: Future,
    W: Write,
{
    tokio::pin!(stop);

    loop {
        tokio::select! {
            biased;

            event = events.recv() => {
                let Some(event) = event else { break };
                match session.apply(id, event) {
                    TurnUpdate::Appended(text) => {
                        write!(out, "{text}")?;
                        out.flush()?;
                    }
                    TurnUpdate::Finished { tail } => {
                        writeln!(out, "{tail}")?;
                        break;
                    }
                    TurnUpdate::Skipped | TurnUpdate::Ignored => {}
                }
            }
            _ = &mut stop => {
                session.stop();
                writeln!(out)?;
                break;
            }
        }
    }
    Ok(())
}

fn print_history(settings: &Settings) -> Result<()> {
    let storage = LocalStorage::open(&settings.storage_path);
    let restored = persist::restore(&storage);

    if restored.messages.is_empty() {
        println!("No messages stored in {}", settings.storage_path.display());
        return Ok(());
    }

    for msg in &restored.messages {
        let label = match msg.role {
            gemini_chat::ChatRole::User => "You",
            gemini_chat::ChatRole::Assistant => "AI",
        };
        println!("{label}:\n{}\n", msg.content);
    }
    Ok(())
}

fn clear_history(settings: &Settings) -> Result<()> {
    let mut storage = LocalStorage::open(&settings.storage_path);
    let restored = persist::restore(&storage);
    persist::snapshot(&mut storage, &[], restored.stick)?;
    println!("Cleared {} messages", restored.messages.len());
    Ok(())
}

fn save_config(args: ConfigArgs) -> Result<()> {
    let mut config = Config::load()?;
    config.merge(args);
    config.save()?;
    println!("Saved {}", Config::get_config_path()?.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use gemini_chat::ChatMessage;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_relay_prints_reply_and_archives_it() {
        let mut session = ChatSession::default();
        let id = session.send("q").unwrap().id;
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(StreamEvent::Chunk(Bytes::from_static(b"Hel"))).unwrap();
        tx.send(StreamEvent::Chunk(Bytes::from_static(b"lo"))).unwrap();
        tx.send(StreamEvent::End).unwrap();

        let mut out = Vec::new();
        relay_turn(&mut session, id, &mut rx, std::future::pending::<()>(), &mut out)
            .await
            .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "Hello\n");
        assert_eq!(session.messages().last(), Some(&ChatMessage::assistant("Hello")));
    }

    #[tokio::test]
    async fn test_relay_stop_keeps_partial_reply() {
        let mut session = ChatSession::default();
        let id = session.send("q").unwrap().id;
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(StreamEvent::Chunk(Bytes::from_static(b"partial"))).unwrap();

        // Stop fires before the stream ends; the sender stays open
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        stop_tx.send(()).unwrap();

        let mut out = Vec::new();
        relay_turn(&mut session, id, &mut rx, stop_rx, &mut out).await.unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "partial\n");
        assert!(!session.is_loading());
        assert_eq!(session.messages().last(), Some(&ChatMessage::assistant("partial")));
        drop(tx);
    }
}
