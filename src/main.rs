//! Persona Chat - terminal front end
//!
//! Reads commands and messages from stdin and prints the conversation to
//! stdout. Logs go to stderr.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use persona_chat::config::Config;
use persona_chat::remote::{HttpRemote, RemoteService};
use persona_chat::session::{Mode, SessionController, SessionError, SessionOptions, TerminalSink};

const HELP: &str = "\
Commands:
  /auto          generate a whole conversation and play it back
  /interactive   start a new interactive conversation
  /toggle        switch who your next message is spoken by
  /show <n>      show the retrieved information behind turn n
  /persona       print the persona description
  /help          show this help
  /quit          exit
Anything else is sent as a message in interactive mode.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "persona_chat=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load()?;
    let persona = config
        .session
        .persona
        .clone()
        .context("no persona configured (set PERSONA_CHAT_PERSONA or session.persona)")?;

    let remote = Arc::new(HttpRemote::new(config.backend.url()?, config.backend.timeout())?);
    tracing::info!(backend = %remote.base_url(), %persona, "connecting to backend");

    match remote.persona(&persona).await {
        Ok(_) => tracing::info!(%persona, "persona loaded"),
        Err(e) => tracing::warn!(%persona, error = %e, "could not load persona description"),
    }

    let controller = SessionController::with_options(
        persona.clone(),
        remote.clone(),
        Arc::new(TerminalSink::stdout()),
        SessionOptions::from_config(&config),
    );

    println!("{}", HELP);
    controller.select_mode(Mode::Interactive).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, arg) = match line.split_once(' ') {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };

        match command {
            "/quit" | "/exit" => break,
            "/help" => println!("{}", HELP),
            "/interactive" => {
                controller.select_mode(Mode::Interactive).await;
            }
            "/auto" => {
                if let Some(handle) = controller.select_mode(Mode::Auto).await {
                    tokio::spawn(async move {
                        let report = handle.join().await;
                        tracing::debug!(
                            generation = report.generation,
                            emitted = report.emitted,
                            total = report.total,
                            outcome = ?report.outcome,
                            "playback ended"
                        );
                    });
                }
            }
            "/toggle" => match controller.toggle_speaker() {
                Ok(speaker) => println!("Now speaking as {}", speaker),
                Err(e) => println!("{}", e),
            },
            "/show" => match arg.parse::<u64>() {
                Ok(sequence) => {
                    controller.inspect(sequence);
                }
                Err(_) => println!("usage: /show <turn number>"),
            },
            "/persona" => match remote.persona(&persona).await {
                Ok(value) => println!(
                    "{}",
                    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
                ),
                Err(e) => println!("Could not load persona: {}", e),
            },
            _ => match controller.send_interactive_turn(line).await {
                Ok(()) | Err(SessionError::EmptyInput) => {}
                Err(e @ SessionError::NotInteractive) => {
                    println!("{} (use /interactive to start one)", e)
                }
            },
        }
    }

    tracing::info!(session = %controller.session_id(), "session closed");
    Ok(())
}
