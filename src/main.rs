use betwise::client::ModelClient;
use betwise::engine::{AssistantEngine, TurnOutcome};
use betwise::logging::{init_tracing, setup_panic_hook};
use betwise::main_helper::{api_key_from_env, parse_command, Args, Command, HELP_TEXT};
use betwise::render::{plain_prose, render_attachments, render_view, role_label, BetCardState};
use betwise::types::{MessageId, Role};
use betwise::view::MessageView;
use clap::Parser;
use colored::*;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Echoes an assistant reply as it streams. Only appended prose is written;
/// once the text stops growing by suffix (a payload completes and is removed)
/// the remainder waits for the final render.
#[derive(Default)]
struct LivePrinter {
    message: Option<MessageId>,
    printed: String,
}

impl LivePrinter {
    fn update(&mut self, view: &MessageView) {
        if view.role != Role::Assistant {
            return;
        }
        if self.message != Some(view.message_id) {
            if self.message.is_some() {
                println!();
            }
            self.message = Some(view.message_id);
            self.printed.clear();
            println!("\n{}", role_label(view.role));
        }
        if view.payload_pending {
            return;
        }
        let prose = plain_prose(&view.segments);
        if let Some(rest) = prose.strip_prefix(self.printed.as_str()) {
            if !rest.is_empty() {
                print!("{}", rest);
                let _ = std::io::stdout().flush();
            }
            self.printed = prose;
        }
    }

    fn finish(&self) {
        if self.message.is_some() {
            println!();
        }
    }
}

fn prompt() {
    print!("\n{} ", ">".bold());
    let _ = std::io::stdout().flush();
}

fn redraw(engine: &mut AssistantEngine<ModelClient>, last_reply: Option<MessageId>, cards: &BetCardState) {
    match last_reply.and_then(|id| engine.view(id)) {
        Some(view) => println!("\n{}", render_view(&view, cards)),
        None => println!("{}", "No reply to show yet.".dimmed()),
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let _guard = match init_tracing(&args.log_dir, args.log_json) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Failed to set up logging in {}: {}", args.log_dir.display(), e);
            std::process::exit(1);
        }
    };
    setup_panic_hook();

    let api_key = match api_key_from_env() {
        Ok(k) => k,
        Err(e) => {
            eprintln!("Error: {}", e.inner);
            eprintln!("Please set it in your .env file or environment.");
            std::process::exit(1);
        }
    };

    let client = match ModelClient::new(args.client_config(api_key)) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to build HTTP client: {}", e);
            eprintln!("Failed to build HTTP client: {}", e.inner);
            std::process::exit(1);
        }
    };
    tracing::info!(
        "betwise starting: model={} base_url={} stream={} web_search={}",
        args.model,
        args.base_url,
        !args.no_stream,
        args.web_search
    );

    let mut engine = AssistantEngine::new(client);
    let mut cards = BetCardState::default();
    let mut last_reply: Option<MessageId> = None;

    println!("{}", "Betwise sports betting advisor".bold());
    println!("{}", HELP_TEXT.dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Failed to read stdin: {}", e);
                break;
            }
        };
        let command = match parse_command(&line) {
            Some(c) => c,
            None => continue,
        };

        match command {
            Command::Quit => break,
            Command::Help => println!("{}", HELP_TEXT),
            Command::Reset => {
                engine.reset();
                cards = BetCardState::default();
                last_reply = None;
                println!("{}", "Conversation cleared.".dimmed());
            }
            Command::ToggleBet(n) => {
                cards.toggle_bet(n - 1);
                redraw(&mut engine, last_reply, &cards);
            }
            Command::ToggleSources => {
                cards.toggle_sources();
                redraw(&mut engine, last_reply, &cards);
            }
            Command::Message(text) => {
                let mut printer = LivePrinter::default();
                let outcome = engine.submit(&text, |view| printer.update(view)).await;
                printer.finish();
                let reply = match outcome {
                    Ok(TurnOutcome::Completed(id)) => id,
                    Ok(TurnOutcome::Failed { apology, error }) => {
                        tracing::warn!("Turn ended with fallback reply: {}", error);
                        apology
                    }
                    Err(e) => {
                        println!("{}", e.inner.to_string().red());
                        continue;
                    }
                };
                cards = BetCardState::default();
                last_reply = Some(reply);
                if let Some(view) = engine.view(reply) {
                    let attachments = render_attachments(&view, &cards);
                    if !attachments.is_empty() {
                        println!("\n{}", attachments);
                    }
                }
            }
        }
    }

    tracing::info!("betwise exiting");
}
