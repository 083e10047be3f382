//! Interactive chat application for asking questions about business data.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a backend on the default origin (http://localhost:8001)
//! askdata-chat
//!
//! # Point at another backend and skip chart generation
//! askdata-chat --backend-url http://analytics:8080 --no-chart
//!
//! # Disable colors (useful for piping output)
//! askdata-chat --no-color
//! ```
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `warn`).
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/new` - Start a new session
//! - `/examples [n]` - List or ask an example question
//! - `/tools` - List backend capabilities
//! - `/quit` - Exit the application

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use askdata::chat::{
    ChatArgs, ChatCommand, ChatConfig, EXAMPLE_QUESTIONS, PendingQuery, PlainTextRenderer,
    Renderer, SessionController, help_text, parse_command,
};
use askdata::{AnalyticsClient, ChartResolver, RedrawFlag, TranscriptView};

type Session = SessionController<AnalyticsClient>;

/// How often a pending query checks for Ctrl+C.
const INTERRUPT_POLL: Duration = Duration::from_millis(100);

/// Main entry point for the askdata-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let default_level = "warn";
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let (args, _) = ChatArgs::from_command_line_relaxed("askdata-chat [OPTIONS]");
    let config = ChatConfig::from(args);

    let client = AnalyticsClient::with_options(Some(config.backend_url.clone()), config.timeout)?;
    let charts = ChartResolver::new(&config.backend_url)?;
    let mut renderer = PlainTextRenderer::with_color(config.use_color).with_charts(charts);
    let mut session = SessionController::new(Arc::new(client), config);

    let redraw = RedrawFlag::new();
    session.subscribe(Box::new(redraw.clone()));
    let mut view = TranscriptView::new().with_user_echo(false);

    let mut rl = DefaultEditor::new()?;

    // Set while a query is outstanding and the user presses Ctrl+C.
    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    println!("Ask Data (backend: {})", session.service().base_url());
    println!("Type /help for commands, /examples for ideas, /quit to exit\n");

    loop {
        interrupted.store(false, Ordering::Relaxed);

        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                let question = match parse_command(line) {
                    Some(ChatCommand::Quit) => {
                        println!("Goodbye!");
                        break;
                    }
                    Some(ChatCommand::Examples(Some(n))) => {
                        let question = EXAMPLE_QUESTIONS[n - 1];
                        println!("You: {question}");
                        question.to_string()
                    }
                    Some(cmd) => {
                        run_command(cmd, &mut session, &mut renderer).await;
                        if redraw.take() {
                            view.redraw(session.transcript().messages(), &mut renderer);
                        }
                        continue;
                    }
                    None => line.to_string(),
                };

                if let Some(pending) = session.send(&question) {
                    if redraw.take() {
                        view.redraw(session.transcript().messages(), &mut renderer);
                    }
                    wait_for_answer(&mut session, pending, &interrupted, &mut renderer).await;
                    autosave(&session, &mut renderer);
                }
                if redraw.take() {
                    view.redraw(session.transcript().messages(), &mut renderer);
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}

/// Waits for `pending` while watching for Ctrl+C.
///
/// An interrupt starts a new session and drops the request.
async fn wait_for_answer(
    session: &mut Session,
    pending: PendingQuery,
    interrupted: &AtomicBool,
    renderer: &mut dyn Renderer,
) {
    let answer = pending.resolve();
    tokio::pin!(answer);
    let mut poll = tokio::time::interval(INTERRUPT_POLL);
    loop {
        tokio::select! {
            settled = &mut answer => {
                session.settle(settled);
                return;
            }
            _ = poll.tick() => {
                if interrupted.swap(false, Ordering::Relaxed) {
                    session.new_session();
                    renderer.print_info("\nQuery abandoned. Started a new session.");
                    return;
                }
            }
        }
    }
}

fn autosave(session: &Session, renderer: &mut dyn Renderer) {
    let Some(path) = session.config().transcript_path.as_ref() else {
        return;
    };
    if let Err(err) = session.transcript().save_to(path) {
        renderer.print_error(&format!("Failed to save transcript: {}", err));
    }
}

async fn run_command(cmd: ChatCommand, session: &mut Session, renderer: &mut dyn Renderer) {
    match cmd {
        ChatCommand::New => {
            session.new_session();
            renderer.print_info("Started a new session.");
        }
        ChatCommand::Tools => match session.service().list_capabilities().await {
            Ok(list) => {
                println!("    Backend capabilities ({}):", list.total_count);
                for tool in list.tools {
                    println!("      {} - {}", tool.name, tool.description);
                }
            }
            Err(err) => renderer.print_error(&format!("Failed to list capabilities: {}", err)),
        },
        ChatCommand::Examples(_) => {
            println!("    Example questions:");
            for (i, question) in EXAMPLE_QUESTIONS.iter().enumerate() {
                println!("      {}. {}", i + 1, question);
            }
            println!("    Ask one with /examples <n>");
        }
        ChatCommand::Health => match session.service().health().await {
            Ok(body) => {
                let status = body
                    .get("status")
                    .and_then(|s| s.as_str())
                    .unwrap_or("reachable");
                renderer.print_info(&format!("Backend is {status}."));
            }
            Err(err) => renderer.print_error(&format!("Backend health check failed: {}", err)),
        },
        ChatCommand::Chart(on) => {
            session.set_generate_chart(on);
            if on {
                renderer.print_info("Charts will be requested.");
            } else {
                renderer.print_info("Charts will not be requested.");
            }
        }
        ChatCommand::ChartType(chart_type) => {
            renderer.print_info(&format!("Chart type set to {chart_type}"));
            session.set_chart_type(chart_type);
        }
        ChatCommand::SaveTranscript(path) => match session.transcript().save_to(&path) {
            Ok(()) => renderer.print_info(&format!("Transcript saved to {}", path)),
            Err(err) => renderer.print_error(&format!("Failed to save transcript: {}", err)),
        },
        ChatCommand::Stats => print_stats(session),
        ChatCommand::ShowConfig => print_config(session),
        ChatCommand::Help => {
            for line in help_text().lines() {
                println!("    {}", line);
            }
        }
        ChatCommand::Invalid(message) => renderer.print_error(&message),
        // Handled by the caller.
        ChatCommand::Quit => {}
    }
}

fn print_stats(session: &Session) {
    let stats = session.stats();
    println!("    Session Statistics:");
    println!("      Messages: {}", stats.message_count);
    println!("      Queries sent: {}", stats.queries_sent);
    println!("      Failed answers: {}", stats.failures);
    println!("      Ignored sends: {}", stats.ignored_sends);
    println!("      Discarded late answers: {}", stats.discarded);
    println!("      New sessions: {}", stats.resets);
}

fn print_config(session: &Session) {
    let config = session.config();
    println!("    Current Configuration:");
    println!("      Backend: {}", session.service().base_url());
    println!(
        "      Charts: {}",
        if config.generate_chart {
            "requested"
        } else {
            "off"
        }
    );
    println!("      Chart type: {}", config.chart_type);
    match config.timeout {
        Some(timeout) => println!("      Timeout: {}s", timeout.as_secs()),
        None => println!("      Timeout: (none)"),
    }
    match config.transcript_path {
        Some(ref path) => println!("      Transcript file: {}", path.display()),
        None => println!("      Transcript file: (disabled)"),
    }
}
