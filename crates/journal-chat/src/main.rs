//! Interactive journal chat.
//!
//! Loads notes from a JSON file, indexes them with the configured embedding
//! backend, and answers questions read line by line from stdin.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use journal_chat::{
    ChatConfig, ChatMode, ChatRequest, ChatService, FullContextChatService, RagChatService,
};
use journal_core::{ChatMessage, ChatResponse, NoteRepository};
use journal_index::{sync_index, MemoryIndex, MemoryNoteStore};
use journal_inference::InferenceConfig;

#[derive(Parser, Debug)]
#[command(name = "journal-chat", version, about = "Ask questions about your journal entries")]
struct Cli {
    /// JSON file holding an array of notes ({title, content, created_at?})
    #[arg(long, env = "JOURNAL_NOTES_FILE")]
    notes: Option<PathBuf>,

    /// Chat mode: rag or full
    #[arg(long)]
    mode: Option<ChatMode>,

    /// Entries retrieved per question (1-20)
    #[arg(long)]
    max_results: Option<usize>,

    /// Inference TOML config; environment variables are used when omitted
    #[arg(long, env = "JOURNAL_INFERENCE_CONFIG")]
    config: Option<PathBuf>,
}

/// Initialize tracing with configurable output.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors
///   RUST_LOG    - standard env filter (default: "journal_chat=info")
///
/// Console logs go to stderr so answers on stdout stay clean.
fn init_tracing() -> Option<WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "journal_chat=info,journal_index=info,journal_inference=warn".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = if let Some(ref path) = log_file {
        let path = std::path::Path::new(path);
        let file_dir = path.parent().unwrap_or(std::path::Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("journal-chat.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stderr)"),
        "Logging initialized"
    );
    guard
}

fn print_response(response: &ChatResponse) {
    println!("\n{}\n", response.response);
    if !response.retrieved_contexts.is_empty() {
        println!("Sources:");
        for context in &response.retrieved_contexts {
            println!(
                "  [{:.2}] {} ({})",
                context.similarity_score, context.title, context.created_at
            );
        }
        println!();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let log_guard = init_tracing();
    let cli = Cli::parse();

    let mut chat_config = ChatConfig::from_env();
    if let Some(mode) = cli.mode {
        chat_config = chat_config.with_mode(mode);
    }
    if let Some(max_results) = cli.max_results {
        chat_config = chat_config.with_max_results(max_results);
    }
    ChatRequest::new("startup check")
        .with_max_results(chat_config.max_results)
        .validate()?;

    let inference = InferenceConfig::load(cli.config.as_deref())
        .context("Failed to load inference configuration")?;
    let backends = inference.build_backends()?;
    match backends.health.health_check().await {
        Ok(true) => info!(model = backends.chat.model_name(), "Inference backend reachable"),
        Ok(false) => warn!("Inference backend is not reachable; answers will use fallbacks"),
        Err(e) => warn!(error = %e, "Inference health check failed"),
    }

    let store = Arc::new(match &cli.notes {
        Some(path) => MemoryNoteStore::from_json_file(path)
            .with_context(|| format!("Failed to load notes from {}", path.display()))?,
        None => {
            warn!("No notes file given, starting with an empty journal");
            MemoryNoteStore::default()
        }
    });
    let note_count = store.list_by_recency().await?.len();

    let service: Arc<dyn ChatService> = match chat_config.mode {
        ChatMode::Rag => {
            let index = Arc::new(MemoryIndex::new(backends.embedding.clone()));
            match sync_index(store.as_ref(), index.as_ref()).await {
                Ok(report) => info!(synced = report.synced, "Indexed notes"),
                Err(e) => warn!(error = %e, "Indexing failed, retrieval will find nothing"),
            }
            Arc::new(RagChatService::new(
                index,
                backends.chat.clone(),
                chat_config.clone(),
            ))
        }
        ChatMode::FullContext => Arc::new(FullContextChatService::new(
            store.clone(),
            backends.chat.clone(),
        )),
    };

    info!(mode = %chat_config.mode, note_count, "Journal chat ready");
    println!(
        "Journal chat ({} mode, {} entries). Type a question, or 'exit' to quit.",
        chat_config.mode, note_count
    );

    let mut history: Vec<ChatMessage> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut interrupted = false;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        // Ctrl-C at the prompt exits; during a turn it cancels that turn.
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                interrupted = true;
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if matches!(message, "exit" | "quit") {
            break;
        }

        let request = ChatRequest::new(message)
            .with_history(history.clone())
            .with_max_results(chat_config.max_results);
        if let Err(e) = request.validate() {
            eprintln!("{}", e);
            continue;
        }

        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };
        let response = service.process_request_with_cancel(&request, &cancel).await;
        watcher.abort();

        print_response(&response);

        if let (Ok(user), Ok(assistant)) = (
            ChatMessage::user(&request.message),
            ChatMessage::assistant(&response.response),
        ) {
            history.push(user);
            history.push(assistant);
        }
    }

    info!(turns = history.len() / 2, "Journal chat finished");
    if interrupted {
        // The pending stdin read would otherwise keep the runtime alive.
        drop(log_guard);
        std::process::exit(0);
    }
    Ok(())
}
