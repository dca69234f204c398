//! CLI surface (§6): `index`, `search`, `watch`, `status`, `serve`.
//!
//! Library crates in this workspace only ever call `tracing::*` — this
//! binary is the one place that installs a subscriber, driven by
//! `LOG_LEVEL` (§6 config variables), mirroring the teacher's own
//! layering where only the bin crate pulls in `tracing-subscriber`.

mod actions;
mod http;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use localdoc_core::{Error as CoreError, MediaType};
use localdoc_engine::{Config, CoreContext};
use localdoc_index::search::SearchFilters;

/// Local multimodal index and hybrid retrieval engine.
#[derive(Parser, Debug)]
#[command(name = "local-doc-search", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index a file or directory.
    Index {
        /// File or directory to index.
        path: PathBuf,
        /// Recurse into subdirectories.
        #[arg(long)]
        recursive: bool,
    },
    /// Run a hybrid search against the index.
    Search {
        /// Natural-language query.
        query: String,
        /// Maximum number of results.
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Restrict to one media type (document, image, audio, video).
        #[arg(long = "type")]
        media_type: Option<String>,
        /// Emit results as JSON instead of a formatted table.
        #[arg(long)]
        json: bool,
    },
    /// Watch one or more paths for live changes and keep indexing them.
    Watch {
        /// Paths to watch, recursively.
        paths: Vec<PathBuf>,
    },
    /// Print indexing progress counters.
    Status,
    /// Serve the localhost-only HTTP API.
    Serve {
        /// Bind host.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Bind port.
        #[arg(long, default_value_t = 8420)]
        port: u16,
    },
}

fn main() -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("error: failed to start async runtime: {err}");
            return ExitCode::from(1);
        }
    };
    runtime.block_on(run())
}

async fn run() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: ConfigInvalid: {err}");
            return ExitCode::from(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let context = match CoreContext::build(config) {
        Ok(context) => Arc::new(context),
        Err(err) => return report_and_exit(&err),
    };

    let result = match cli.command {
        Command::Index { path, recursive } => run_index(&context, &path, recursive).await,
        Command::Search { query, limit, media_type, json } => {
            run_search(&context, &query, limit, media_type.as_deref(), json).await
        }
        Command::Watch { paths } => run_watch(&context, &paths).await,
        Command::Status => run_status(&context),
        Command::Serve { host, port } => run_serve(context, &host, port).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report_and_exit(&err),
    }
}

/// Maps a core error to the CLI's exit code contract (§6) and prints a
/// one-line summary plus the error kind.
fn report_and_exit(err: &CoreError) -> ExitCode {
    eprintln!("error: {}: {err}", err.kind());
    let code = match err {
        CoreError::ConfigInvalid(_) => 2,
        CoreError::ModelUnavailable(_) | CoreError::ModelTimeout(_) | CoreError::ModelShapeMismatch { .. } => 3,
        CoreError::StoreCorruption(_) => 4,
        _ => 1,
    };
    ExitCode::from(code)
}

async fn run_index(context: &CoreContext, path: &PathBuf, recursive: bool) -> Result<(), CoreError> {
    let handles = context.start_workers();
    let files = context.index_directory(path, recursive).await?;
    wait_for_drain(context, files.len()).await;
    context.shutdown();
    for handle in handles {
        let _ = handle.await;
    }

    let stats = context.stats();
    println!("indexed {} file(s) in {:.2}s", files.len(), stats.elapsed_seconds);
    println!(
        "  text={} pdf={} (vlm_pages={}) image={} audio={} video={} skipped={}",
        stats.text_count,
        stats.pdf_count,
        stats.vlm_pages_processed,
        stats.image_count,
        stats.audio_count,
        stats.video_count,
        stats.skipped_count
    );
    Ok(())
}

/// Polls the scheduler's counters until every submitted file has been
/// accounted for or a generous timeout elapses, so `index` can report a
/// final tally before exiting instead of a cold snapshot from before
/// the workers finished draining the queue.
async fn wait_for_drain(context: &CoreContext, total: usize) {
    if total == 0 {
        return;
    }
    let deadline = Instant::now() + Duration::from_secs((total as u64 * 5).max(60));
    loop {
        let stats = context.stats();
        let processed = stats.text_count
            + stats.pdf_count
            + stats.image_count
            + stats.audio_count
            + stats.video_count
            + stats.skipped_count;
        if processed as usize >= total || Instant::now() >= deadline {
            return;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

async fn run_search(
    context: &CoreContext,
    query: &str,
    limit: usize,
    media_type: Option<&str>,
    json: bool,
) -> Result<(), CoreError> {
    let mut filters = SearchFilters::default();
    if let Some(raw) = media_type {
        filters.media_type.push(parse_media_type(raw)?);
    }

    let results = context.search(query, limit, filters).await?;

    if json {
        let dto: Vec<http::SearchHit> = results.iter().map(|r| http::to_search_hit(context, r)).collect();
        println!("{}", serde_json::to_string_pretty(&dto).unwrap_or_default());
        return Ok(());
    }

    if results.is_empty() {
        println!("no results");
        return Ok(());
    }
    for (i, result) in results.iter().enumerate() {
        let locator = match (result.chunk.page, result.chunk.start_time) {
            (Some(page), _) => format!(" p.{page}"),
            (None, Some(start)) => format!(" @{start:.1}s"),
            (None, None) => String::new(),
        };
        println!(
            "{}. [{:.4}]{} {}",
            i + 1,
            result.score,
            locator,
            truncate(&result.chunk.text, 160)
        );
    }
    Ok(())
}

fn parse_media_type(raw: &str) -> Result<MediaType, CoreError> {
    match raw.to_ascii_lowercase().as_str() {
        "document" | "doc" => Ok(MediaType::Document),
        "image" => Ok(MediaType::Image),
        "audio" => Ok(MediaType::Audio),
        "video" => Ok(MediaType::Video),
        other => Err(CoreError::ConfigInvalid(format!("unknown media type {other:?}"))),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let normalized: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.chars().count() <= max_chars {
        normalized
    } else {
        let short: String = normalized.chars().take(max_chars).collect();
        format!("{short}…")
    }
}

async fn run_watch(context: &CoreContext, paths: &[PathBuf]) -> Result<(), CoreError> {
    let handles = context.start_workers();
    for path in paths {
        context.watch(path.clone(), true)?;
        println!("watching {}", path.display());
    }
    tokio::signal::ctrl_c().await.ok();
    context.shutdown();
    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}

fn run_status(context: &CoreContext) -> Result<(), CoreError> {
    let stats = context.stats();
    let doc_stats = context.document_stats()?;
    println!("documents: {}", doc_stats.total_documents);
    for (media_type, count) in &doc_stats.by_media_type {
        println!("  {media_type}: {count}");
    }
    println!("chunks: {}", doc_stats.total_chunks);
    println!(
        "processed this run: text={} pdf={} image={} audio={} video={} skipped={} elapsed={:.1}s",
        stats.text_count,
        stats.pdf_count,
        stats.image_count,
        stats.audio_count,
        stats.video_count,
        stats.skipped_count,
        stats.elapsed_seconds
    );
    Ok(())
}

async fn run_serve(context: Arc<CoreContext>, host: &str, port: u16) -> Result<(), CoreError> {
    let handles = context.start_workers();
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|err| CoreError::io(PathBuf::from(&addr), err))?;
    tracing::info!(%addr, "serving HTTP API");

    let app = http::router(Arc::clone(&context));
    let shutdown = shutdown_signal();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|err| CoreError::ModelUnavailable(err.to_string()))?;

    context.shutdown();
    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
