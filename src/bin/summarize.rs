use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use rustydigest::{
    config, logging,
    processing::{
        CancelHandle, Document, ProcessingPreset, Progress, StyleGuide, SummarizationResult,
        SummarizationService, SummarizeOptions,
    },
};

#[derive(Parser)]
#[command(
    name = "summarize",
    about = "Summarize documents with the local generation model"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Summarize a text file.
    Run {
        #[arg(long)]
        input: PathBuf,
        /// Defaults to the input file stem.
        #[arg(long)]
        title: Option<String>,
        /// ultra-fast, fast, balanced or quality.
        #[arg(long)]
        preset: Option<String>,
        /// Model used for context-window lookups.
        #[arg(long)]
        model: Option<String>,
        /// JSON file holding a style guide.
        #[arg(long)]
        style: Option<PathBuf>,
        /// Write the full result as JSON here instead of printing the styled summary.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Rewrite the styled summary of a saved result.
    Regenerate {
        /// Result JSON written by `run --output`.
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        style: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    config::init_config();
    logging::init_cli_tracing();
    let service = SummarizationService::from_config(config::get_config());

    match cli.command {
        Command::Run {
            input,
            title,
            preset,
            model,
            style,
            output,
        } => {
            let text = fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let title = title.unwrap_or_else(|| title_from_path(&input));
            let document = Document::new(title, text).with_source(input.display().to_string());
            let preset = preset.map(|value| parse_preset(&value)).transpose()?;

            let cancel = CancelHandle::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("Cancelling after the current step...");
                    on_interrupt.cancel();
                }
            });

            let mut options = SummarizeOptions::new(service.processing_config(preset))
                .with_style(load_style(style.as_deref())?)
                .with_progress(stderr_progress())
                .with_cancel(cancel);
            if let Some(model) = model {
                options = options.with_target_model(model);
            }

            let result = service
                .summarize(document, options)
                .await
                .context("Summarization failed")?;
            report_stats(&result);
            emit(&result, output.as_deref())
        }
        Command::Regenerate {
            input,
            style,
            output,
        } => {
            let raw = fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let result: SummarizationResult = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a summarization result", input.display()))?;
            let style = load_style(style.as_deref())?;
            let updated = service
                .regenerate(&result, &style)
                .await
                .context("Regeneration failed")?;
            emit(&updated, output.as_deref())
        }
    }
}

fn parse_preset(value: &str) -> Result<ProcessingPreset> {
    value.parse().map_err(|()| {
        anyhow!("Unknown preset '{value}' (expected ultra-fast, fast, balanced or quality)")
    })
}

fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Untitled document".to_string())
}

fn load_style(path: Option<&Path>) -> Result<StyleGuide> {
    let Some(path) = path else {
        return Ok(StyleGuide::default());
    };
    let raw =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid style guide in {}", path.display()))
}

fn stderr_progress() -> Progress {
    Progress::new(|current, total, status| match status {
        Some(status) => eprintln!("[{current:>3}/{total}] {status}"),
        None => eprintln!("[{current:>3}/{total}]"),
    })
}

fn report_stats(result: &SummarizationResult) {
    let stats = &result.processing_stats;
    eprintln!(
        "{} chunks ({} failed) in {} ms with {}{}",
        stats.total_chunks,
        stats.failed_chunks,
        stats.processing_time_ms,
        stats.model_used,
        if stats.fast_path { ", fast path" } else { "" }
    );
    if !stats.fallbacks.is_empty() {
        eprintln!("fallbacks: {}", stats.fallbacks.join(", "));
    }
}

fn emit(result: &SummarizationResult, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let json = serde_json::to_string_pretty(result)?;
            fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", result.styled_summary)?;
        }
    }
    Ok(())
}
