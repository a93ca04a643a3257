//! Kataribe CLI - web fiction audiobook maker.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kataribe::assemble;
use kataribe::config::Config;
use kataribe::console::Console;
use kataribe::fetch::PageFetcher;
use kataribe::job::{ChapterDisposition, JobController, JobRequest, JobStatus};
use kataribe::ops;
use kataribe::scrape::{ChapterQuery, SiteSource};
use kataribe::tts::{HttpSynthesizer, VoiceParams};
use std::sync::Arc;
use std::time::Duration;

/// Web fiction audiobook maker.
#[derive(Parser, Debug)]
#[command(name = "kataribe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover chapters, narrate them, and merge the audio into batches.
    Run {
        /// Page to discover chapter links from.
        start_url: String,

        /// Base URL for resolving relative links.
        #[arg(long)]
        base_url: Option<String>,

        /// First chapter to include (1-based).
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        start: u32,

        /// Last chapter to include, inclusive.
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        end: Option<u32>,

        /// Number of chapters from the start (alternative to --end).
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        count: Option<u32>,

        /// Chapters per audio batch.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Voice identifier for the TTS backend.
        #[arg(long)]
        voice: Option<String>,

        /// Speaking rate adjustment in percent.
        #[arg(long)]
        rate: Option<i32>,

        /// Pitch adjustment in percent.
        #[arg(long)]
        pitch: Option<i32>,

        /// Volume adjustment in percent.
        #[arg(long)]
        volume: Option<i32>,
    },

    /// List the chapter URLs discovered from a page.
    Chapters {
        start_url: String,

        #[arg(long)]
        base_url: Option<String>,

        /// Print the chapter references as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Extract a single chapter and print its text.
    Extract { url: String },

    /// List produced audio artifacts.
    Artifacts,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let console = Console::new();

    let config = Config::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    match cli.command {
        Command::Run {
            start_url,
            base_url,
            start,
            end,
            count,
            batch_size,
            voice,
            rate,
            pitch,
            volume,
        } => {
            let query = ChapterQuery {
                start_url,
                base_url,
                start_chapter: start,
                end_chapter: end,
                num_chapters: count,
            };
            let mut voice_params = VoiceParams::from_config(&config.tts);
            if let Some(voice) = voice {
                voice_params.voice = voice;
            }
            if let Some(rate) = rate {
                voice_params.rate = rate;
            }
            if let Some(pitch) = pitch {
                voice_params.pitch = pitch;
            }
            if let Some(volume) = volume {
                voice_params.volume = volume;
            }
            let request = JobRequest {
                query,
                batch_size: batch_size.unwrap_or(config.job.batch_size),
                voice: voice_params,
            };
            run_job(&config, request, &console).await
        }
        Command::Chapters {
            start_url,
            base_url,
            json,
        } => {
            let fetcher =
                PageFetcher::new(config.scraping.clone()).context("Failed to create fetcher")?;
            console.step("Resolving chapter URLs...");
            let discovery =
                ops::resolve_chapter_urls(&fetcher, &start_url, base_url.as_deref()).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&discovery.chapters)?);
                return Ok(());
            }

            if let Some(title) = &discovery.novel_title {
                console.success(&format!("Found: {}", title));
            }
            console.info(&format!(
                "{} chapter links",
                console.count(discovery.chapters.len())
            ));
            for chapter in &discovery.chapters {
                println!("{}", chapter.url);
            }
            Ok(())
        }
        Command::Extract { url } => {
            let fetcher =
                PageFetcher::new(config.scraping.clone()).context("Failed to create fetcher")?;
            console.step("Extracting chapter...");
            let chapter = ops::extract_single(&fetcher, &url).await?;

            console.success(&format!(
                "{} ({} characters)",
                chapter.title,
                chapter.body.chars().count()
            ));
            println!("{}", chapter.body);
            Ok(())
        }
        Command::Artifacts => {
            let artifacts = ops::list_artifacts(&config.paths.audio_output_directory)?;
            if artifacts.is_empty() {
                console.info("No audio artifacts produced yet");
                return Ok(());
            }
            for artifact in artifacts {
                println!(
                    "{:>12}  {}",
                    format!("{:.2} MB", artifact.size_bytes as f64 / (1024.0 * 1024.0)),
                    artifact.filename
                );
            }
            Ok(())
        }
    }
}

/// Runs an all-in-one job to completion, printing live progress.
async fn run_job(config: &Config, request: JobRequest, console: &Console) -> Result<()> {
    console.section("Kataribe - Web Fiction Audiobook Maker");

    let fetcher =
        PageFetcher::new(config.scraping.clone()).context("Failed to create fetcher")?;
    let synthesizer =
        HttpSynthesizer::new(&config.tts).context("Failed to create TTS client")?;

    let ffmpeg = assemble::find_ffmpeg(config.paths.ffmpeg_command.as_deref());
    if ffmpeg.is_none() {
        console.warning(
            "ffmpeg not found; batches will be raw-concatenated (playable for MP3, but not a valid container)",
        );
    }

    let controller = JobController::new(
        Arc::new(SiteSource::new(fetcher)),
        Arc::new(synthesizer),
        config.paths.audio_output_directory.clone(),
        ffmpeg,
    );

    console.step("Starting batch job...");
    controller.start(request)?;

    loop {
        let snapshot = controller.status();
        match snapshot.status {
            JobStatus::Processing | JobStatus::Paused => {
                let label = snapshot
                    .current_chapter
                    .as_ref()
                    .map(|c| c.label())
                    .unwrap_or_else(|| "resolving chapters".to_string());
                console.progress_update(&format!(
                    "{} {}",
                    console.job_progress(
                        snapshot.current,
                        snapshot.total,
                        snapshot.completed_batches,
                        snapshot.total_batches
                    ),
                    label
                ));
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
            _ => break,
        }
    }
    controller.wait().await;
    console.clear_line();

    let snapshot = controller.status();
    match snapshot.status {
        JobStatus::Completed => {
            let records = controller.chapters();
            let synthesized = records
                .iter()
                .filter(|r| r.disposition == ChapterDisposition::Synthesized)
                .count();
            let skipped = records.len() - synthesized;

            console.success(&format!(
                "Processed {} chapters ({} narrated, {} skipped)",
                records.len(),
                synthesized,
                skipped
            ));
            for batch in controller.batches() {
                if batch.assembled {
                    console.info(&format!(
                        "Batch {} (chapters {}-{}): {}",
                        batch.index,
                        batch.first_chapter,
                        batch.last_chapter,
                        batch.path.display()
                    ));
                } else {
                    console.warning(&format!(
                        "Batch {} failed to assemble; per-chapter files were kept",
                        batch.index
                    ));
                }
            }
            console.section("Done!");
            Ok(())
        }
        JobStatus::Error => {
            let message = snapshot.error.unwrap_or_else(|| "unknown error".to_string());
            console.error(&message);
            anyhow::bail!("Job failed: {}", message)
        }
        _ => {
            console.warning("Job was stopped before completion");
            Ok(())
        }
    }
}
