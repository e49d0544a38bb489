//! cratematch - match a local record catalog against Spotify
//!
//! Drives the two-phase import flow: submit record IDs, follow the progress
//! stream, let the user resolve ambiguous matches at the terminal, then apply
//! the selections.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use cratematch_cli::client::{MatchStreamClient, RecordsClient};
use cratematch_cli::config::{self, Config};
use cratematch_core::model::{JobPayload, MatchCandidate, MatchedTrack};
use cratematch_core::pipeline::{CatalogRefresh, ImportPipeline, JobState};
use cratematch_core::PipelineEvent;
use std::io::{BufRead, Write};
use tokio::sync::broadcast;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Event channel capacity for the progress renderer
const EVENT_CAPACITY: usize = 256;

#[derive(Parser)]
#[command(name = "cratematch", version, about = "Match a record catalog against Spotify")]
struct Cli {
    /// Matching server base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Bearer token for the matching server
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Match the given records and apply the results
    Import {
        /// Record identifiers to match
        #[arg(required = true)]
        record_ids: Vec<String>,
    },
    /// Fetch and save audio features for a manually matched track
    TrackFeatures {
        record_id: String,
        track_id: String,
        spotify_track_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let config = config::resolve(cli.api_url.as_deref(), cli.token.as_deref())?;

    match cli.command {
        Command::Import { record_ids } => run_import(&config, record_ids).await,
        Command::TrackFeatures {
            record_id,
            track_id,
            spotify_track_id,
        } => {
            let records = RecordsClient::new(&config)?;
            let track = MatchedTrack {
                record_id,
                track_id,
                spotify_track_id,
            };
            records
                .request_track_features(&track, &config.auth_token)
                .await?;
            println!("Audio features saved.");
            Ok(())
        }
    }
}

/// Run the full import flow, looping through disambiguation rounds until the
/// job completes or fails.
async fn run_import(config: &Config, record_ids: Vec<String>) -> Result<()> {
    let refresher = RecordsClient::new(config)?;
    let client = MatchStreamClient::new(config)?;
    let mut pipeline = ImportPipeline::new(refresher, config.auth_token.clone(), EVENT_CAPACITY);

    let renderer = tokio::spawn(render_events(pipeline.subscribe()));

    let result = drive(&client, &mut pipeline, record_ids, &config.auth_token).await;
    renderer.abort();
    result
}

async fn drive<C: CatalogRefresh>(
    client: &MatchStreamClient,
    pipeline: &mut ImportPipeline<C>,
    record_ids: Vec<String>,
    token: &str,
) -> Result<()> {
    client
        .run_job(pipeline, JobPayload::Records(record_ids), token)
        .await?;

    loop {
        match pipeline.state() {
            JobState::Complete => {
                println!("Import complete.");
                return Ok(());
            }
            JobState::Error => {
                let message = pipeline
                    .job()
                    .and_then(|j| j.last_error.clone())
                    .unwrap_or_else(|| "Unexpected error".to_string());
                bail!("import failed: {message}");
            }
            JobState::AwaitingResolution => {
                resolve_matches(pipeline)?;
                let payload = JobPayload::Selections(pipeline.selection());
                client.run_job(pipeline, payload, token).await?;
            }
            other => bail!("stream ended in unexpected state: {other:?}"),
        }
    }
}

/// Render pipeline events as terminal progress output.
async fn render_events(mut rx: broadcast::Receiver<PipelineEvent>) {
    loop {
        match rx.recv().await {
            Ok(PipelineEvent::ProgressUpdated { fraction, .. }) => {
                print!("\rMatching... {:>3.0}%", fraction * 100.0);
                let _ = std::io::stdout().flush();
            }
            Ok(PipelineEvent::AwaitingResolution {
                album_groups,
                track_groups,
                ..
            }) => {
                println!(
                    "\n{album_groups} album group(s) and {track_groups} track group(s) need review."
                );
            }
            Ok(PipelineEvent::JobCompleted { .. }) => println!(),
            Ok(PipelineEvent::JobFailed { .. }) => println!(),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Walk every ambiguous group and prompt for a selection. A blank answer
/// leaves the group unmatched.
fn resolve_matches<C: CatalogRefresh>(pipeline: &mut ImportPipeline<C>) -> Result<()> {
    let stdin = std::io::stdin();

    let album_groups: Vec<(String, Vec<(String, String)>)> = pipeline
        .matches()
        .albums()
        .iter()
        .map(|group| {
            (
                group.record_id.clone(),
                group
                    .matches
                    .iter()
                    .map(|c| (c.id.clone(), display_label(c)))
                    .collect(),
            )
        })
        .collect();

    for (record_id, options) in album_groups {
        println!("\nRecord {record_id} matched {} album(s):", options.len());
        for (i, (_, label)) in options.iter().enumerate() {
            println!("  {}. {}", i + 1, label);
        }
        if let Some(choice) = prompt_choice(&stdin, options.len())? {
            pipeline.toggle_album_option(&record_id, &options[choice].0);
        }
    }

    let track_groups: Vec<(String, String, Vec<(String, String)>)> = pipeline
        .matches()
        .tracks()
        .iter()
        .map(|group| {
            (
                group.record_id.clone(),
                group.track_id.clone(),
                group
                    .options
                    .iter()
                    .map(|c| (c.id.clone(), display_label(c)))
                    .collect(),
            )
        })
        .collect();

    for (record_id, track_id, options) in track_groups {
        println!(
            "\nTrack {track_id} (record {record_id}) matched {} option(s):",
            options.len()
        );
        for (i, (_, label)) in options.iter().enumerate() {
            println!("  {}. {}", i + 1, label);
        }
        if let Some(choice) = prompt_choice(&stdin, options.len())? {
            pipeline.toggle_track_option(&track_id, &options[choice].0);
        }
    }

    Ok(())
}

/// Prompt for a 1-based option index; blank input (or EOF) skips the group.
fn prompt_choice(stdin: &std::io::Stdin, len: usize) -> Result<Option<usize>> {
    loop {
        print!("Select option [1-{len}, blank to skip]: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        match trimmed.parse::<usize>() {
            Ok(n) if (1..=len).contains(&n) => return Ok(Some(n - 1)),
            _ => println!("Enter a number between 1 and {len}, or leave blank to skip."),
        }
    }
}

/// Human-readable candidate label from the server-provided display fields.
fn display_label(candidate: &MatchCandidate) -> String {
    let name = candidate.display.get("name").and_then(|v| v.as_str());
    let artist = candidate.display.get("artist").and_then(|v| v.as_str());
    match (name, artist) {
        (Some(name), Some(artist)) => format!("{name} - {artist} [{}]", candidate.id),
        (Some(name), None) => format!("{name} [{}]", candidate.id),
        _ => candidate.id.clone(),
    }
}
