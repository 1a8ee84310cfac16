//! Command-line interface for decisions.
//!
//! Provides commands for processing a recording into a decision, analyzing
//! a recording without persisting it, extracting from a transcript, and
//! inspecting configuration.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::adapters::{
    AssemblyAiTranscriber, DecisionExtractor, OpenAiExtractor, SupabaseClient, SupabaseDecisions,
    SupabaseStorage,
};
use crate::config::{self, ResolvedConfig};
use crate::core::{JobManager, JobSweeper, VoiceProcessor};
use crate::domain::{ProcessingJob, ProcessingStatus};

/// decisions - Voice decision journal processing
#[derive(Parser, Debug)]
#[command(name = "decisions")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process a recording into a saved decision
    Process {
        /// Audio file to process
        file: PathBuf,

        /// Owning user ID
        #[arg(short, long, env = "DECISIONS_USER_ID")]
        user: String,

        /// Status polling interval in milliseconds
        #[arg(long, default_value = "500")]
        poll_ms: u64,
    },

    /// Upload, transcribe and extract without saving a decision
    Analyze {
        /// Audio file to analyze
        file: PathBuf,

        /// Owning user ID
        #[arg(short, long, env = "DECISIONS_USER_ID")]
        user: String,
    },

    /// Extract decision data from a transcript
    Extract {
        /// Transcript file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Process {
                file,
                user,
                poll_ms,
            } => process_file(&file, &user, Duration::from_millis(poll_ms)).await,
            Commands::Analyze { file, user } => analyze_file(&file, &user).await,
            Commands::Extract { input } => extract_transcript(input).await,
            Commands::Config => show_config(),
        }
    }
}

/// Build the processor and its collaborators from configuration
fn build_processor(cfg: &ResolvedConfig, jobs: JobManager) -> Result<VoiceProcessor> {
    let timeout = cfg.http.timeout();

    let (url, key) = cfg.supabase.credentials()?;
    let supabase = SupabaseClient::new(url, key, timeout)?;
    let storage = SupabaseStorage::new(supabase.clone(), cfg.supabase.bucket.clone());
    let decisions = SupabaseDecisions::new(supabase);

    Ok(VoiceProcessor::new(
        jobs,
        Arc::new(storage),
        Arc::new(build_transcriber(cfg)?),
        Arc::new(build_extractor(cfg)?),
        Arc::new(decisions),
    )
    .with_default_category(cfg.jobs.default_category.clone()))
}

fn build_transcriber(cfg: &ResolvedConfig) -> Result<AssemblyAiTranscriber> {
    let api_key = cfg
        .assemblyai
        .api_key
        .as_deref()
        .context("AssemblyAI key not configured (set ASSEMBLYAI_API_KEY)")?;

    Ok(AssemblyAiTranscriber::with_base_url(
        api_key,
        cfg.assemblyai.base_url.clone(),
        cfg.http.timeout(),
    )?
    .with_poll_interval(cfg.assemblyai.poll_interval()))
}

fn build_extractor(cfg: &ResolvedConfig) -> Result<OpenAiExtractor> {
    let api_key = cfg
        .openai
        .api_key
        .as_deref()
        .context("OpenAI key not configured (set OPENAI_API_KEY)")?;

    Ok(OpenAiExtractor::new(api_key, cfg.http.timeout())?
        .with_base_url(cfg.openai.base_url.clone())
        .with_model(cfg.openai.model.clone())
        .with_fallback_on_error(cfg.openai.fallback_on_error))
}

/// Read an audio file and derive the upload filename
fn read_audio(path: &Path) -> Result<(Vec<u8>, String)> {
    let audio = std::fs::read(path)
        .with_context(|| format!("Failed to read audio file: {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "recording.webm".to_string());

    if audio.is_empty() {
        anyhow::bail!("Audio file is empty: {}", path.display());
    }

    Ok((audio, filename))
}

/// Process a recording in the background and follow its status
async fn process_file(path: &Path, user_id: &str, poll_interval: Duration) -> Result<()> {
    let cfg = config::config()?;
    let (audio, filename) = read_audio(path)?;

    let processor = Arc::new(build_processor(cfg, JobManager::in_memory())?);
    let jobs = processor.jobs();
    let sweeper = JobSweeper::new(jobs.clone())
        .with_max_age(cfg.jobs.max_age())
        .with_interval(cfg.jobs.sweep_interval())
        .spawn();

    let job = jobs.create_job(user_id, None, None).await;
    println!("Job: {}", job.id);

    let handle = processor.start_background(job.id, user_id, audio, filename);
    let followed = follow_job(jobs, job.id, handle, poll_interval).await;
    sweeper.shutdown().await;
    let finished = followed?;

    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&finished.status_view())
            .context("Failed to serialize job status")?
    );

    match finished.status {
        ProcessingStatus::Completed => Ok(()),
        _ => anyhow::bail!(
            "Processing failed: {}",
            finished.error_message.unwrap_or_default()
        ),
    }
}

/// Poll a job and print each status change until it finishes.
///
/// Fails if the processing task ends, or panics, without the job reaching a
/// terminal state.
async fn follow_job(
    jobs: &JobManager,
    job_id: Uuid,
    mut handle: JoinHandle<()>,
    poll_interval: Duration,
) -> Result<ProcessingJob> {
    let mut task_done = false;
    let mut last: Option<(ProcessingStatus, f64)> = None;

    loop {
        let current = jobs
            .get_job(job_id)
            .await
            .with_context(|| format!("Job disappeared: {}", job_id))?;

        let state = (current.status, current.progress);
        if last != Some(state) {
            println!(
                "  {:<12} {:>3.0}%",
                current.status.as_str(),
                current.progress * 100.0
            );
            last = Some(state);
        }

        if current.is_terminal() {
            if !task_done {
                handle.await.context("Processing task panicked")?;
            }
            return Ok(current);
        }
        if task_done {
            anyhow::bail!("Processing stopped before job {} finished", job_id);
        }

        tokio::select! {
            joined = &mut handle => {
                task_done = true;
                joined.context("Processing task panicked")?;
            }
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }
}

/// Analyze a recording without creating a job or a decision
async fn analyze_file(path: &Path, user_id: &str) -> Result<()> {
    let cfg = config::config()?;
    let (audio, filename) = read_audio(path)?;

    let processor = build_processor(cfg, JobManager::in_memory())?;
    let analysis = processor.analyze_recording(user_id, &audio, &filename).await?;

    let output = serde_json::json!({
        "audioUrl": analysis.audio_url,
        "durationSeconds": analysis.duration_seconds,
        "transcript": analysis.transcript,
        "extraction": analysis.extraction,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

/// Extract decision data from a transcript file or stdin
async fn extract_transcript(input_file: Option<PathBuf>) -> Result<()> {
    let cfg = config::config()?;

    let transcript = if let Some(path) = input_file {
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        buffer
    };

    if transcript.trim().is_empty() {
        anyhow::bail!("Transcript is empty");
    }

    let extractor = build_extractor(cfg)?;
    let extraction = extractor.extract(transcript.trim()).await?;
    println!("{}", serde_json::to_string_pretty(&extraction)?);

    Ok(())
}

/// Mask a secret, keeping a short prefix for identification
fn mask(secret: Option<&str>) -> String {
    match secret {
        None => "(not set)".to_string(),
        Some(s) if s.chars().count() <= 8 => "****".to_string(),
        Some(s) => format!("{}****", s.chars().take(4).collect::<String>()),
    }
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("Decisions Configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Supabase:");
    println!("  URL:         {}", cfg.supabase.url.as_deref().unwrap_or("(not set)"));
    println!("  Service key: {}", mask(cfg.supabase.service_role_key.as_deref()));
    println!("  Bucket:      {}", cfg.supabase.bucket);
    println!();
    println!("AssemblyAI:");
    println!("  API key:       {}", mask(cfg.assemblyai.api_key.as_deref()));
    println!("  Base URL:      {}", cfg.assemblyai.base_url);
    println!("  Poll interval: {}ms", cfg.assemblyai.poll_interval_ms);
    println!();
    println!("OpenAI:");
    println!("  API key:           {}", mask(cfg.openai.api_key.as_deref()));
    println!("  Base URL:          {}", cfg.openai.base_url);
    println!("  Model:             {}", cfg.openai.model);
    println!("  Fallback on error: {}", cfg.openai.fallback_on_error);
    println!();
    println!("Jobs:");
    println!("  Max age:          {}h", cfg.jobs.max_age_hours);
    println!("  Sweep interval:   {}s", cfg.jobs.sweep_interval_seconds);
    println!("  Default category: {}", cfg.jobs.default_category);
    println!();
    println!("HTTP timeout: {}s", cfg.http.timeout_seconds);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_hides_secrets() {
        assert_eq!(mask(None), "(not set)");
        assert_eq!(mask(Some("short")), "****");
        assert_eq!(mask(Some("sk-abcdefghijkl")), "sk-a****");
    }

    #[test]
    fn test_cli_parses_process_command() {
        let cli = Cli::try_parse_from([
            "decisions",
            "process",
            "memo.m4a",
            "--user",
            "user-1",
            "--poll-ms",
            "250",
        ])
        .unwrap();

        match cli.command {
            Commands::Process {
                file,
                user,
                poll_ms,
            } => {
                assert_eq!(file, PathBuf::from("memo.m4a"));
                assert_eq!(user, "user-1");
                assert_eq!(poll_ms, 250);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_follow_job_stops_when_task_panics() {
        let jobs = JobManager::in_memory();
        let job = jobs.create_job("user1", None, None).await;
        let handle = tokio::spawn(async { panic!("collaborator blew up") });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            follow_job(&jobs, job.id, handle, Duration::from_millis(10)),
        )
        .await
        .expect("follow_job should not hang");

        let err = result.unwrap_err();
        assert!(err.to_string().contains("panicked"));
    }

    #[tokio::test]
    async fn test_follow_job_returns_finished_job() {
        let jobs = JobManager::in_memory();
        let job = jobs.create_job("user1", None, None).await;
        let handle = {
            let jobs = jobs.clone();
            tokio::spawn(async move {
                jobs.mark_failed(job.id, "boom", Some("PROCESSING_ERROR")).await;
            })
        };

        let finished = follow_job(&jobs, job.id, handle, Duration::from_millis(10))
            .await
            .unwrap();

        assert_eq!(finished.status, ProcessingStatus::Failed);
        assert_eq!(finished.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_read_audio_rejects_empty_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        let err = read_audio(temp.path()).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }
}
