//! Configuration for the decisions pipeline.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (SUPABASE_URL, OPENAI_API_KEY, ...)
//! 2. Config file (.decisions/config.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .decisions/config.yaml
//! - Falls back to ~/.decisions/config.yaml

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::{assemblyai, openai, supabase};
use crate::domain::DEFAULT_CATEGORY;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".decisions";
const CONFIG_FILE: &str = "config.yaml";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub version: Option<String>,
    #[serde(default)]
    pub supabase: Option<SupabaseSection>,
    #[serde(default)]
    pub assemblyai: Option<AssemblyAiSection>,
    #[serde(default)]
    pub openai: Option<OpenAiSection>,
    #[serde(default)]
    pub jobs: Option<JobsSection>,
    #[serde(default)]
    pub http: Option<HttpSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupabaseSection {
    pub url: Option<String>,
    pub service_role_key: Option<String>,
    pub bucket: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssemblyAiSection {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiSection {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub fallback_on_error: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobsSection {
    pub max_age_hours: Option<u64>,
    pub sweep_interval_seconds: Option<u64>,
    pub default_category: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpSection {
    pub timeout_seconds: Option<u64>,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub supabase: SupabaseSettings,
    pub assemblyai: AssemblyAiSettings,
    pub openai: OpenAiSettings,
    pub jobs: JobSettings,
    pub http: HttpSettings,
}

#[derive(Debug, Clone)]
pub struct SupabaseSettings {
    pub url: Option<String>,
    pub service_role_key: Option<String>,
    pub bucket: String,
}

impl SupabaseSettings {
    /// Project URL and service role key, required by the Supabase adapters
    pub fn credentials(&self) -> Result<(&str, &str)> {
        let url = self
            .url
            .as_deref()
            .context("Supabase URL not configured (set SUPABASE_URL)")?;
        let key = self
            .service_role_key
            .as_deref()
            .context("Supabase key not configured (set SUPABASE_SERVICE_ROLE_KEY)")?;
        Ok((url, key))
    }
}

#[derive(Debug, Clone)]
pub struct AssemblyAiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub poll_interval_ms: u64,
}

impl AssemblyAiSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub fallback_on_error: bool,
}

#[derive(Debug, Clone)]
pub struct JobSettings {
    pub max_age_hours: u64,
    pub sweep_interval_seconds: u64,
    pub default_category: String,
}

impl JobSettings {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_hours * 60 * 60)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            max_age_hours: 24,
            sweep_interval_seconds: 3600,
            default_category: DEFAULT_CATEGORY.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout_seconds: u64,
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: 120,
        }
    }
}

/// Find config file by searching current directory and parents, then home
fn find_config_file() -> Option<PathBuf> {
    if let Ok(mut current) = std::env::current_dir() {
        loop {
            let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }

            if !current.pop() {
                break;
            }
        }
    }

    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
        .filter(|path| path.exists())
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Read an environment variable, treating empty values as unset
fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a numeric/boolean environment override
fn parse_env<T: std::str::FromStr>(
    env: &dyn Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    env(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| anyhow::anyhow!("Invalid value for {}: {}", key, raw))
        })
        .transpose()
}

/// Merge a config file and environment lookups over defaults
fn resolve(
    file: ConfigFile,
    config_file: Option<PathBuf>,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let supabase_file = file.supabase.unwrap_or_default();
    let assemblyai_file = file.assemblyai.unwrap_or_default();
    let openai_file = file.openai.unwrap_or_default();
    let jobs_file = file.jobs.unwrap_or_default();
    let http_file = file.http.unwrap_or_default();
    let job_defaults = JobSettings::default();

    let supabase = SupabaseSettings {
        url: env("SUPABASE_URL").or(supabase_file.url),
        service_role_key: env("SUPABASE_SERVICE_ROLE_KEY").or(supabase_file.service_role_key),
        bucket: env("SUPABASE_AUDIO_BUCKET")
            .or(supabase_file.bucket)
            .unwrap_or_else(|| supabase::DEFAULT_AUDIO_BUCKET.to_string()),
    };

    let assemblyai = AssemblyAiSettings {
        api_key: env("ASSEMBLYAI_API_KEY").or(assemblyai_file.api_key),
        base_url: env("ASSEMBLYAI_BASE_URL")
            .or(assemblyai_file.base_url)
            .unwrap_or_else(|| assemblyai::DEFAULT_BASE_URL.to_string()),
        poll_interval_ms: parse_env(env, "ASSEMBLYAI_POLL_INTERVAL_MS")?
            .or(assemblyai_file.poll_interval_ms)
            .unwrap_or(assemblyai::DEFAULT_POLL_INTERVAL.as_millis() as u64),
    };

    let openai = OpenAiSettings {
        api_key: env("OPENAI_API_KEY").or(openai_file.api_key),
        base_url: env("OPENAI_BASE_URL")
            .or(openai_file.base_url)
            .unwrap_or_else(|| openai::DEFAULT_BASE_URL.to_string()),
        model: env("OPENAI_MODEL")
            .or(openai_file.model)
            .unwrap_or_else(|| openai::DEFAULT_MODEL.to_string()),
        fallback_on_error: parse_env(env, "OPENAI_FALLBACK_ON_ERROR")?
            .or(openai_file.fallback_on_error)
            .unwrap_or(false),
    };

    let jobs = JobSettings {
        max_age_hours: parse_env(env, "DECISIONS_JOB_MAX_AGE_HOURS")?
            .or(jobs_file.max_age_hours)
            .unwrap_or(job_defaults.max_age_hours),
        sweep_interval_seconds: parse_env(env, "DECISIONS_SWEEP_INTERVAL_SECONDS")?
            .or(jobs_file.sweep_interval_seconds)
            .unwrap_or(job_defaults.sweep_interval_seconds),
        default_category: env("DECISIONS_DEFAULT_CATEGORY")
            .or(jobs_file.default_category)
            .unwrap_or(job_defaults.default_category),
    };

    let http = HttpSettings {
        timeout_seconds: parse_env(env, "DECISIONS_HTTP_TIMEOUT_SECONDS")?
            .or(http_file.timeout_seconds)
            .unwrap_or(HttpSettings::default().timeout_seconds),
    };

    Ok(ResolvedConfig {
        config_file,
        supabase,
        assemblyai,
        openai,
        jobs,
        http,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let config_file = find_config_file();
    let file = match config_file {
        Some(ref path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    resolve(file, config_file, &process_env)
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
