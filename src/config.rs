//! Configuration for birdlog paths and analysis settings.
//!
//! Configuration sources (highest priority first):
//! 1. Command-line flags (applied by the CLI on top of this)
//! 2. Environment variables (BIRDLOG_HOME, BIRDLOG_RECORDINGS)
//! 3. Config file (.birdlog/config.yaml)
//! 4. Defaults (~/.birdlog)
//!
//! Config file discovery:
//! - Searches current directory and parents for .birdlog/config.yaml
//! - Paths in config file are relative to the project root (the parent of .birdlog/)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapters::{BridgeConfig, Location, OutputSink};
use crate::core::{MissingSamplePolicy, PipelineSettings, StatePaths};
use crate::ingest::ScannerConfig;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".birdlog";
const CONFIG_FILE: &str = "config.yaml";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub site: Option<SiteConfig>,
    #[serde(default)]
    pub analysis: Option<AnalysisConfig>,
    #[serde(default)]
    pub classifier: Option<ClassifierConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (ledger, dataset, lock)
    pub home: Option<String>,
    /// Root searched for recordings
    pub recordings: Option<String>,
    /// Logger telemetry summary CSV
    pub summary: Option<String>,
    /// Cumulative dataset CSV
    pub dataset: Option<String>,
    /// Processed-file ledger
    pub ledger: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    pub extension: Option<String>,
    pub min_confidence: Option<f64>,
    pub missing_sample_policy: Option<MissingSamplePolicy>,
    pub checkpoint_every: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    pub command: Option<String>,
    /// Replaces the bundled helper invocation when set
    pub args: Option<Vec<String>>,
    pub output: Option<OutputSink>,
}

/// Environment variable overrides
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub home: Option<PathBuf>,
    pub recordings: Option<PathBuf>,
}

impl EnvOverrides {
    /// Read BIRDLOG_HOME and BIRDLOG_RECORDINGS
    pub fn from_env() -> Self {
        Self {
            home: std::env::var_os("BIRDLOG_HOME").map(PathBuf::from),
            recordings: std::env::var_os("BIRDLOG_RECORDINGS").map(PathBuf::from),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedConfig {
    /// State directory
    pub home: PathBuf,
    /// Recordings root
    pub recordings: PathBuf,
    /// Recording file extension, without the dot
    pub extension: String,
    /// Telemetry summary CSV
    pub summary: PathBuf,
    /// Cumulative dataset CSV
    pub dataset: PathBuf,
    /// Processed-file ledger
    pub ledger: PathBuf,
    /// Recording site
    pub location: Location,
    /// Inclusive confidence floor
    pub min_confidence: f64,
    pub missing_sample: MissingSamplePolicy,
    /// Files between checkpoints (0 = only at the end)
    pub checkpoint_every: usize,
    /// How to launch the classifier
    pub classifier: BridgeConfig,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Defaults rooted at `home`
    pub fn with_home(home: PathBuf) -> Self {
        let settings = PipelineSettings::default();
        Self {
            recordings: home.join("recordings"),
            extension: "WAV".to_string(),
            summary: home.join("data").join("SUMMARY.csv"),
            dataset: home.join("data").join("bird_data.csv"),
            ledger: home.join("analysis_tracker.txt"),
            location: settings.location,
            min_confidence: settings.min_confidence,
            missing_sample: settings.missing_sample,
            checkpoint_every: settings.checkpoint_every,
            classifier: BridgeConfig::default(),
            config_file: None,
            home,
        }
    }

    /// Run lock file
    pub fn lock_path(&self) -> PathBuf {
        self.home.join("birdlog.lock")
    }

    pub fn state_paths(&self) -> StatePaths {
        StatePaths {
            ledger: self.ledger.clone(),
            dataset: self.dataset.clone(),
            summary: self.summary.clone(),
        }
    }

    pub fn scanner_config(&self) -> ScannerConfig {
        ScannerConfig {
            root: self.recordings.clone(),
            extension: self.extension.clone(),
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            location: self.location,
            min_confidence: self.min_confidence,
            missing_sample: self.missing_sample,
            checkpoint_every: self.checkpoint_every,
            limit: None,
        }
    }
}

/// Find config file by searching `start` and its parents
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration starting the file search at `start`
pub fn load_config_from(start: &Path, env: &EnvOverrides) -> Result<ResolvedConfig> {
    let default_home = match &env.home {
        Some(home) => home.clone(),
        None => dirs::home_dir()
            .context("Failed to determine home directory")?
            .join(".birdlog"),
    };

    let Some(config_path) = find_config_file(start) else {
        // No config file - use env vars or defaults
        let mut config = ResolvedConfig::with_home(default_home);
        if let Some(recordings) = &env.recordings {
            config.recordings = recordings.clone();
        }
        return Ok(config);
    };

    let file = load_config_file(&config_path)?;

    // Base directory is the parent of .birdlog/ (i.e., grandparent of config.yaml)
    let base_dir = config_path
        .parent()
        .and_then(|p| p.parent())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    let resolve = |value: &Option<String>| value.as_deref().map(|v| resolve_path(&base_dir, v));

    let home = match (&env.home, resolve(&file.paths.home)) {
        (Some(env_home), _) => env_home.clone(),
        (None, Some(home)) => home,
        (None, None) => default_home,
    };

    let mut config = ResolvedConfig::with_home(home);
    config.config_file = Some(config_path.clone());

    if let Some(recordings) = env.recordings.clone().or_else(|| resolve(&file.paths.recordings)) {
        config.recordings = recordings;
    }
    if let Some(summary) = resolve(&file.paths.summary) {
        config.summary = summary;
    }
    if let Some(dataset) = resolve(&file.paths.dataset) {
        config.dataset = dataset;
    }
    if let Some(ledger) = resolve(&file.paths.ledger) {
        config.ledger = ledger;
    }

    if let Some(site) = &file.site {
        config.location.latitude = site.latitude.unwrap_or(config.location.latitude);
        config.location.longitude = site.longitude.unwrap_or(config.location.longitude);
    }

    if let Some(analysis) = file.analysis {
        if let Some(extension) = analysis.extension {
            config.extension = extension;
        }
        config.min_confidence = analysis.min_confidence.unwrap_or(config.min_confidence);
        config.missing_sample = analysis
            .missing_sample_policy
            .unwrap_or(config.missing_sample);
        config.checkpoint_every = analysis.checkpoint_every.unwrap_or(config.checkpoint_every);
    }

    if let Some(classifier) = file.classifier {
        if let Some(command) = classifier.command {
            config.classifier.command = command;
        }
        if classifier.args.is_some() {
            config.classifier.args = classifier.args;
        }
        config.classifier.output = classifier.output.unwrap_or(config.classifier.output);
    }

    if !(0.0..=1.0).contains(&config.min_confidence) {
        anyhow::bail!(
            "min_confidence must be within [0, 1], got {} in {}",
            config.min_confidence,
            config_path.display()
        );
    }

    Ok(config)
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    load_config_from(&cwd, &EnvOverrides::from_env())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
