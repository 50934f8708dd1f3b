//! Command-line interface for birdlog.
//!
//! Provides commands for running a detection batch, checking what is
//! pending, repairing the ledger and printing the activity table.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::{BirdnetBridge, DetectionAdapter, OutputSink};
use crate::config::{self, ResolvedConfig};
use crate::core::{
    self, Dataset, MissingSamplePolicy, Pipeline, PipelineContext, RunLock, RunSummary,
};
use crate::ingest::{Ledger, ScanResult, Scanner};
use crate::report::ActivityTable;

/// birdlog - Acoustic bird detection batch pipeline
#[derive(Parser, Debug)]
#[command(name = "birdlog")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify every recording not yet in the ledger
    Run {
        #[command(flatten)]
        overrides: RunOverrides,

        /// Show the work set without classifying or writing anything
        #[arg(long)]
        dry_run: bool,

        /// Process at most this many pending files
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show processed and pending counts
    Status {
        /// Recordings root (overrides config)
        #[arg(short, long)]
        recordings: Option<PathBuf>,
    },

    /// Add dataset source files missing from the ledger
    Reconcile,

    /// Print detections per species and hour of day
    Report {
        /// Only species whose name contains this text
        #[arg(short, long)]
        species: Option<String>,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Per-invocation overrides of the resolved configuration
#[derive(clap::Args, Debug, Default)]
pub struct RunOverrides {
    /// Recordings root
    #[arg(short, long)]
    pub recordings: Option<PathBuf>,

    /// Recording file extension
    #[arg(long)]
    pub extension: Option<String>,

    /// Inclusive confidence floor
    #[arg(long)]
    pub min_confidence: Option<f64>,

    /// What to do when a recording has no telemetry
    #[arg(long, value_enum)]
    pub on_missing_sample: Option<MissingSamplePolicy>,

    /// Save after this many files (0 = only at the end)
    #[arg(long)]
    pub checkpoint_every: Option<usize>,

    /// Where the classifier's console output goes
    #[arg(long, value_enum, env = "BIRDLOG_CLASSIFIER_OUTPUT")]
    pub classifier_output: Option<OutputSink>,
}

impl RunOverrides {
    /// Apply the flags that were given on top of `cfg`
    pub fn apply(self, mut cfg: ResolvedConfig) -> Result<ResolvedConfig> {
        if let Some(recordings) = self.recordings {
            cfg.recordings = recordings;
        }
        if let Some(extension) = self.extension {
            cfg.extension = extension;
        }
        if let Some(min_confidence) = self.min_confidence {
            if !(0.0..=1.0).contains(&min_confidence) {
                anyhow::bail!("--min-confidence must be within [0, 1], got {}", min_confidence);
            }
            cfg.min_confidence = min_confidence;
        }
        if let Some(policy) = self.on_missing_sample {
            cfg.missing_sample = policy;
        }
        if let Some(every) = self.checkpoint_every {
            cfg.checkpoint_every = every;
        }
        if let Some(output) = self.classifier_output {
            cfg.classifier.output = output;
        }
        Ok(cfg)
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run {
                overrides,
                dry_run,
                limit,
            } => {
                let cfg = overrides.apply(config::config()?.clone())?;
                if dry_run {
                    dry_run_batch(&cfg).await
                } else {
                    run_batch(&cfg, limit).await
                }
            }
            Commands::Status { recordings } => {
                let mut cfg = config::config()?.clone();
                if let Some(recordings) = recordings {
                    cfg.recordings = recordings;
                }
                show_status(&cfg).await
            }
            Commands::Reconcile => reconcile_ledger(config::config()?).await,
            Commands::Report { species } => {
                show_report(config::config()?, species.as_deref()).await
            }
            Commands::Config => show_config(config::config()?),
        }
    }
}

/// Run a full batch
async fn run_batch(cfg: &ResolvedConfig, limit: Option<usize>) -> Result<()> {
    let _lock = RunLock::acquire(&cfg.lock_path())?;

    let mut ctx = PipelineContext::load(&cfg.state_paths()).await?;
    let scan = Scanner::new(cfg.scanner_config())
        .scan(&ctx.ledger)
        .with_context(|| format!("Failed to scan {}", cfg.recordings.display()))?;

    eprintln!(
        "Found {} recordings ({} already analyzed, {} pending)",
        scan.total(),
        scan.processed_count(),
        scan.pending_count()
    );

    if scan.pending_count() == 0 {
        // Still persist anything reconciliation recovered
        core::save(&mut ctx.dataset, &mut ctx.ledger).await?;
        eprintln!("Nothing to do.");
        return Ok(());
    }

    let bridge = BirdnetBridge::spawn(&cfg.classifier)?;
    let adapter = DetectionAdapter::new(Box::new(bridge));

    let mut settings = cfg.pipeline_settings();
    settings.limit = limit;
    let mut pipeline = Pipeline::new(adapter, settings);

    let summary = pipeline.run(&mut ctx, scan.files).await?;
    print_summary(&summary, &ctx);

    Ok(())
}

fn print_summary(summary: &RunSummary, ctx: &PipelineContext) {
    println!("Files analyzed:       {}", summary.files_processed);
    println!("Rows added:           {}", summary.rows_added);
    println!("Implausible dropped:  {}", summary.detections_dropped);
    println!("Dataset rows:         {}", ctx.dataset.len());
    println!(
        "Elapsed:              {}m{}s",
        summary.elapsed.as_secs() / 60,
        summary.elapsed.as_secs() % 60
    );

    if !summary.skipped_missing_sample.is_empty() {
        println!();
        println!(
            "Skipped for missing telemetry ({}):",
            summary.skipped_missing_sample.len()
        );
        for path in &summary.skipped_missing_sample {
            println!("  {}", path);
        }
    }
}

/// Show what a run would do
async fn dry_run_batch(cfg: &ResolvedConfig) -> Result<()> {
    let ctx = PipelineContext::load(&cfg.state_paths()).await?;
    let scan = Scanner::new(cfg.scanner_config()).scan(&ctx.ledger)?;

    println!(
        "{} recordings, {} already analyzed, {} pending",
        scan.total(),
        scan.processed_count(),
        scan.pending_count()
    );

    let mut missing = 0;
    for (path, captured_at) in scan.pending() {
        let telemetry = if ctx.environment.get(captured_at).is_some() {
            "ok"
        } else {
            missing += 1;
            "MISSING"
        };
        println!("  {}  {}  telemetry {}", captured_at.to_rfc3339(), path, telemetry);
    }

    if missing > 0 {
        println!();
        println!(
            "{} pending files have no telemetry (policy: {:?})",
            missing, cfg.missing_sample
        );
    }

    Ok(())
}

/// Show processed and pending counts
async fn show_status(cfg: &ResolvedConfig) -> Result<()> {
    let mut ledger = Ledger::load(cfg.ledger.clone()).await?;
    let dataset = Dataset::load(cfg.dataset.clone()).await?;
    let recoverable = core::reconcile(&dataset, &mut ledger);

    println!("Ledger entries: {}", ledger.len());
    println!("Dataset rows:   {}", dataset.len());
    if recoverable > 0 {
        println!(
            "  ({} dataset sources missing from the ledger; run `birdlog reconcile`)",
            recoverable
        );
    }

    match Scanner::new(cfg.scanner_config()).scan(&ledger) {
        Ok(scan) => print_scan(&scan),
        Err(e) => println!("Recordings:     unavailable ({})", e),
    }

    Ok(())
}

fn print_scan(scan: &ScanResult) {
    println!("Recordings:     {}", scan.total());
    println!("  Analyzed:     {}", scan.processed_count());
    println!("  Pending:      {}", scan.pending_count());
}

/// Catch the ledger up with the dataset and save it
async fn reconcile_ledger(cfg: &ResolvedConfig) -> Result<()> {
    let _lock = RunLock::acquire(&cfg.lock_path())?;

    let mut ledger = Ledger::load(cfg.ledger.clone()).await?;
    let dataset = Dataset::load(cfg.dataset.clone()).await?;

    let added = core::reconcile(&dataset, &mut ledger);
    if added > 0 {
        ledger.flush().await?;
    }

    println!("Recovered {} ledger entries ({} total)", added, ledger.len());
    Ok(())
}

/// Print the species by hour table
async fn show_report(cfg: &ResolvedConfig, species: Option<&str>) -> Result<()> {
    let dataset = Dataset::load(cfg.dataset.clone()).await?;
    let table = ActivityTable::from_rows(dataset.rows(), species);
    print!("{}", table);
    Ok(())
}

/// Show the resolved configuration (for debugging)
fn show_config(cfg: &ResolvedConfig) -> Result<()> {
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();

    let rendered = serde_yaml::to_string(cfg).context("Failed to render configuration")?;
    print!("{}", rendered);
    println!();
    println!(
        "Classifier launch: {} {}",
        cfg.classifier.command,
        cfg.classifier.describe_args()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_flags_parse() {
        let cli = Cli::try_parse_from([
            "birdlog",
            "run",
            "--recordings",
            "/media/sd",
            "--on-missing-sample",
            "skip",
            "--limit",
            "3",
            "--dry-run",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                overrides,
                dry_run,
                limit,
            } => {
                assert!(dry_run);
                assert_eq!(limit, Some(3));
                assert_eq!(overrides.on_missing_sample, Some(MissingSamplePolicy::Skip));
                assert_eq!(overrides.recordings, Some(PathBuf::from("/media/sd")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_overrides_apply() {
        let base = ResolvedConfig::with_home(PathBuf::from("/state"));
        let overrides = RunOverrides {
            min_confidence: Some(0.8),
            checkpoint_every: Some(0),
            classifier_output: Some(OutputSink::Trace),
            ..RunOverrides::default()
        };

        let cfg = overrides.apply(base).unwrap();
        assert_eq!(cfg.min_confidence, 0.8);
        assert_eq!(cfg.checkpoint_every, 0);
        assert_eq!(cfg.classifier.output, OutputSink::Trace);
        assert_eq!(cfg.recordings, PathBuf::from("/state/recordings"));
    }

    #[test]
    fn test_confidence_override_out_of_range() {
        let base = ResolvedConfig::with_home(PathBuf::from("/state"));
        let overrides = RunOverrides {
            min_confidence: Some(65.0),
            ..RunOverrides::default()
        };
        assert!(overrides.apply(base).is_err());
    }
}
