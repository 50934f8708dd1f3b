//! Crash Recovery Integration Tests
//!
//! The dataset is saved before the ledger. If a run dies between the two,
//! the next run must not classify the same files again.

mod common;

use birdlog::core::{PipelineContext, PipelineSettings, RunLock};
use common::{detection, Fixture, Scripted};

#[tokio::test]
async fn test_lost_ledger_is_rebuilt_from_dataset() {
    let fx = Fixture::new();
    let path = fx.recording("20260201_070000.WAV");
    fx.telemetry("2026-02-01T07:00:00", 20.0, 4.1);

    let classifier = Scripted::new()
        .respond("20260201_070000.WAV", vec![detection("Carolina Wren", 0.9, true)]);
    let (result, _) = fx.run(classifier, PipelineSettings::default()).await;
    result.unwrap();

    // Crash after the dataset write, before the ledger write
    std::fs::remove_file(fx.paths().ledger).unwrap();

    let ctx = PipelineContext::load(&fx.paths()).await.unwrap();
    assert!(ctx.ledger.contains(&path));
    assert!(ctx.ledger.is_dirty());

    let rerun = Scripted::new();
    let (result, ctx) = fx.run(rerun.clone(), PipelineSettings::default()).await;
    let summary = result.unwrap();

    assert!(rerun.seen().is_empty());
    assert_eq!(summary.files_processed, 0);
    assert_eq!(ctx.dataset.len(), 1);

    // The recovered entry is written back
    assert_eq!(fx.ledger_text().trim_end(), path);
}

#[tokio::test]
async fn test_checkpoints_bound_lost_work() {
    let fx = Fixture::new();
    let names = [
        "20260201_070000.WAV",
        "20260201_080000.WAV",
        "20260201_090000.WAV",
    ];
    for name in names {
        fx.recording(name);
    }
    fx.telemetry("2026-02-01T07:00:00", 20.0, 4.1);
    fx.telemetry("2026-02-01T08:00:00", 20.0, 4.1);
    fx.telemetry("2026-02-01T09:00:00", 20.0, 4.1);

    let classifier = Scripted::new()
        .respond(names[0], vec![detection("Carolina Wren", 0.9, true)])
        .respond(names[1], vec![detection("Blue Jay", 0.9, true)])
        .fail(names[2], "model crashed");

    let settings = PipelineSettings {
        checkpoint_every: 1,
        ..PipelineSettings::default()
    };
    let (result, _) = fx.run(classifier, settings).await;
    assert!(result.is_err());

    let ledger = fx.ledger_text();
    assert_eq!(ledger.lines().count(), 2);

    // Every ledger entry has its rows on disk
    let dataset = fx.dataset_text();
    for entry in ledger.lines() {
        assert!(dataset.contains(entry));
    }
}

#[tokio::test]
async fn test_run_lock_is_exclusive() {
    let fx = Fixture::new();
    let lock_path = fx.root().join("birdlog.lock");

    let held = RunLock::acquire(&lock_path).unwrap();
    assert!(RunLock::acquire(&lock_path).is_err());
    drop(held);

    assert!(RunLock::acquire(&lock_path).is_ok());
}
