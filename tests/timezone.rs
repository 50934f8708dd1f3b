//! Cutover Correction Integration Tests
//!
//! Recording names and telemetry rows before 2026-01-08 14:00 Eastern were
//! written in UTC. Both sides get the same correction, so they still join.

mod common;

use birdlog::core::PipelineSettings;
use common::{detection, Fixture, Scripted};

#[tokio::test]
async fn test_boundary_files_join_and_shift() {
    let fx = Fixture::new();
    fx.recording("20260108_135959.WAV");
    fx.recording("20260108_140000.WAV");
    fx.telemetry("2026-01-08T13:59:59", 20.0, 4.1);
    fx.telemetry("2026-01-08T14:00:00", 0.0, 4.0);

    let classifier = Scripted::new()
        .respond("20260108_135959.WAV", vec![detection("Carolina Wren", 0.9, true)])
        .respond("20260108_140000.WAV", vec![detection("Blue Jay", 0.9, true)]);

    let (result, ctx) = fx.run(classifier, PipelineSettings::default()).await;
    result.unwrap();

    let rows = ctx.dataset.rows();
    assert_eq!(rows.len(), 2);

    // One second before the cutover: shifted back five hours
    assert_eq!(rows[0].species, "Carolina Wren");
    assert_eq!(rows[0].timestamp.to_rfc3339(), "2026-01-08T08:59:59-05:00");
    assert_eq!(rows[0].temperature_f, 68.0);

    // At the cutover: unchanged
    assert_eq!(rows[1].species, "Blue Jay");
    assert_eq!(rows[1].timestamp.to_rfc3339(), "2026-01-08T14:00:00-05:00");
    assert_eq!(rows[1].temperature_f, 32.0);
}

#[tokio::test]
async fn test_persisted_timestamp_carries_offset() {
    let fx = Fixture::new();
    fx.recording("20260201_070000.WAV");
    fx.telemetry("2026-02-01 07:00:00", 20.0, 4.1);

    let classifier = Scripted::new()
        .respond("20260201_070000.WAV", vec![detection("Carolina Wren", 0.99, true)]);

    let (result, _) = fx.run(classifier, PipelineSettings::default()).await;
    result.unwrap();

    let text = fx.dataset_text();
    let mut lines = text.lines();
    assert_eq!(
        lines.next().unwrap(),
        "Bird_Species,Timestamp,Start_Offset,Confidence,Temperature,Filename,Battery_Voltage"
    );
    let row = lines.next().unwrap();
    assert!(row.starts_with("Carolina Wren,2026-02-01T07:00:00-05:00,"));
}

#[tokio::test]
async fn test_spring_forward_recording_joins() {
    let fx = Fixture::new();
    fx.recording("20260308_023000.WAV");
    fx.telemetry("2026-03-08T02:30:00", 4.0, 3.9);

    let classifier = Scripted::new()
        .respond("20260308_023000.WAV", vec![detection("Carolina Wren", 0.9, true)]);

    let (result, ctx) = fx.run(classifier, PipelineSettings::default()).await;
    assert_eq!(result.unwrap().files_processed, 1);

    // 02:30 does not exist that night; read with the standard offset
    let rows = ctx.dataset.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].timestamp.to_rfc3339(), "2026-03-08T03:30:00-04:00");
    assert_eq!(rows[0].battery_voltage, 3.9);
}

#[tokio::test]
async fn test_unparseable_pending_name_fails_scan() {
    let fx = Fixture::new();
    fx.recording("notes.WAV");

    let ctx = birdlog::core::PipelineContext::load(&fx.paths())
        .await
        .unwrap();
    let scanner = birdlog::Scanner::new(birdlog::ScannerConfig {
        root: fx.recordings(),
        extension: "WAV".to_string(),
    });
    assert!(scanner.scan(&ctx.ledger).is_err());
}
