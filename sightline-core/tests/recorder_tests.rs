//! Recorder sink lifecycle tests

mod mocks;

use bytes::Bytes;
use mocks::MockProvider;
use sightline_core::capture::StreamAcquirer;
use sightline_core::error::SightlineError;
use sightline_core::output::{RecorderSink, RecorderState};
use sightline_core::types::SourceId;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;

async fn acquire(provider: &MockProvider, id: &str) -> sightline_core::capture::MediaStream {
    StreamAcquirer::new(Arc::new(provider.clone()))
        .acquire(&SourceId::new(id))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_stop_before_record_is_noop() {
    let mut recorder = RecorderSink::discarding();

    let stats = assert_ok!(recorder.stop().await);
    assert_eq!(stats.chunks, 0);
    assert_eq!(recorder.state(), RecorderState::Idle);
}

#[tokio::test]
async fn test_record_then_stop_releases_stream() {
    let provider = MockProvider::new(&["w1"]);
    let mut recorder = RecorderSink::discarding();

    recorder.record(acquire(&provider, "w1").await).unwrap();
    assert_eq!(recorder.state(), RecorderState::Recording);
    assert_eq!(recorder.source_id(), Some(&SourceId::new("w1")));
    assert!(recorder.is_running());
    assert_eq!(provider.live_tracks(), 1);

    recorder.stop().await.unwrap();
    assert_eq!(recorder.state(), RecorderState::Stopped);
    assert!(!recorder.is_running());
    assert_eq!(provider.live_tracks(), 0);

    // Stopping twice is harmless
    recorder.stop().await.unwrap();
    assert_eq!(recorder.state(), RecorderState::Stopped);
}

#[tokio::test]
async fn test_second_record_rejected_and_released() {
    let provider = MockProvider::new(&["w1", "w2"]);
    let mut recorder = RecorderSink::discarding();

    recorder.record(acquire(&provider, "w1").await).unwrap();
    let err = recorder.record(acquire(&provider, "w2").await).unwrap_err();
    assert!(matches!(err, SightlineError::RecorderState(_)));

    // The rejected stream was dropped; the first keeps running
    assert_eq!(provider.live_tracks(), 1);
    assert_eq!(recorder.source_id(), Some(&SourceId::new("w1")));

    recorder.stop().await.unwrap();
    assert_eq!(provider.live_tracks(), 0);
}

#[tokio::test]
async fn test_record_after_stop_rejected() {
    let provider = MockProvider::new(&["w1"]);
    let mut recorder = RecorderSink::discarding();

    recorder.record(acquire(&provider, "w1").await).unwrap();
    recorder.stop().await.unwrap();

    let result = recorder.record(acquire(&provider, "w1").await);
    assert!(matches!(result, Err(SightlineError::RecorderState(_))));
    assert_eq!(recorder.state(), RecorderState::Stopped);
    assert_eq!(provider.live_tracks(), 0);
}

#[tokio::test]
async fn test_channel_recorder_sequences_chunks() {
    let provider = MockProvider::new(&["w1"]).with_chunks(vec![
        Bytes::from_static(b"aa"),
        Bytes::from_static(b"bbb"),
        Bytes::from_static(b"c"),
    ]);
    let (mut recorder, mut chunks) = RecorderSink::with_channel(8);

    recorder.record(acquire(&provider, "w1").await).unwrap();

    let mut sequences = Vec::new();
    for _ in 0..3 {
        let chunk = chunks.recv().await.unwrap();
        sequences.push((chunk.sequence, chunk.len()));
    }
    assert_eq!(sequences, vec![(0, 2), (1, 3), (2, 1)]);

    let stats = recorder.stop().await.unwrap();
    assert_eq!(stats.chunks, 3);
    assert_eq!(stats.bytes, 6);
    assert!(chunks.recv().await.is_none());
}

#[tokio::test]
async fn test_dropped_receiver_ends_recording() {
    let provider = MockProvider::new(&["w1"]).with_chunks(vec![Bytes::from_static(b"x")]);
    let (mut recorder, chunks) = RecorderSink::with_channel(1);
    drop(chunks);

    recorder.record(acquire(&provider, "w1").await).unwrap();

    for _ in 0..100 {
        if !recorder.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!recorder.is_running());
    assert_eq!(provider.live_tracks(), 0);

    recorder.stop().await.unwrap();
    assert_eq!(recorder.stats().chunks, 0);
}

#[tokio::test]
async fn test_drop_while_recording_releases_stream() {
    let provider = MockProvider::new(&["w1"]);
    let mut recorder = RecorderSink::discarding();
    recorder.record(acquire(&provider, "w1").await).unwrap();

    drop(recorder);

    for _ in 0..100 {
        if provider.live_tracks() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(provider.live_tracks(), 0);
}
