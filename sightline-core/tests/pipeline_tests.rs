//! Integration tests for the capture pipeline

mod mocks;

use bytes::Bytes;
use mocks::{renderable, unrenderable, window, MockCapturer, MockProvider};
use sightline_core::capture::{SourceEnumerator, StreamAcquirer};
use sightline_core::config::CaptureConfig;
use sightline_core::error::SightlineError;
use sightline_core::output::{RecorderSink, RecorderState};
use sightline_core::pipeline::{Pipeline, PipelineState};
use sightline_core::types::{SourceFilter, SourceId, SourceKind};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn pipeline(config: CaptureConfig, capturer: &MockCapturer, provider: &MockProvider) -> Pipeline {
    Pipeline::new(
        config,
        Arc::new(capturer.clone()),
        Arc::new(provider.clone()),
    )
}

#[tokio::test]
async fn test_auto_first_records_first_window() {
    let capturer = MockCapturer::new(vec![window("w1", "Editor"), window("w2", "Browser")]);
    let provider = MockProvider::new(&["w1", "w2"]);
    let mut pipeline = pipeline(CaptureConfig::auto_first(), &capturer, &provider);

    let info = assert_ok!(pipeline.start().await);
    assert_eq!(info.source.id, SourceId::new("w1"));
    assert_eq!(info.source.name, "Editor");

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].source_id(), &SourceId::new("w1"));
    assert!(!requests[0].audio);
    assert_eq!(requests[0].video.max_width, 400);
    assert_eq!(requests[0].video.max_height, 300);

    assert_eq!(pipeline.state(), PipelineState::Recording);
    assert_eq!(pipeline.recorder().state(), RecorderState::Recording);

    assert_ok!(pipeline.stop().await);
    assert_eq!(pipeline.recorder().state(), RecorderState::Stopped);
    assert_eq!(provider.live_tracks(), 0);
}

#[tokio::test]
async fn test_unrenderable_source_never_acquired() {
    let capturer = MockCapturer::new(vec![unrenderable("w1", "Editor")]);
    let provider = MockProvider::new(&["w1"]);
    let mut pipeline = pipeline(CaptureConfig::auto_first(), &capturer, &provider);

    let err = assert_err!(pipeline.start().await);
    assert!(matches!(err, SightlineError::NoSources));
    assert!(pipeline.session().sources().is_empty());
    assert_eq!(pipeline.state(), PipelineState::Failed);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_auto_first_skips_filtered_sources() {
    let capturer = MockCapturer::new(vec![
        unrenderable("w0", "Broken"),
        window("w1", "Editor"),
        window("w2", "Browser"),
    ]);
    let provider = MockProvider::new(&["w0", "w1", "w2"]);
    let mut pipeline = pipeline(CaptureConfig::auto_first(), &capturer, &provider);

    let info = pipeline.start().await.unwrap();
    assert_eq!(info.source.id.as_str(), "w1");
    assert_eq!(pipeline.session().sources().len(), 2);
    pipeline.stop().await.unwrap();
}

#[tokio::test]
async fn test_only_identified_windows_are_displayed() {
    let capturer = MockCapturer::new(vec![
        renderable("", "Nameless", SourceKind::Window),
        renderable("s1", "Entire screen", SourceKind::Screen),
        renderable("t1", "Docs tab", SourceKind::Tab),
        window("w1", "Editor"),
    ]);
    let provider = MockProvider::new(&["", "s1", "t1", "w1"]);
    let mut pipeline = pipeline(CaptureConfig::auto_first(), &capturer, &provider);

    let info = pipeline.start().await.unwrap();
    assert_eq!(info.source.id.as_str(), "w1");

    let shown = pipeline.session().sources();
    assert_eq!(shown.len(), 1);
    assert!(shown.iter().all(|s| !s.id.as_str().is_empty()));
    assert!(shown.iter().all(|s| s.kind == SourceKind::Window));

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].source_id(), &SourceId::new("w1"));
    pipeline.stop().await.unwrap();
}

#[tokio::test]
async fn test_screen_filter_excludes_windows() {
    let capturer = MockCapturer::new(vec![
        window("w1", "Editor"),
        renderable("s1", "Entire screen", SourceKind::Screen),
    ]);
    let enumerator = SourceEnumerator::new(Arc::new(capturer));

    let sources = enumerator
        .enumerate(&SourceFilter::of([SourceKind::Screen]))
        .await
        .unwrap();
    let ids: Vec<_> = sources.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["s1"]);
}

#[tokio::test]
async fn test_enumeration_failure_is_fatal() {
    let capturer = MockCapturer::failing();
    let provider = MockProvider::new(&["w1"]);
    let mut pipeline = pipeline(CaptureConfig::auto_first(), &capturer, &provider);

    let err = pipeline.start().await.unwrap_err();
    assert!(matches!(err, SightlineError::Enumeration(_)));
    assert_eq!(pipeline.state(), PipelineState::Failed);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_stale_source_surfaces_acquisition_error() {
    let capturer = MockCapturer::new(vec![window("w1", "Editor")]);
    let provider = MockProvider::new(&["w1"]);
    provider.forget("w1");
    let mut pipeline = pipeline(CaptureConfig::auto_first(), &capturer, &provider);

    let err = pipeline.start().await.unwrap_err();
    assert!(matches!(err, SightlineError::Acquisition(_)));
    assert_eq!(provider.calls(), 1);
    assert_eq!(provider.live_tracks(), 0);
    assert_eq!(pipeline.state(), PipelineState::Failed);
    assert_eq!(pipeline.recorder().state(), RecorderState::Idle);

    // Stop after a failure is harmless
    pipeline.stop().await.unwrap();
    assert_eq!(pipeline.state(), PipelineState::Failed);
}

#[tokio::test]
async fn test_acquirer_rejects_unknown_id_without_stream() {
    let provider = MockProvider::new(&["w1"]);
    let acquirer = StreamAcquirer::new(Arc::new(provider.clone()));

    let result = acquirer.acquire(&SourceId::new("w9")).await;
    assert!(matches!(result, Err(SightlineError::Acquisition(_))));
    assert_eq!(provider.calls(), 1);
    assert_eq!(provider.live_tracks(), 0);
}

#[tokio::test]
async fn test_each_enumeration_queries_provider() {
    let capturer = MockCapturer::new(vec![window("w1", "Editor")]);
    let enumerator = SourceEnumerator::new(Arc::new(capturer.clone()));

    let first = enumerator.enumerate(&SourceFilter::windows()).await.unwrap();
    capturer.set_sources(vec![window("w2", "Browser")]);
    let second = enumerator.enumerate(&SourceFilter::windows()).await.unwrap();

    assert_eq!(capturer.calls(), 2);
    assert_eq!(first[0].id.as_str(), "w1");
    assert_eq!(second[0].id.as_str(), "w2");
}

#[tokio::test]
async fn test_manual_selection_ignores_bad_events() {
    let capturer = MockCapturer::new(vec![window("w1", "Editor"), window("w2", "Browser")]);
    let provider = MockProvider::new(&["w1", "w2"]);
    let config = CaptureConfig::manual().with_selection_timeout(Duration::from_secs(30));
    let mut pipeline = pipeline(config, &capturer, &provider);
    let handle = pipeline.selection_handle().unwrap();

    // Queued before start; the selector drains them in order
    handle.send(sightline_core::capture::SelectionEvent::empty()).await.unwrap();
    handle.select("").await.unwrap();
    handle.select("w7").await.unwrap();
    handle.select("w2").await.unwrap();

    let info = pipeline.start().await.unwrap();
    assert_eq!(info.source.id.as_str(), "w2");
    assert_eq!(provider.calls(), 1);
    pipeline.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_manual_selection_times_out() {
    let capturer = MockCapturer::new(vec![window("w1", "Editor")]);
    let provider = MockProvider::new(&["w1"]);
    let config = CaptureConfig::manual().with_selection_timeout(Duration::from_secs(10));
    let mut pipeline = pipeline(config, &capturer, &provider);
    let _handle = pipeline.selection_handle();

    let err = pipeline.start().await.unwrap_err();
    assert!(matches!(err, SightlineError::SelectionTimeout(_)));
    assert_eq!(provider.calls(), 0);
    assert_eq!(pipeline.state(), PipelineState::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_sub_second_selection_timeout_is_kept() {
    let capturer = MockCapturer::new(vec![window("w1", "Editor")]);
    let provider = MockProvider::new(&["w1"]);
    let config = CaptureConfig::manual().with_selection_timeout(Duration::from_millis(500));
    assert_eq!(config.selection_timeout(), Some(Duration::from_millis(500)));
    let mut pipeline = pipeline(config, &capturer, &provider);
    let handle = pipeline.selection_handle().unwrap();

    let pick = async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.select("w1").await.unwrap();
    };
    let (started, ()) = tokio::join!(pipeline.start(), pick);

    assert_eq!(started.unwrap().source.id.as_str(), "w1");
    pipeline.stop().await.unwrap();
}

#[tokio::test]
async fn test_chunks_reach_channel_recorder() {
    let capturer = MockCapturer::new(vec![window("w1", "Editor")]);
    let provider = MockProvider::new(&["w1"])
        .with_chunks(vec![Bytes::from_static(b"one"), Bytes::from_static(b"two")])
        .ending();
    let (recorder, mut chunks) = RecorderSink::with_channel(4);
    let mut pipeline =
        pipeline(CaptureConfig::auto_first(), &capturer, &provider).with_recorder(recorder);
    let monitor = pipeline.monitor();

    pipeline.start().await.unwrap();

    let first = chunks.recv().await.unwrap();
    let second = chunks.recv().await.unwrap();
    assert_eq!((first.sequence, &first.data[..]), (0, &b"one"[..]));
    assert_eq!((second.sequence, &second.data[..]), (1, &b"two"[..]));
    assert!(chunks.recv().await.is_none());

    let stats = pipeline.stop().await.unwrap();
    assert_eq!(stats.chunks, 2);
    assert_eq!(stats.bytes, 6);
    assert_eq!(monitor.stats().chunks, 2);
    assert_eq!(provider.live_tracks(), 0);
}

#[tokio::test]
async fn test_dropping_pipeline_releases_stream() {
    let capturer = MockCapturer::new(vec![window("w1", "Editor")]);
    let provider = MockProvider::new(&["w1"]);
    let mut pipeline = pipeline(CaptureConfig::auto_first(), &capturer, &provider);

    pipeline.start().await.unwrap();
    assert_eq!(provider.live_tracks(), 1);
    drop(pipeline);

    // The recorder task sees the shutdown signal and releases the track
    for _ in 0..100 {
        if provider.live_tracks() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(provider.live_tracks(), 0);
}
