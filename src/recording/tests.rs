//! Tests for the recording module

#[cfg(test)]
mod recording_tests {
    use crate::errors::{PlatformError, RecordError};
    use crate::platform::{
        MediaDevices, MediaRecorder, MediaStream, RecorderEvent, RecorderPlatform, RecorderState,
        SyntheticPlatform,
    };
    use bytes::Bytes;
    use crate::recording::{RecorderAdapter, RecorderOptions, RecordingStats};
    use crate::testing::chunk_sequences;
    use crate::types::MediaStreamRequest;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    const TIMEOUT: Duration = Duration::from_secs(2);
    const PAYLOAD: usize = 16;

    async fn adapter_for(platform: &SyntheticPlatform) -> RecorderAdapter {
        let stream: Arc<dyn MediaStream> = platform
            .get_user_media(&MediaStreamRequest::exact("cam1", "mic1"))
            .await
            .expect("stream");
        let (recorder, events) = platform
            .create_recorder(stream, &RecorderOptions::default())
            .expect("recorder");
        RecorderAdapter::new(recorder, events, None)
    }

    #[test]
    fn test_options_builder() {
        let options = RecorderOptions::for_file_type("mp4")
            .with_audio_bitrate(64_000)
            .with_video_bitrate(1_000_000);
        assert_eq!(options.mime_type, "video/mp4;codecs=avc1,mp4a.40.2");
        assert_eq!(options.audio_bits_per_second, 64_000);
        assert_eq!(options.video_bits_per_second, 1_000_000);
    }

    #[test]
    fn test_stats_bitrate() {
        let stats = RecordingStats {
            chunks: 2,
            bytes: 1000,
            duration_secs: 2.0,
        };
        assert_eq!(stats.avg_bitrate(), 4000.0);
        assert_eq!(RecordingStats::default().avg_bitrate(), 0.0);
    }

    #[tokio::test]
    async fn test_full_cycle_confirms_each_step() {
        let platform = SyntheticPlatform::builder().chunk_payload(PAYLOAD).build();
        let mut adapter = adapter_for(&platform).await;

        adapter.start(None, TIMEOUT).await.unwrap();
        assert_eq!(adapter.state(), RecorderState::Recording);
        adapter.pause(TIMEOUT).await.unwrap();
        assert_eq!(adapter.state(), RecorderState::Paused);
        adapter.resume(TIMEOUT).await.unwrap();
        assert_eq!(adapter.state(), RecorderState::Recording);

        let chunks = adapter.stop(TIMEOUT).await.unwrap();
        assert_eq!(chunks.len(), 1, "final flush delivers one chunk without a time slice");
        assert_eq!(adapter.state(), RecorderState::Inactive);
    }

    #[tokio::test]
    async fn test_time_slice_chunks_arrive_before_finalize() {
        let platform = SyntheticPlatform::builder().chunk_payload(PAYLOAD).build();
        let stream = platform
            .get_user_media(&MediaStreamRequest::any())
            .await
            .unwrap();
        let (recorder, events) = platform
            .create_recorder(stream, &RecorderOptions::default())
            .unwrap();

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let mut adapter = RecorderAdapter::new(
            recorder,
            events,
            Some(Arc::new(move |count: usize, _bytes: usize| {
                counter.store(count, Ordering::SeqCst);
            })),
        );

        adapter.start(Some(Duration::from_millis(10)), TIMEOUT).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        let chunks = adapter.stop(TIMEOUT).await.unwrap();

        assert!(chunks.len() >= 2, "expected sliced chunks plus final flush, got {}", chunks.len());
        assert_eq!(seen.load(Ordering::SeqCst), chunks.len());

        let joined: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
        let sequences = chunk_sequences(&joined, PAYLOAD).expect("well-formed chunks");
        let expected: Vec<u32> = (0..sequences.len() as u32).collect();
        assert_eq!(sequences, expected, "chunks must be kept in delivery order");
    }

    #[tokio::test]
    async fn test_invalid_pause_surfaces_error() {
        let platform = SyntheticPlatform::builder().build();
        let mut adapter = adapter_for(&platform).await;
        let err = adapter.pause(TIMEOUT).await.unwrap_err();
        assert!(matches!(err, RecordError::Recorder(_)));
    }

    #[tokio::test]
    async fn test_stalled_confirmation_times_out() {
        let platform = SyntheticPlatform::builder().stall_confirmations().build();
        let mut adapter = adapter_for(&platform).await;
        let err = adapter
            .start(None, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err, RecordError::Timeout("start"));
    }

    #[tokio::test]
    async fn test_stop_failure_keeps_finalize_armed() {
        let platform = SyntheticPlatform::builder().build();
        let mut adapter = adapter_for(&platform).await;
        adapter.start(None, TIMEOUT).await.unwrap();

        platform.set_fail_stop(true);
        let err = adapter.stop(TIMEOUT).await.unwrap_err();
        assert!(matches!(err, RecordError::StopRecording(_)));

        platform.set_fail_stop(false);
        assert_eq!(adapter.stop(TIMEOUT).await.unwrap().len(), 1);
        let again = adapter.stop(TIMEOUT).await.unwrap_err();
        assert!(matches!(again, RecordError::StopRecording(_)));
    }

    #[tokio::test]
    async fn test_stop_retry_after_slow_finalize() {
        let platform = SyntheticPlatform::builder()
            .finalize_delay(Duration::from_millis(200))
            .build();
        let mut adapter = adapter_for(&platform).await;
        adapter.start(None, TIMEOUT).await.unwrap();

        let err = adapter.stop(Duration::from_millis(50)).await.unwrap_err();
        assert_eq!(err, RecordError::Timeout("stop"));

        tokio::time::sleep(Duration::from_millis(400)).await;
        let chunks = adapter.stop(Duration::from_millis(50)).await.unwrap();
        assert_eq!(chunks.len(), 1, "the late final chunk is kept");
    }

    /// Recorder driven by hand through its event channel.
    #[derive(Debug, Default)]
    struct ScriptedRecorder {
        stops: Arc<AtomicUsize>,
    }

    impl MediaRecorder for ScriptedRecorder {
        fn state(&self) -> RecorderState {
            RecorderState::Recording
        }

        fn mime_type(&self) -> &str {
            "video/webm"
        }

        fn start(&self, _time_slice: Option<Duration>) -> Result<(), PlatformError> {
            Ok(())
        }

        fn pause(&self) -> Result<(), PlatformError> {
            Ok(())
        }

        fn resume(&self) -> Result<(), PlatformError> {
            Ok(())
        }

        fn stop(&self) -> Result<(), PlatformError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_recorder_error_during_stop_is_retryable() {
        let stops = Arc::new(AtomicUsize::new(0));
        let recorder = ScriptedRecorder {
            stops: stops.clone(),
        };
        let (events, rx) = mpsc::unbounded_channel();
        let mut adapter = RecorderAdapter::new(Box::new(recorder), rx, None);
        events
            .send(RecorderEvent::DataAvailable(Bytes::from_static(b"first")))
            .unwrap();

        let hiccup = events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = hiccup.send(RecorderEvent::Error(PlatformError::Other(
                "encoder hiccup".to_string(),
            )));
        });
        let err = adapter.stop(TIMEOUT).await.unwrap_err();
        assert_eq!(err, RecordError::StopRecording("encoder hiccup".to_string()));
        assert_eq!(
            adapter.failure(),
            Some(PlatformError::Other("encoder hiccup".to_string()))
        );

        events
            .send(RecorderEvent::DataAvailable(Bytes::from_static(b"last")))
            .unwrap();
        events.send(RecorderEvent::Stop).unwrap();
        let chunks = adapter.stop(TIMEOUT).await.unwrap();
        assert_eq!(chunks, vec![Bytes::from_static(b"first"), Bytes::from_static(b"last")]);
        assert_eq!(stops.load(Ordering::SeqCst), 1, "the recorder is asked to stop once");
    }

    #[tokio::test]
    async fn test_closed_event_channel_fails_stop() {
        let (events, rx) = mpsc::unbounded_channel();
        let mut adapter = RecorderAdapter::new(Box::new(ScriptedRecorder::default()), rx, None);
        drop(events);

        let err = adapter.stop(TIMEOUT).await.unwrap_err();
        assert_eq!(
            err,
            RecordError::StopRecording("recorder closed before finalizing".to_string())
        );
    }

    #[tokio::test]
    async fn test_force_stop_discards_data() {
        let platform = SyntheticPlatform::builder().build();
        let mut adapter = adapter_for(&platform).await;
        adapter.start(Some(Duration::from_millis(5)), TIMEOUT).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        adapter.force_stop();
        assert_eq!(adapter.state(), RecorderState::Inactive);
        assert_eq!(adapter.chunk_count(), 0);
    }
}
