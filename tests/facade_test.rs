#[cfg(test)]
mod facade_tests {
    use futures::future::join_all;
    use record_webcam::platform::SyntheticPlatform;
    use record_webcam::session::Control;
    use record_webcam::testing::SyntheticRig;
    use record_webcam::types::MediaDeviceInfo;
    use record_webcam::{Platform, RecordError, RecordWebcam, RecordWebcamConfig, Status};

    fn fast_config() -> RecordWebcamConfig {
        let mut config = RecordWebcamConfig::default();
        config.session.settle_delay_ms = 0;
        config
    }

    #[tokio::test]
    async fn test_new_lists_devices_with_defaults() {
        let webcam = RecordWebcam::new(Platform::synthetic(), fast_config())
            .await
            .unwrap();
        let devices = webcam.devices();
        assert_eq!(devices.by_type().video.len(), 2);
        assert_eq!(devices.by_type().audio.len(), 2);
        assert_eq!(devices.defaults().video.device_id, "cam1");
        assert_eq!(devices.defaults().audio.device_id, "mic1");
        assert!(devices.get("speaker1").is_none(), "outputs are not capture devices");
    }

    #[tokio::test]
    async fn test_permission_denied_is_fatal() {
        let platform = SyntheticPlatform::builder().deny_permission().build();
        let err = RecordWebcam::new(platform.into_platform(), fast_config())
            .await
            .unwrap_err();
        assert!(matches!(err, RecordError::PermissionDenied(_)));
        assert_eq!(err.code(), "NO_USER_PERMISSION");
    }

    #[tokio::test]
    async fn test_missing_microphone_is_fatal() {
        let cameras_only = vec![MediaDeviceInfo::video("cam1", "Only Camera")];
        let platform = SyntheticPlatform::builder().devices(cameras_only).build();
        let err = RecordWebcam::new(platform.into_platform(), fast_config())
            .await
            .unwrap_err();
        assert!(matches!(err, RecordError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = fast_config();
        config.session.max_subscribers = 0;
        let err = RecordWebcam::new(Platform::synthetic(), config)
            .await
            .unwrap_err();
        assert!(matches!(err, RecordError::Config(_)));
    }

    #[tokio::test]
    async fn test_hook_operations_end_to_end() {
        let webcam = RecordWebcam::new(Platform::synthetic(), fast_config())
            .await
            .unwrap();

        let session = webcam.create_recording(None, None).unwrap();
        assert!(webcam.is_recording_created(&session.id));
        assert_eq!(webcam.controls(&session.id).unwrap(), vec![
            Control::Open,
            Control::Close,
            Control::Cancel,
        ]);

        webcam.open_camera(&session.id).await.unwrap();
        let controls = webcam.controls(&session.id).unwrap();
        assert!(controls.contains(&Control::Start));
        assert!(!controls.contains(&Control::Stop));

        webcam.start_recording(&session.id).await.unwrap();
        webcam.pause_recording(&session.id).await.unwrap();
        assert!(webcam.controls(&session.id).unwrap().contains(&Control::Resume));
        webcam.resume_recording(&session.id).await.unwrap();
        let stopped = webcam.stop_recording(&session.id).await.unwrap();
        assert!(stopped.allows(Control::Download));

        let download = webcam.download(&session.id).unwrap();
        assert!(download.file_name.ends_with(".webm"));
        assert!(!download.blob.is_empty());

        webcam.clear_preview(&session.id).await.unwrap();
        assert_eq!(webcam.get_recording(&session.id).unwrap().status, Status::Initial);

        webcam.cancel_recording(&session.id).await.unwrap();
        assert!(webcam.active_recordings().is_empty());
    }

    #[tokio::test]
    async fn test_apply_recording_options_uses_config_naming() {
        let mut config = fast_config();
        config.options.file_name = Some("standup".to_string());
        config.options.file_type = "mkv".to_string();
        let webcam = RecordWebcam::new(Platform::synthetic(), config).await.unwrap();

        let session = webcam.create_recording(Some("cam2"), Some("mic2")).unwrap();
        assert_eq!(session.file_name, "standup");

        let applied = webcam.apply_recording_options(&session.id).await.unwrap();
        assert_eq!(applied.download_name(), "standup.mkv");
    }

    #[tokio::test]
    async fn test_error_slot_can_be_cleared() {
        let webcam = RecordWebcam::new(Platform::synthetic(), fast_config())
            .await
            .unwrap();
        let _ = webcam.stop_recording("cam1-mic1").await;
        assert_eq!(
            webcam.error_message().as_deref(),
            Some("No recording by id found: cam1-mic1")
        );

        webcam.clear_error();
        assert!(webcam.error().is_none());
    }

    #[tokio::test]
    async fn test_teardown_releases_every_camera() {
        let platform = SyntheticPlatform::builder().rig(SyntheticRig::default()).build();
        let webcam = RecordWebcam::new(platform.clone().into_platform(), fast_config())
            .await
            .unwrap();

        let ids: Vec<String> = [("cam1", "mic1"), ("cam2", "mic2")]
            .iter()
            .map(|(video, audio)| webcam.create_recording(Some(*video), Some(*audio)).unwrap().id.clone())
            .collect();
        let opened = join_all(ids.iter().map(|id| webcam.open_camera(id))).await;
        assert!(opened.iter().all(|r| r.is_ok()));
        assert_eq!(platform.live_track_count(), 4);

        webcam.teardown().await;
        assert_eq!(platform.live_track_count(), 0);
        assert!(webcam.snapshot().sessions.is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_receives_updates() {
        let webcam = RecordWebcam::new(Platform::synthetic(), fast_config())
            .await
            .unwrap();
        let mut updates = webcam.subscribe().unwrap();

        let session = webcam.create_recording(None, None).unwrap();
        updates.changed().await.unwrap();
        assert!(updates.borrow().get(&session.id).is_some());
    }
}
