#[cfg(test)]
mod permissions_tests {
    use record_webcam::devices::DeviceDirectory;
    use record_webcam::errors::RecordError;
    use record_webcam::permissions::{request_permission, PermissionStatus};
    use record_webcam::platform::SyntheticPlatform;

    #[tokio::test]
    async fn test_request_permission_returns_status() {
        let platform = SyntheticPlatform::builder().build();
        let result = request_permission(&platform).await;
        match result.status {
            PermissionStatus::Granted
            | PermissionStatus::Denied
            | PermissionStatus::NotDetermined
            | PermissionStatus::Restricted => {}
        }
        assert!(result.is_granted());
    }

    #[tokio::test]
    async fn test_request_permission_is_consistent() {
        let platform = SyntheticPlatform::builder().build();
        let first = request_permission(&platform).await.status;
        for _ in 0..5 {
            let result = request_permission(&platform).await;
            assert_eq!(result.status, first, "Permission status should be consistent");
        }
        assert_eq!(platform.live_track_count(), 0, "permission streams are always released");
    }

    #[tokio::test]
    async fn test_permission_can_be_revoked() {
        let platform = SyntheticPlatform::builder().build();
        assert!(request_permission(&platform).await.is_granted());

        platform.set_permission_denied(true);
        let denied = request_permission(&platform).await;
        assert_eq!(denied.status, PermissionStatus::Denied);
        assert!(denied.can_request);
    }

    #[tokio::test]
    async fn test_concurrent_requests() {
        let platform = SyntheticPlatform::builder().build();
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let platform = platform.clone();
                tokio::spawn(async move { request_permission(&platform).await.status })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), PermissionStatus::Granted);
        }
        assert_eq!(platform.live_track_count(), 0);
    }

    #[tokio::test]
    async fn test_directory_listing_requires_permission() {
        let platform = SyntheticPlatform::builder().deny_permission().build();
        let err = DeviceDirectory::list(&platform).await.unwrap_err();
        assert!(matches!(err, RecordError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_directory_relisting_reruns_permission() {
        let platform = SyntheticPlatform::builder().build();
        let first = DeviceDirectory::list(&platform).await.unwrap();
        let second = DeviceDirectory::list(&platform).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(platform.streams_opened(), 2);
    }
}
