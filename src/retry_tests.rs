// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `retry.rs`

#[cfg(test)]
mod tests {
    use super::super::{default_backoff, is_retryable_error, jitter, nifi_backoff, retry_nifi_read};
    use crate::nifi::NifiError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(Box::new(kube::error::ErrorResponse {
            status: Some(kube::core::response::StatusSummary::Failure),
            message: format!("status {code}"),
            reason: "Test".to_string(),
            code,
            metadata: None,
            details: None,
        }))
    }

    fn unexpected(status: u16) -> NifiError {
        NifiError::UnexpectedStatus {
            method: "GET".into(),
            path: "/flow/process-groups/abc".into(),
            status,
            body: String::new(),
        }
    }

    #[test]
    fn test_backoff_configuration() {
        let backoff = default_backoff();
        assert_eq!(backoff.initial_interval, Duration::from_millis(100));
        assert_eq!(backoff.max_interval, Duration::from_secs(30));
        assert_eq!(backoff.max_elapsed_time, Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_nifi_backoff_stays_inside_one_reconcile() {
        let backoff = nifi_backoff();
        assert_eq!(backoff.initial_interval, Duration::from_millis(50));
        assert_eq!(backoff.max_interval, Duration::from_secs(2));
        assert_eq!(backoff.max_elapsed_time, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_429_and_5xx_are_retryable() {
        for code in [429, 500, 503, 599] {
            assert!(is_retryable_error(&api_error(code)), "{code} should retry");
        }
    }

    #[test]
    fn test_4xx_not_retryable() {
        for code in [400, 401, 404, 409] {
            assert!(!is_retryable_error(&api_error(code)), "{code} should not retry");
        }
    }

    #[test]
    fn test_service_errors_retryable() {
        let service_error: Box<dyn std::error::Error + Send + Sync> = Box::new(
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "Connection failed"),
        );
        assert!(is_retryable_error(&kube::Error::Service(service_error)));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let mut backoff = nifi_backoff();
        let first = backoff.next_backoff().unwrap();
        assert!(first >= Duration::from_millis(45) && first <= Duration::from_millis(55));
        for _ in 0..10 {
            backoff.next_backoff();
        }
        assert_eq!(backoff.current_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_jitter_bounds() {
        for _ in 0..100 {
            let d = jitter(Duration::from_secs(10), 0.1);
            assert!(d >= Duration::from_secs(9) && d <= Duration::from_secs(11));
        }
        assert_eq!(jitter(Duration::from_secs(3), 0.0), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_nifi_read_retries_transient_then_succeeds() {
        let calls = AtomicUsize::new(0);
        let result = retry_nifi_read(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(unexpected(503))
                    } else {
                        Ok("ok")
                    }
                }
            },
            "get process group",
        )
        .await;
        assert_eq!(result, Ok("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_nifi_read_does_not_retry_not_found() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), NifiError> = retry_nifi_read(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(NifiError::NotFound {
                        method: "GET".into(),
                        path: "/process-groups/abc".into(),
                    })
                }
            },
            "get process group",
        )
        .await;
        assert!(result.unwrap_err().is_not_found());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_nifi_read_does_not_retry_internal_error() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), NifiError> = retry_nifi_read(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(unexpected(500)) }
            },
            "get process group",
        )
        .await;
        assert_eq!(result.unwrap_err().status_code(), Some(500));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
