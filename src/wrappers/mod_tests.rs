// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::errors::SyncError;
    use crate::nifi::NifiError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn conflict() -> SyncError {
        SyncError::Remote(NifiError::RevisionConflict {
            method: "PUT".into(),
            path: "/tenants/users/u".into(),
            status: 400,
            version: 1,
        })
    }

    #[test]
    fn test_found_maps_absence_to_none() {
        let absent: NifiResult<i32> = Err(NifiError::NotFound {
            method: "GET".into(),
            path: "/x".into(),
        });
        assert_eq!(found(absent).ok(), Some(None));
        assert_eq!(found(Ok(3)).ok(), Some(Some(3)));

        let failure: NifiResult<i32> = Err(NifiError::UnexpectedStatus {
            method: "GET".into(),
            path: "/x".into(),
            status: 500,
            body: String::new(),
        });
        assert!(found(failure).is_err());
    }

    #[test]
    fn test_stored_id_ignores_empty() {
        assert_eq!(stored_id(Some("")), None);
        assert_eq!(stored_id(None), None);
        assert_eq!(stored_id(Some("abc")), Some("abc"));
    }

    #[tokio::test]
    async fn test_conflict_retry_recovers() {
        let attempts = AtomicUsize::new(0);
        let result = with_conflict_retry("test", || async {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(conflict())
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.ok(), Some(7));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_conflict_retry_is_bounded() {
        let attempts = AtomicUsize::new(0);
        let result: SyncResult<()> = with_conflict_retry("test", || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(conflict())
        })
        .await;
        assert!(result.is_err_and(|e| e.is_revision_conflict()));
        assert_eq!(
            attempts.load(Ordering::SeqCst),
            crate::constants::MAX_REVISION_CONFLICT_RETRIES
        );
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let attempts = AtomicUsize::new(0);
        let result: SyncResult<()> = with_conflict_retry("test", || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(SyncError::Invalid("nope".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
