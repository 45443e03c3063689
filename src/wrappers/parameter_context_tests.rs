// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::NifiParameterContextSpec;
    use crate::nifi::fake::FakeNifi;
    use serde_json::json;

    fn context(parameters: serde_json::Value) -> NifiParameterContext {
        let spec: NifiParameterContextSpec = serde_json::from_value(json!({
            "description": "ingest settings",
            "parameters": parameters,
            "clusterRef": { "name": "nifi" },
        }))
        .unwrap();
        let mut context = NifiParameterContext::new("ingest", spec);
        context.metadata.namespace = Some("data".to_string());
        context
    }

    fn secrets(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn remote_values(nifi: &FakeNifi, id: &str) -> Vec<(String, Option<String>)> {
        let mut values: Vec<(String, Option<String>)> = nifi.state().parameter_contexts[id]
            .component
            .parameters
            .iter()
            .map(|p| (p.parameter.name.clone(), p.parameter.value.clone()))
            .collect();
        values.sort();
        values
    }

    #[test]
    fn test_desired_adds_secret_keys_as_sensitive() {
        let dto = desired(
            &context(json!([
                { "name": "batch", "value": "100" },
                { "name": "password", "value": "plain" }
            ])),
            &secrets(&[("password", "s3cret")]),
        );

        assert_eq!(dto.name, "ingest");
        assert_eq!(dto.description, "ingest settings");
        assert_eq!(dto.parameters.len(), 2);
        let password = dto
            .parameters
            .iter()
            .find(|p| p.parameter.name == "password")
            .unwrap();
        assert!(password.parameter.sensitive);
        assert_eq!(password.parameter.value.as_deref(), Some("s3cret"));
    }

    #[tokio::test]
    async fn test_sync_creates_missing_context() {
        let nifi = FakeNifi::new();
        let mut status = NifiParameterContextStatus::default();

        sync(&nifi, &context(json!([{ "name": "batch", "value": "100" }])), &BTreeMap::new(), &mut status)
            .await
            .unwrap();

        let id = status.id.clone().unwrap();
        assert_eq!(status.version, 1);
        assert_eq!(remote_values(&nifi, &id), vec![("batch".to_string(), Some("100".to_string()))]);
        assert_eq!(nifi.count("create_parameter_context_update_request"), 0);
    }

    #[tokio::test]
    async fn test_sync_in_sync_submits_nothing() {
        let nifi = FakeNifi::new();
        let declared = context(json!([{ "name": "batch", "value": "100" }]));
        let secret = secrets(&[("token", "abc")]);
        let mut status = NifiParameterContextStatus::default();
        sync(&nifi, &declared, &secret, &mut status).await.unwrap();

        // NiFi masks sensitive values.
        let id = status.id.clone().unwrap();
        for p in &mut nifi
            .state()
            .parameter_contexts
            .get_mut(&id)
            .unwrap()
            .component
            .parameters
        {
            if p.parameter.sensitive {
                p.parameter.value = Some("********".to_string());
            }
        }

        sync(&nifi, &declared, &secret, &mut status).await.unwrap();
        assert_eq!(nifi.count("create_parameter_context_update_request"), 0);
    }

    #[tokio::test]
    async fn test_sync_change_is_polled_to_completion() {
        let nifi = FakeNifi::new();
        let mut status = NifiParameterContextStatus::default();
        sync(
            &nifi,
            &context(json!([{ "name": "batch", "value": "100" }, { "name": "old", "value": "x" }])),
            &BTreeMap::new(),
            &mut status,
        )
        .await
        .unwrap();
        let id = status.id.clone().unwrap();

        let changed = context(json!([{ "name": "batch", "value": "500" }]));
        let err = sync(&nifi, &changed, &BTreeMap::new(), &mut status)
            .await
            .unwrap_err();
        assert_eq!(
            err.pending_condition(),
            Some(AsyncCondition::ParameterContextUpdating)
        );
        let request = status.latest_update_request.clone().unwrap();
        assert_eq!(request.job_state(), JobState::Submitted);
        assert_eq!(
            remote_values(&nifi, &id),
            vec![("batch".to_string(), Some("500".to_string()))]
        );

        sync(&nifi, &changed, &BTreeMap::new(), &mut status)
            .await
            .unwrap();
        assert!(status.latest_update_request.as_ref().unwrap().complete);
        assert_eq!(status.version, 2);
        assert_eq!(nifi.count("create_parameter_context_update_request"), 1);
        assert_eq!(nifi.count("get_parameter_context_update_request"), 1);
    }

    #[tokio::test]
    async fn test_running_request_is_not_resubmitted() {
        let nifi = FakeNifi::new();
        nifi.state().polls_until_complete = 2;
        let mut status = NifiParameterContextStatus::default();
        sync(&nifi, &context(json!([])), &BTreeMap::new(), &mut status)
            .await
            .unwrap();

        let changed = context(json!([{ "name": "batch", "value": "1" }]));
        for _ in 0..3 {
            let err = sync(&nifi, &changed, &BTreeMap::new(), &mut status)
                .await
                .unwrap_err();
            assert!(err.is_pending());
        }
        sync(&nifi, &changed, &BTreeMap::new(), &mut status)
            .await
            .unwrap();

        assert_eq!(nifi.count("create_parameter_context_update_request"), 1);
        assert_eq!(nifi.count("get_parameter_context_update_request"), 3);
    }

    #[tokio::test]
    async fn test_failed_request_is_reported() {
        let nifi = FakeNifi::new();
        nifi.state().polls_until_complete = 5;
        let mut status = NifiParameterContextStatus::default();
        sync(&nifi, &context(json!([])), &BTreeMap::new(), &mut status)
            .await
            .unwrap();
        let changed = context(json!([{ "name": "batch", "value": "1" }]));
        sync(&nifi, &changed, &BTreeMap::new(), &mut status)
            .await
            .unwrap_err();

        let request_id = status.latest_update_request.clone().unwrap().id;
        nifi.state()
            .parameter_context_requests
            .get_mut(&request_id)
            .unwrap()
            .request
            .failure_reason = Some("component is running".to_string());

        let err = sync(&nifi, &changed, &BTreeMap::new(), &mut status)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Invalid(ref m) if m.contains("component is running")));
        assert!(!status
            .latest_update_request
            .as_ref()
            .unwrap()
            .job_state()
            .is_running());
    }

    #[tokio::test]
    async fn test_remove_context() {
        let nifi = FakeNifi::new();
        let token = create(&nifi, &context(json!([])), &BTreeMap::new())
            .await
            .unwrap();
        assert!(exists(&nifi, Some(&token.id)).await.unwrap());

        remove(&nifi, Some(&token.id)).await.unwrap();
        remove(&nifi, Some(&token.id)).await.unwrap();

        assert!(!exists(&nifi, Some(&token.id)).await.unwrap());
        assert_eq!(nifi.count("remove_parameter_context"), 1);
    }
}
