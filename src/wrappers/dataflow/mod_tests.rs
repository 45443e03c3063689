// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::constants::CONTROLLER_SERVICE_ENABLED;
    use crate::crd::NifiDataflowSpec;
    use crate::nifi::fake::FakeNifi;
    use crate::nifi::types::{
        ConnectionEntity, ControllerServiceDto, ControllerServicesEntity, ProcessorDto,
        ProcessorEntity, RevisionDto,
    };
    use serde_json::json;

    fn dataflow(version: Option<i32>, strategy: &str) -> NifiDataflow {
        let spec: NifiDataflowSpec = serde_json::from_value(json!({
            "bucketId": "B",
            "flowId": "F",
            "flowVersion": version,
            "clusterRef": { "name": "nifi" },
            "updateStrategy": strategy,
        }))
        .unwrap();
        let mut flow = NifiDataflow::new("ingest", spec);
        flow.metadata.namespace = Some("data".to_string());
        flow
    }

    fn binding() -> FlowBinding {
        FlowBinding {
            parent_process_group_id: "root".to_string(),
            registry_id: "registry-1".to_string(),
            parameter_context_id: None,
        }
    }

    fn status_for(id: &str) -> NifiDataflowStatus {
        NifiDataflowStatus {
            process_group_id: Some(id.to_string()),
            ..Default::default()
        }
    }

    fn processor(id: &str, state: &str) -> ProcessorEntity {
        ProcessorEntity {
            id: id.to_string(),
            revision: RevisionDto {
                client_id: None,
                version: 1,
            },
            component: ProcessorDto {
                id: id.to_string(),
                name: id.to_string(),
                state: state.to_string(),
            },
        }
    }

    fn service(state: &str, validation: Option<&str>) -> ControllerServiceEntity {
        ControllerServiceEntity {
            id: "cs-1".to_string(),
            parent_group_id: None,
            component: ControllerServiceDto {
                id: "cs-1".to_string(),
                name: "pool".to_string(),
                state: state.to_string(),
                validation_status: validation.map(ToString::to_string),
            },
        }
    }

    fn queued(id: &str, count: i64) -> ConnectionEntity {
        let mut connection = ConnectionEntity {
            id: id.to_string(),
            ..Default::default()
        };
        connection.status.aggregate_snapshot.flow_files_queued = count;
        connection
    }

    async fn deployed(nifi: &FakeNifi, version: i32) -> String {
        create(nifi, &dataflow(Some(version), "drop"), &binding())
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_create_resolves_latest_version() {
        let nifi = FakeNifi::new();
        nifi.state()
            .flow_versions
            .insert("B/F".to_string(), vec![1, 3, 2]);

        let token = create(&nifi, &dataflow(None, "drop"), &binding())
            .await
            .unwrap();

        let state = nifi.state();
        let group = &state.process_groups[&token.id].component;
        assert_eq!(group.name, "ingest");
        assert_eq!(group.parent_group_id.as_deref(), Some("root"));
        let vci = &state.version_info[&token.id].version_control_information;
        assert_eq!(vci.version, 3);
        assert_eq!(vci.registry_id, "registry-1");
    }

    #[tokio::test]
    async fn test_create_without_registry_versions_is_invalid() {
        let nifi = FakeNifi::new();
        nifi.state().flow_versions.insert("B/F".to_string(), vec![]);

        let err = create(&nifi, &dataflow(Some(-1), "drop"), &binding())
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Invalid(_)));
        assert_eq!(nifi.count("create_process_group"), 0);
    }

    #[tokio::test]
    async fn test_exists_follows_remote_process_group() {
        let nifi = FakeNifi::new();
        assert!(!exists(&nifi, &NifiDataflowStatus::default()).await.unwrap());

        let id = deployed(&nifi, 2).await;
        assert!(exists(&nifi, &status_for(&id)).await.unwrap());

        nifi.state().process_groups.remove(&id);
        assert!(!exists(&nifi, &status_for(&id)).await.unwrap());
    }

    #[tokio::test]
    async fn test_is_out_of_sync_detects_drift() {
        let nifi = FakeNifi::new();
        let id = deployed(&nifi, 2).await;
        let status = status_for(&id);

        let flow = dataflow(Some(2), "drop");
        assert!(!is_out_of_sync(&nifi, &flow, &binding(), &status).await.unwrap());

        let bumped = dataflow(Some(3), "drop");
        assert!(is_out_of_sync(&nifi, &bumped, &binding(), &status).await.unwrap());

        let with_context = FlowBinding {
            parameter_context_id: Some("context-9".to_string()),
            ..binding()
        };
        assert!(is_out_of_sync(&nifi, &flow, &with_context, &status).await.unwrap());

        nifi.state()
            .version_info
            .get_mut(&id)
            .unwrap()
            .version_control_information
            .state = Some("LOCALLY_MODIFIED".to_string());
        assert!(is_out_of_sync(&nifi, &flow, &binding(), &status).await.unwrap());
    }

    #[tokio::test]
    async fn test_schedule_enables_services_before_processors() {
        let nifi = FakeNifi::new();
        let id = deployed(&nifi, 2).await;
        {
            let mut state = nifi.state();
            state.controller_services.insert(
                id.clone(),
                ControllerServicesEntity {
                    controller_services: vec![service("DISABLED", Some("VALID"))],
                },
            );
            let flow = &mut state.flows.get_mut(&id).unwrap().process_group_flow.flow;
            flow.processors = vec![processor("p1", "STOPPED"), processor("p2", "DISABLED")];
        }

        let err = schedule(&nifi, &id).await.unwrap_err();
        assert_eq!(
            err.pending_condition(),
            Some(AsyncCondition::FlowControllerServiceScheduling)
        );
        assert_eq!(nifi.count("schedule_process_group"), 0);

        let err = schedule(&nifi, &id).await.unwrap_err();
        assert_eq!(err.pending_condition(), Some(AsyncCondition::FlowScheduling));

        schedule(&nifi, &id).await.unwrap();

        let calls = nifi.calls();
        let enable = calls
            .iter()
            .position(|c| c == &format!("activate_controller_services({id},{CONTROLLER_SERVICE_ENABLED})"))
            .unwrap();
        let start = calls
            .iter()
            .position(|c| c == &format!("schedule_process_group({id},RUNNING)"))
            .unwrap();
        assert!(enable < start);
        let state = nifi.state();
        let processors = &state.flows[&id].process_group_flow.flow.processors;
        assert_eq!(processors[0].component.state, "RUNNING");
        assert_eq!(processors[1].component.state, "DISABLED");
    }

    #[tokio::test]
    async fn test_schedule_ignores_invalid_disabled_service() {
        let nifi = FakeNifi::new();
        let id = deployed(&nifi, 2).await;
        nifi.state().controller_services.insert(
            id.clone(),
            ControllerServicesEntity {
                controller_services: vec![service("DISABLED", Some("INVALID"))],
            },
        );

        schedule(&nifi, &id).await.unwrap();

        assert_eq!(nifi.count("activate_controller_services"), 0);
    }

    #[tokio::test]
    async fn test_remove_drops_queues_then_deletes() {
        let nifi = FakeNifi::new();
        let id = deployed(&nifi, 2).await;
        {
            let mut state = nifi.state();
            state.controller_services.insert(
                id.clone(),
                ControllerServicesEntity {
                    controller_services: vec![service("ENABLED", Some("VALID"))],
                },
            );
            let flow = &mut state.flows.get_mut(&id).unwrap().process_group_flow.flow;
            flow.connections = vec![queued("c1", 5)];
        }
        let mut status = status_for(&id);

        let err = remove(&nifi, DataflowUpdateStrategy::Drop, &mut status)
            .await
            .unwrap_err();
        assert_eq!(
            err.pending_condition(),
            Some(AsyncCondition::ConnectionDropping)
        );
        assert_eq!(
            status.latest_drop_request.as_ref().unwrap().connection_id,
            "c1"
        );

        let err = remove(&nifi, DataflowUpdateStrategy::Drop, &mut status)
            .await
            .unwrap_err();
        assert_eq!(
            err.pending_condition(),
            Some(AsyncCondition::FlowControllerServiceScheduling)
        );
        assert!(status.latest_drop_request.as_ref().unwrap().finished);

        remove(&nifi, DataflowUpdateStrategy::Drop, &mut status)
            .await
            .unwrap();
        assert!(!nifi.state().process_groups.contains_key(&id));
        assert_eq!(nifi.count("create_drop_request"), 1);
        assert_eq!(nifi.count("remove_process_group"), 1);

        // Absent process group is success.
        remove(&nifi, DataflowUpdateStrategy::Drop, &mut status)
            .await
            .unwrap();
        assert_eq!(nifi.count("remove_process_group"), 1);
    }

    #[tokio::test]
    async fn test_remove_without_process_group_is_noop() {
        let nifi = FakeNifi::new();
        let mut status = NifiDataflowStatus::default();

        remove(&nifi, DataflowUpdateStrategy::Drain, &mut status)
            .await
            .unwrap();

        assert!(nifi.calls().is_empty());
    }
}
