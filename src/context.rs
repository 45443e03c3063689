// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for all controllers.
//!
//! Every controller receives an `Arc<Context>` holding:
//! - the Kubernetes client
//! - the operator configuration
//! - the NiFi client factory (injected, so tests can pass a fake)
//! - the event publisher

use kube::Client;
use std::sync::Arc;

use crate::clientconfig::ConfigManager;
use crate::config::OperatorConfig;
use crate::crd::NifiCluster;
use crate::events::{EventPublisher, KubeEventPublisher};
use crate::nifi::{ClientFactory, HttpClientFactory};

/// Shared context passed to all controllers.
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client for API operations
    pub client: Client,

    pub config: OperatorConfig,

    /// Builds NiFi clients from resolved connection parameters
    pub factory: Arc<dyn ClientFactory>,

    pub events: Arc<dyn EventPublisher>,
}

impl Context {
    /// Production context: HTTP NiFi clients and Kubernetes events.
    #[must_use]
    pub fn new(client: Client, config: OperatorConfig) -> Self {
        let events = Arc::new(KubeEventPublisher::new(
            client.clone(),
            crate::constants::CONTROLLER_NAME,
        ));
        Self {
            client,
            config,
            factory: Arc::new(HttpClientFactory),
            events,
        }
    }

    /// Context with explicit collaborators.
    #[must_use]
    pub fn with_collaborators(
        client: Client,
        config: OperatorConfig,
        factory: Arc<dyn ClientFactory>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            client,
            config,
            factory,
            events,
        }
    }

    /// Connection strategy for a cluster, using the configured operation timeout.
    #[must_use]
    pub fn config_manager(&self, cluster: &NifiCluster) -> ConfigManager {
        ConfigManager::for_cluster(cluster, self.config.operation_timeout())
    }
}
