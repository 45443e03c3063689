// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Privileged client selection over a cluster topology snapshot.
//!
//! Every remote call is routed to a single node: the connected coordinator when there
//! is one, else the first node a client was built for, else the all-nodes address.
//! When a node is being decommissioned its own calls are routed away from it.

use std::collections::BTreeMap;

use crate::clientconfig::NodeUri;
use crate::constants::NODE_URI_TEMPLATE_PLACEHOLDER;
use crate::nifi::types::NodeDto;

/// Client an operation is sent through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// The per-node client of the given node id
    Node(i32),
    /// The client addressing the whole cluster
    AllNodes,
}

/// Node topology snapshot, valid for the lifetime of one client instance.
#[derive(Clone, Debug, Default)]
pub struct Topology {
    nodes: Vec<NodeDto>,
    node_uris: BTreeMap<i32, NodeUri>,
    node_uri_template: Option<String>,
}

impl Topology {
    #[must_use]
    pub fn new(nodes: Vec<NodeDto>, node_uris: BTreeMap<i32, NodeUri>) -> Self {
        Self {
            nodes,
            node_uris,
            node_uri_template: None,
        }
    }

    /// Host template (`%d` for the node id) used to find nodes that have no client.
    #[must_use]
    pub fn with_node_uri_template(mut self, template: Option<String>) -> Self {
        self.node_uri_template = template;
        self
    }

    #[must_use]
    pub fn nodes(&self) -> &[NodeDto] {
        &self.nodes
    }

    #[must_use]
    pub fn node_uris(&self) -> &BTreeMap<i32, NodeUri> {
        &self.node_uris
    }

    /// Operator node id of a described node, matched on `address:apiPort`.
    #[must_use]
    pub fn node_id_of(&self, node: &NodeDto) -> Option<i32> {
        let listener = node.host_listener();
        self.node_uris
            .iter()
            .find(|(_, uri)| uri.host_listener == listener)
            .map(|(id, _)| *id)
    }

    /// `address:apiPort` of an operator node id.
    ///
    /// Nodes joining or leaving the cluster have no client, so their listener comes
    /// from the host template.
    #[must_use]
    pub fn host_listener_of(&self, node_id: i32) -> Option<String> {
        if let Some(uri) = self.node_uris.get(&node_id) {
            return Some(uri.host_listener.clone());
        }
        self.node_uri_template
            .as_deref()
            .map(|t| t.replace(NODE_URI_TEMPLATE_PLACEHOLDER, &node_id.to_string()))
    }

    /// Described node for an operator node id.
    #[must_use]
    pub fn node_by_id(&self, node_id: i32) -> Option<&NodeDto> {
        let listener = self.host_listener_of(node_id)?;
        self.nodes.iter().find(|n| n.host_listener() == listener)
    }

    /// Node id of the coordinator, only while it is connected.
    #[must_use]
    pub fn coordinator_node_id(&self) -> Option<i32> {
        self.nodes
            .iter()
            .filter(|n| n.is_coordinator() && n.is_connected())
            .find_map(|n| self.node_id_of(n))
    }

    /// First connected node with a client, other than `exclude`.
    #[must_use]
    pub fn first_connected_node_id(&self, exclude: i32) -> Option<i32> {
        self.nodes
            .iter()
            .filter(|n| n.is_connected())
            .filter_map(|n| self.node_id_of(n))
            .find(|id| *id != exclude)
    }

    /// Coordinator, else first node with a client, else all nodes.
    #[must_use]
    pub fn privileged(&self) -> Target {
        if let Some(id) = self.coordinator_node_id() {
            return Target::Node(id);
        }
        match self.node_uris.keys().next() {
            Some(id) => Target::Node(*id),
            None => Target::AllNodes,
        }
    }

    /// Selection used for calls about `node_id` itself (disconnect, offload, remove).
    ///
    /// Prefers another connected node, so a coordinator being removed never serves
    /// its own removal, then falls back to [`Topology::privileged`].
    #[must_use]
    pub fn privileged_except(&self, node_id: i32) -> Target {
        if let Some(id) = self.coordinator_node_id().filter(|id| *id != node_id) {
            return Target::Node(id);
        }
        if let Some(id) = self.first_connected_node_id(node_id) {
            return Target::Node(id);
        }
        self.privileged()
    }
}

#[cfg(test)]
#[path = "routing_tests.rs"]
mod routing_tests;
