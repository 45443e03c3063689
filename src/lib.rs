// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # nifikop - Apache NiFi Operator for Kubernetes
//!
//! nifikop is a Kubernetes operator written in Rust that drives Apache NiFi clusters
//! through Custom Resource Definitions (CRDs). It does not run NiFi itself: it
//! reconciles what is declared in Kubernetes against the NiFi REST API.
//!
//! ## Overview
//!
//! This library provides the core functionality for the operator, including:
//!
//! - Custom Resource Definitions for clusters, users, user groups, registry clients,
//!   parameter contexts and versioned dataflows
//! - Reconciliation logic driving the remote NiFi entities
//! - A typed NiFi REST client with node routing, plus an in-memory fake for tests
//! - Cluster PKI through cert-manager or a self-managed CA
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types
//! - [`reconcilers`] - Reconciliation logic for each resource type
//! - [`nifi`] - NiFi REST client
//! - [`wrappers`] - Spec-to-remote synchronization of single NiFi entities
//! - [`clientconfig`] - Connection parameters for managed and external clusters
//! - [`pki`] - Cluster and user certificates
//! - [`context`] - Shared context for controllers
//!
//! ## Example
//!
//! ```rust,no_run
//! use nifikop::crd::{NifiRegistryClient, NifiRegistryClientSpec, ResourceReference};
//!
//! let spec = NifiRegistryClientSpec {
//!     cluster_ref: ResourceReference::new("nifi"),
//!     uri: "http://nifi-registry:18080".to_string(),
//!     description: None,
//! };
//! let client = NifiRegistryClient::new("registry", spec);
//! ```
//!
//! ## Features
//!
//! - **Graceful scaling** - Nodes are disconnected and offloaded before removal
//! - **Long-running jobs** - Drop, update and parameter context requests are
//!   persisted in status and polled, never awaited in-process
//! - **Status Tracking** - Full status subresources with a single `Ready` condition

pub mod clientconfig;
pub mod config;
pub mod constants;
pub mod context;
pub mod crd;
pub mod errors;
pub mod events;
pub mod http_errors;
pub mod labels;
pub mod metrics;
pub mod nifi;
pub mod pki;
pub mod reconcilers;
pub mod retry;
pub mod status_reasons;
pub mod wrappers;
