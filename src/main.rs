// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use clap::Parser;
use futures::StreamExt;
use kube::{
    runtime::{controller::Action, watcher::Config, Controller},
    Api, Client, ResourceExt,
};
use nifikop::{
    config::OperatorConfig,
    context::Context,
    crd::{
        NifiCluster, NifiDataflow, NifiParameterContext, NifiRegistryClient, NifiUser,
        NifiUserGroup,
    },
    errors::ReconcileError,
    metrics,
    reconcilers::{
        error_policy, reconcile_nifi_cluster, reconcile_nifi_dataflow,
        reconcile_nifi_parameter_context, reconcile_nifi_registry_client, reconcile_nifi_user,
        reconcile_nifi_user_group,
    },
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info};

fn main() -> Result<()> {
    let config = OperatorConfig::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .thread_name("nifikop-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

fn init_tracing() {
    // Respects RUST_LOG, defaults to INFO.
    // RUST_LOG_FORMAT=json switches to structured output.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(config: OperatorConfig) -> Result<()> {
    init_tracing();
    info!("Starting NiFi Operator");
    debug!(?config, "Operator configuration loaded");

    // reqwest and kube both build rustls configs; pick the provider once.
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let metrics_address = config.metrics_bind_address;
    let ctx = Arc::new(Context::new(client.clone(), config));

    info!("Starting all controllers");

    // Controllers should never exit - if one does, the process exits with it
    tokio::select! {
        result = serve_metrics(metrics_address) => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Metrics server exited unexpectedly without error")
        }
        result = run_cluster_controller(client.clone(), ctx.clone()) => {
            error!("CRITICAL: NifiCluster controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("NifiCluster controller exited unexpectedly without error")
        }
        result = run_registry_client_controller(client.clone(), ctx.clone()) => {
            error!("CRITICAL: NifiRegistryClient controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("NifiRegistryClient controller exited unexpectedly without error")
        }
        result = run_parameter_context_controller(client.clone(), ctx.clone()) => {
            error!("CRITICAL: NifiParameterContext controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("NifiParameterContext controller exited unexpectedly without error")
        }
        result = run_user_controller(client.clone(), ctx.clone()) => {
            error!("CRITICAL: NifiUser controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("NifiUser controller exited unexpectedly without error")
        }
        result = run_user_group_controller(client.clone(), ctx.clone()) => {
            error!("CRITICAL: NifiUserGroup controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("NifiUserGroup controller exited unexpectedly without error")
        }
        result = run_dataflow_controller(client.clone(), ctx.clone()) => {
            error!("CRITICAL: NifiDataflow controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("NifiDataflow controller exited unexpectedly without error")
        }
        result = shutdown_signal() => {
            result?;
            info!("Graceful shutdown completed successfully");
            Ok(())
        }
    }
}

/// Wait for SIGTERM (pod termination) or SIGINT.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM (pod termination), initiating graceful shutdown...");
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Received SIGINT, initiating graceful shutdown...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received SIGINT, initiating graceful shutdown...");
    }
    info!("Stopping all controllers...");
    Ok(())
}

/// Serve `/metrics` until the listener fails
async fn serve_metrics(address: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("failed to bind metrics listener on {address}"))?;
    info!(%address, "Serving Prometheus metrics on /metrics");
    axum::serve(listener, metrics::metrics_router()).await?;
    Ok(())
}

/// Run the `NifiCluster` controller
async fn run_cluster_controller(client: Client, ctx: Arc<Context>) -> Result<()> {
    info!("Starting NifiCluster controller");
    debug!("Initializing NifiCluster controller with cluster-wide watch");

    let api = Api::<NifiCluster>::all(client);

    Controller::new(api, Config::default())
        .run(reconcile_cluster_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the `NifiRegistryClient` controller
async fn run_registry_client_controller(client: Client, ctx: Arc<Context>) -> Result<()> {
    info!("Starting NifiRegistryClient controller");

    let api = Api::<NifiRegistryClient>::all(client);

    Controller::new(api, Config::default())
        .run(reconcile_registry_client_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the `NifiParameterContext` controller
async fn run_parameter_context_controller(client: Client, ctx: Arc<Context>) -> Result<()> {
    info!("Starting NifiParameterContext controller");

    let api = Api::<NifiParameterContext>::all(client);

    Controller::new(api, Config::default())
        .run(reconcile_parameter_context_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the `NifiUser` controller
async fn run_user_controller(client: Client, ctx: Arc<Context>) -> Result<()> {
    info!("Starting NifiUser controller");

    let api = Api::<NifiUser>::all(client);

    Controller::new(api, Config::default())
        .run(reconcile_user_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the `NifiUserGroup` controller
async fn run_user_group_controller(client: Client, ctx: Arc<Context>) -> Result<()> {
    info!("Starting NifiUserGroup controller");

    let api = Api::<NifiUserGroup>::all(client);

    Controller::new(api, Config::default())
        .run(reconcile_user_group_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the `NifiDataflow` controller
async fn run_dataflow_controller(client: Client, ctx: Arc<Context>) -> Result<()> {
    info!("Starting NifiDataflow controller");

    let api = Api::<NifiDataflow>::all(client);

    Controller::new(api, Config::default())
        .run(reconcile_dataflow_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `NifiCluster`
async fn reconcile_cluster_wrapper(
    cluster: Arc<NifiCluster>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    debug!(
        cluster_name = %cluster.name_any(),
        namespace = ?cluster.namespace(),
        "Reconcile wrapper called for NifiCluster"
    );
    reconcile_nifi_cluster(ctx, cluster).await
}

/// Reconcile wrapper for `NifiRegistryClient`
async fn reconcile_registry_client_wrapper(
    registry: Arc<NifiRegistryClient>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    reconcile_nifi_registry_client(ctx, registry).await
}

/// Reconcile wrapper for `NifiParameterContext`
async fn reconcile_parameter_context_wrapper(
    context: Arc<NifiParameterContext>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    reconcile_nifi_parameter_context(ctx, context).await
}

/// Reconcile wrapper for `NifiUser`
async fn reconcile_user_wrapper(
    user: Arc<NifiUser>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    reconcile_nifi_user(ctx, user).await
}

/// Reconcile wrapper for `NifiUserGroup`
async fn reconcile_user_group_wrapper(
    group: Arc<NifiUserGroup>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    reconcile_nifi_user_group(ctx, group).await
}

/// Reconcile wrapper for `NifiDataflow`
async fn reconcile_dataflow_wrapper(
    dataflow: Arc<NifiDataflow>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    reconcile_nifi_dataflow(ctx, dataflow).await
}
