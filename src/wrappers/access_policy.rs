// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Access-policy membership of users and user groups.
//!
//! NiFi answers `GET /policies/{action}/{resource}` with the closest inherited policy
//! when the exact one does not exist. An answer whose resource differs from the one
//! asked for is therefore treated as absent, and the exact policy is created.

use std::fmt;
use tracing::{debug, info};

use super::{found, with_conflict_retry};
use crate::crd::AccessPolicy;
use crate::errors::SyncResult;
use crate::nifi::types::{
    AccessPolicyDto, AccessPolicyEntity, AccessPolicySummaryEntity, TenantEntity, Versioned,
};
use crate::nifi::TenantApi;

/// Tenant whose policy membership is managed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tenant<'a> {
    User(&'a str),
    Group(&'a str),
}

impl Tenant<'_> {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::User(id) | Self::Group(id) => id,
        }
    }

    fn members<'p>(&self, policy: &'p AccessPolicyDto) -> &'p Vec<TenantEntity> {
        match self {
            Self::User(_) => &policy.users,
            Self::Group(_) => &policy.user_groups,
        }
    }

    fn members_mut<'p>(&self, policy: &'p mut AccessPolicyDto) -> &'p mut Vec<TenantEntity> {
        match self {
            Self::User(_) => &mut policy.users,
            Self::Group(_) => &mut policy.user_groups,
        }
    }

    fn is_member(&self, policy: &AccessPolicyDto) -> bool {
        self.members(policy).iter().any(|t| t.id == self.id())
    }
}

impl fmt::Display for Tenant<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user {id}"),
            Self::Group(id) => write!(f, "user group {id}"),
        }
    }
}

/// A policy as NiFi addresses it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct PolicyTarget {
    pub action: String,
    pub resource: String,
}

impl PolicyTarget {
    /// Remote address of a declared policy.
    #[must_use]
    pub fn declared(policy: &AccessPolicy, root_process_group_id: Option<&str>) -> Self {
        Self {
            action: policy.action.as_str().to_string(),
            resource: policy.resource_path(root_process_group_id),
        }
    }

    /// Remote address of a policy a tenant is attached to.
    #[must_use]
    pub fn attached(summary: &AccessPolicySummaryEntity) -> Self {
        Self {
            action: summary.component.action.clone(),
            resource: summary.component.resource.clone(),
        }
    }
}

impl fmt::Display for PolicyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.action, self.resource)
    }
}

/// The exact policy for `target`, `None` when absent or only inherited.
pub async fn fetch<A: TenantApi + ?Sized>(
    api: &A,
    target: &PolicyTarget,
) -> SyncResult<Option<AccessPolicyEntity>> {
    let policy = found(api.get_access_policy(&target.action, &target.resource).await)?;
    Ok(policy.filter(|p| {
        let exact = p.component.resource == target.resource && p.component.action == target.action;
        if !exact {
            debug!(
                policy = %target,
                inherited = %p.component.resource,
                "Only an inherited policy exists"
            );
        }
        exact
    }))
}

/// Make `tenant` a member of the policy, creating the policy when needed.
pub async fn ensure_attached<A: TenantApi + ?Sized>(
    api: &A,
    target: &PolicyTarget,
    tenant: Tenant<'_>,
) -> SyncResult<()> {
    with_conflict_retry("attach_access_policy", || async move {
        match fetch(api, target).await? {
            None => {
                let mut component = AccessPolicyDto {
                    id: None,
                    resource: target.resource.clone(),
                    action: target.action.clone(),
                    ..Default::default()
                };
                tenant
                    .members_mut(&mut component)
                    .push(TenantEntity::reference(tenant.id()));
                let created = api.create_access_policy(&component).await?;
                info!(policy = %target, id = %created.id, "Created access policy for {tenant}");
            }
            Some(policy) if tenant.is_member(&policy.component) => {
                debug!(policy = %target, "Already attached {tenant}");
            }
            Some(policy) => {
                let mut component = policy.component.clone();
                tenant
                    .members_mut(&mut component)
                    .push(TenantEntity::reference(tenant.id()));
                api.update_access_policy(&policy.token(), &component).await?;
                info!(policy = %target, "Attached {tenant}");
            }
        }
        Ok(())
    })
    .await
}

/// Remove `tenant` from the policy; absent policy or membership is success.
pub async fn ensure_detached<A: TenantApi + ?Sized>(
    api: &A,
    target: &PolicyTarget,
    tenant: Tenant<'_>,
) -> SyncResult<()> {
    with_conflict_retry("detach_access_policy", || async move {
        let Some(policy) = fetch(api, target).await? else {
            return Ok(());
        };
        if !tenant.is_member(&policy.component) {
            return Ok(());
        }
        let mut component = policy.component.clone();
        tenant
            .members_mut(&mut component)
            .retain(|t| t.id != tenant.id());
        api.update_access_policy(&policy.token(), &component).await?;
        info!(policy = %target, "Detached {tenant}");
        Ok(())
    })
    .await
}

/// Reconcile the set of policies `tenant` belongs to.
///
/// The tenant is detached from policies it holds remotely but does not declare, and
/// attached to declared policies it does not hold. Policies on both sides are not
/// touched.
pub async fn reconcile_membership<A: TenantApi + ?Sized>(
    api: &A,
    tenant: Tenant<'_>,
    attached: &[AccessPolicySummaryEntity],
    declared: &[AccessPolicy],
    root_process_group_id: Option<&str>,
) -> SyncResult<()> {
    let mut wanted: Vec<PolicyTarget> = declared
        .iter()
        .map(|p| PolicyTarget::declared(p, root_process_group_id))
        .collect();
    wanted.sort();
    wanted.dedup();
    let current: Vec<PolicyTarget> = attached.iter().map(PolicyTarget::attached).collect();

    for target in current.iter().filter(|t| !wanted.contains(t)) {
        ensure_detached(api, target, tenant).await?;
    }
    for target in wanted.iter().filter(|t| !current.contains(t)) {
        ensure_attached(api, target, tenant).await?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "access_policy_tests.rs"]
mod access_policy_tests;
