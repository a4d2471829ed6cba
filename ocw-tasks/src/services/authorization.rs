//! Authorization gate
//!
//! Two-step check used by every operator-facing operation: the bearer
//! token identifies a [`Caller`], then the caller is authorized against a
//! target transcript. Worker callbacks are not gated; they are addressed by
//! an unguessable task id.

use ocw_common::config::{AccessConfig, AccessToken};
use std::sync::Arc;

use crate::error::{TaskError, TaskResult};
use crate::models::TargetKey;

/// Workspace entry granting access to every workspace
pub const ALL_WORKSPACES: &str = "*";

/// Authenticated principal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub name: String,
    pub super_admin: bool,
    pub workspaces: Vec<String>,
}

impl Caller {
    pub fn super_admin(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            super_admin: true,
            workspaces: vec![ALL_WORKSPACES.to_string()],
        }
    }

    pub fn can_edit(&self, workspace_id: &str) -> bool {
        self.super_admin
            || self
                .workspaces
                .iter()
                .any(|w| w == ALL_WORKSPACES || w == workspace_id)
    }
}

impl From<&AccessToken> for Caller {
    fn from(token: &AccessToken) -> Self {
        Self {
            name: token.name.clone(),
            super_admin: token.super_admin,
            workspaces: token.workspaces.clone(),
        }
    }
}

pub trait AuthorizationGate: Send + Sync {
    /// Resolve a bearer token (if any) to a caller
    fn identify(&self, bearer: Option<&str>) -> TaskResult<Caller>;

    /// Fail with `Unauthorized` unless `caller` may operate on `target`
    fn authorize(&self, caller: &Caller, target: &TargetKey) -> TaskResult<()> {
        if caller.can_edit(&target.workspace_id) {
            Ok(())
        } else {
            Err(TaskError::Unauthorized(format!(
                "{} may not edit workspace {}",
                caller.name, target.workspace_id
            )))
        }
    }

    fn require_super_admin(&self, caller: &Caller) -> TaskResult<()> {
        if caller.super_admin {
            Ok(())
        } else {
            Err(TaskError::Unauthorized(format!(
                "{} is not a super admin",
                caller.name
            )))
        }
    }
}

/// Static token table from `[access] tokens`
pub struct TokenGate {
    tokens: Vec<AccessToken>,
}

impl TokenGate {
    pub fn new(tokens: Vec<AccessToken>) -> Self {
        Self { tokens }
    }
}

impl AuthorizationGate for TokenGate {
    fn identify(&self, bearer: Option<&str>) -> TaskResult<Caller> {
        let bearer = bearer
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .ok_or_else(|| TaskError::Unauthenticated("missing bearer token".to_string()))?;

        self.tokens
            .iter()
            .find(|t| t.token == bearer)
            .map(Caller::from)
            .ok_or_else(|| TaskError::Unauthenticated("unknown bearer token".to_string()))
    }
}

/// Gate used when access control is disabled: everyone is a super admin
pub struct OpenGate;

impl AuthorizationGate for OpenGate {
    fn identify(&self, _bearer: Option<&str>) -> TaskResult<Caller> {
        Ok(Caller::super_admin("anonymous"))
    }
}

/// Build the gate described by `[access]`
pub fn gate_from_config(access: &AccessConfig) -> Arc<dyn AuthorizationGate> {
    if access.disabled {
        tracing::warn!("Access control disabled; all callers are treated as super admins");
        Arc::new(OpenGate)
    } else {
        if access.tokens.is_empty() {
            tracing::warn!("No access tokens configured; every operator request will be rejected");
        }
        Arc::new(TokenGate::new(access.tokens.clone()))
    }
}
