use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use super::roles::{satisfies_any, ConsoleRole, PlatformRole, Role};
use crate::config::AccessConfig;
use crate::error::WorkflowError;

/// The caller of an operation, as resolved by the upstream credential layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub username: String,
    pub role: Option<Role>,
    pub ip_address: Option<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>, username: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            role: Some(role),
            ip_address: None,
        }
    }

    pub fn with_ip(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Submit,
    List,
    Get,
    AuditTrail,
    Approve,
    Reject,
    Complete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Submit => "submit",
            Operation::List => "list",
            Operation::Get => "get",
            Operation::AuditTrail => "audit_trail",
            Operation::Approve => "approve",
            Operation::Reject => "reject",
            Operation::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Static table of acceptable roles per operation. An empty list means the
/// operation is open.
#[derive(Debug, Clone, Default)]
pub struct RoleRequirements {
    table: HashMap<Operation, Vec<Role>>,
}

impl RoleRequirements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, operation: Operation, roles: Vec<Role>) -> Self {
        self.table.insert(operation, roles);
        self
    }

    pub fn for_operation(&self, operation: Operation) -> &[Role] {
        self.table.get(&operation).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Build the table from configured role names. Unrecognised names are
    /// refused.
    pub fn from_config(access: &AccessConfig) -> anyhow::Result<Self> {
        let parse = |operation: Operation, names: &[String]| -> anyhow::Result<Vec<Role>> {
            names
                .iter()
                .map(|name| match name.parse() {
                    Ok(Role::Unknown) | Err(_) => Err(anyhow::anyhow!(
                        "unknown role {name:?} configured for {operation}"
                    )),
                    Ok(role) => Ok(role),
                })
                .collect()
        };

        let mut requirements = Self::new();
        for (operation, names) in [
            (Operation::Submit, &access.submit),
            (Operation::List, &access.list),
            (Operation::Get, &access.get),
            (Operation::AuditTrail, &access.audit_trail),
            (Operation::Approve, &access.approve),
            (Operation::Reject, &access.reject),
            (Operation::Complete, &access.complete),
        ] {
            requirements = requirements.require(operation, parse(operation, names.as_slice())?);
        }
        Ok(requirements)
    }

    /// Reviewer tiers used when nothing is configured: support staff or any
    /// console moderator may review, only super admins settle.
    pub fn standard() -> Self {
        let reviewers = vec![
            Role::Platform(PlatformRole::Support),
            Role::Console(ConsoleRole::Moderator),
        ];
        Self::new()
            .require(Operation::Submit, vec![Role::Platform(PlatformRole::User)])
            .require(Operation::List, reviewers.clone())
            .require(Operation::Get, reviewers.clone())
            .require(Operation::AuditTrail, reviewers.clone())
            .require(Operation::Approve, reviewers.clone())
            .require(Operation::Reject, reviewers)
            .require(
                Operation::Complete,
                vec![
                    Role::Platform(PlatformRole::SuperAdmin),
                    Role::Console(ConsoleRole::SuperAdmin),
                ],
            )
    }
}

#[derive(Debug, Clone)]
pub struct AccessGate {
    requirements: RoleRequirements,
}

impl AccessGate {
    pub fn new(requirements: RoleRequirements) -> Self {
        Self { requirements }
    }

    pub fn requirements(&self) -> &RoleRequirements {
        &self.requirements
    }

    /// Admit or deny `principal` for `operation`.
    pub fn authorize(
        &self,
        principal: Option<&Principal>,
        operation: Operation,
    ) -> Result<(), WorkflowError> {
        check(principal, self.requirements.for_operation(operation))
    }
}

/// Evaluate a principal against a list of acceptable roles.
pub fn check(principal: Option<&Principal>, acceptable: &[Role]) -> Result<(), WorkflowError> {
    if acceptable.is_empty() {
        return Ok(());
    }

    let principal = principal.ok_or(WorkflowError::Unauthenticated)?;

    let role = principal
        .role
        .ok_or_else(|| WorkflowError::Forbidden("no role assigned".to_string()))?;

    if satisfies_any(role, acceptable) {
        return Ok(());
    }

    debug!(
        "Denied principal {} with role {} (requires one of {:?})",
        principal.id, role, acceptable
    );

    let names: Vec<String> = acceptable.iter().map(Role::to_string).collect();
    Err(WorkflowError::Forbidden(format!(
        "requires one of [{}], but caller has role [{}]",
        names.join(", "),
        role
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn support() -> Role {
        Role::Platform(PlatformRole::Support)
    }

    fn admin() -> Role {
        Role::Platform(PlatformRole::Admin)
    }

    #[test]
    fn open_operation_admits_anonymous_callers() {
        assert!(check(None, &[]).is_ok());
    }

    #[test]
    fn missing_principal_is_unauthenticated() {
        let err = check(None, &[support()]).unwrap_err();
        assert!(matches!(err, WorkflowError::Unauthenticated));
    }

    #[test]
    fn principal_without_role_is_forbidden() {
        let principal = Principal {
            id: "u-1".into(),
            username: "ghost".into(),
            role: None,
            ip_address: None,
        };
        let err = check(Some(&principal), &[support()]).unwrap_err();
        match err {
            WorkflowError::Forbidden(message) => assert_eq!(message, "no role assigned"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn higher_role_is_admitted() {
        let principal = Principal::new("a-1", "alice", admin());
        assert!(check(Some(&principal), &[support()]).is_ok());
    }

    #[test]
    fn denial_lists_every_acceptable_role() {
        let principal = Principal::new("u-2", "bob", Role::Platform(PlatformRole::User));
        let err = check(Some(&principal), &[support(), admin()]).unwrap_err();
        match err {
            WorkflowError::Forbidden(message) => {
                assert!(message.contains("SUPPORT"), "{message}");
                assert!(message.contains("ADMIN"), "{message}");
                assert!(message.contains("[USER]"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn either_track_may_admit() {
        let gate = AccessGate::new(RoleRequirements::standard());
        let moderator = Principal::new("m-1", "mod", Role::Console(ConsoleRole::Moderator));
        let support_agent = Principal::new("s-1", "sam", support());
        assert!(gate.authorize(Some(&moderator), Operation::Approve).is_ok());
        assert!(gate.authorize(Some(&support_agent), Operation::Approve).is_ok());
        assert!(gate
            .authorize(Some(&support_agent), Operation::Complete)
            .is_err());
    }
}
