use withdrawal_review::auth::{
    satisfies, satisfies_any, AccessGate, ConsoleRole, Operation, PlatformRole, Principal, Role,
    RoleRequirements,
};
use withdrawal_review::config::AccessConfig;
use withdrawal_review::error::WorkflowError;

fn principal(role: &str) -> Principal {
    Principal::new("p-1", "pat", role.parse().unwrap())
}

#[test]
fn higher_roles_inherit_lower_requirements() {
    let gate = AccessGate::new(RoleRequirements::standard());

    for role in ["SUPPORT", "ADMIN", "SUPER_ADMIN", "admin:MODERATOR", "admin:ADMIN"] {
        assert!(
            gate.authorize(Some(&principal(role)), Operation::Approve).is_ok(),
            "{role} should be able to approve"
        );
    }

    for role in ["USER", "GUEST", "admin:GUEST"] {
        let err = gate
            .authorize(Some(&principal(role)), Operation::Approve)
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)), "{role}");
    }
}

#[test]
fn settlement_is_limited_to_super_admins() {
    let gate = AccessGate::new(RoleRequirements::standard());

    assert!(gate
        .authorize(Some(&principal("SUPER_ADMIN")), Operation::Complete)
        .is_ok());
    assert!(gate
        .authorize(Some(&principal("admin:SUPER_ADMIN")), Operation::Complete)
        .is_ok());
    assert!(gate
        .authorize(Some(&principal("ADMIN")), Operation::Complete)
        .is_err());
}

#[test]
fn configured_requirements_replace_the_standard_table() {
    let access = AccessConfig {
        approve: vec!["ADMIN".to_string()],
        list: vec![],
        ..AccessConfig::default()
    };
    let gate = AccessGate::new(RoleRequirements::from_config(&access).unwrap());

    assert!(gate
        .authorize(Some(&principal("SUPPORT")), Operation::Approve)
        .is_err());
    assert!(gate
        .authorize(Some(&principal("ADMIN")), Operation::Approve)
        .is_ok());

    // an empty requirement list leaves the operation open
    assert!(gate.authorize(None, Operation::List).is_ok());
    assert!(gate.authorize(None, Operation::Reject).is_err());
}

#[test]
fn unknown_configured_role_is_refused() {
    let access = AccessConfig {
        approve: vec!["SUPPORT".to_string(), "REVIEWER".to_string()],
        ..AccessConfig::default()
    };
    let err = RoleRequirements::from_config(&access).unwrap_err();
    assert!(err.to_string().contains("REVIEWER"));
}

#[test]
fn principal_without_role_is_forbidden_not_unauthenticated() {
    let gate = AccessGate::new(RoleRequirements::standard());
    let mut anonymous_role = principal("SUPPORT");
    anonymous_role.role = None;

    let err = gate
        .authorize(Some(&anonymous_role), Operation::Get)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(ref msg) if msg == "no role assigned"));

    let err = gate.authorize(None, Operation::Get).unwrap_err();
    assert!(matches!(err, WorkflowError::Unauthenticated));
}

#[test]
fn tracks_do_not_satisfy_each_other() {
    let platform_super = Role::Platform(PlatformRole::SuperAdmin);
    let console_moderator = Role::Console(ConsoleRole::Moderator);

    assert!(!satisfies(platform_super, console_moderator));
    assert!(!satisfies(console_moderator, Role::Platform(PlatformRole::User)));
    assert!(satisfies_any(
        platform_super,
        &[console_moderator, Role::Platform(PlatformRole::Admin)]
    ));
}

#[test]
fn unknown_requirement_closes_the_operation() {
    let gate =
        AccessGate::new(RoleRequirements::new().require(Operation::Approve, vec![Role::Unknown]));

    for role in [
        "USER",
        "SUPPORT",
        "ADMIN",
        "SUPER_ADMIN",
        "admin:MODERATOR",
        "admin:ADMIN",
        "admin:SUPER_ADMIN",
        "GUEST",
    ] {
        let err = gate
            .authorize(Some(&principal(role)), Operation::Approve)
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)), "{role}");
    }
}
