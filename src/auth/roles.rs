//! Role hierarchy for the two privilege tracks.
//!
//! Platform roles (`USER < SUPPORT < ADMIN < SUPER_ADMIN`) and admin-console
//! roles (`MODERATOR < ADMIN < SUPER_ADMIN`) are ordered independently. A role
//! only satisfies requirements declared on its own track. Unrecognised role
//! names resolve to [`Role::Unknown`], which sits below every real role.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Prefix that selects the admin-console track when parsing a role name.
pub const CONSOLE_PREFIX: &str = "admin:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PlatformRole {
    User,
    Support,
    Admin,
    SuperAdmin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConsoleRole {
    Moderator,
    Admin,
    SuperAdmin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Platform(PlatformRole),
    Console(ConsoleRole),
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Track {
    Platform,
    Console,
}

impl Role {
    fn track(&self) -> Option<Track> {
        match self {
            Role::Platform(_) => Some(Track::Platform),
            Role::Console(_) => Some(Track::Console),
            Role::Unknown => None,
        }
    }
}

/// Privilege level of a role within its track. `Unknown` is always 0.
pub fn level(role: Role) -> u8 {
    match role {
        Role::Unknown => 0,
        Role::Platform(PlatformRole::User) => 1,
        Role::Platform(PlatformRole::Support) => 2,
        Role::Platform(PlatformRole::Admin) => 3,
        Role::Platform(PlatformRole::SuperAdmin) => 4,
        Role::Console(ConsoleRole::Moderator) => 1,
        Role::Console(ConsoleRole::Admin) => 2,
        Role::Console(ConsoleRole::SuperAdmin) => 3,
    }
}

/// Whether `actual` meets the `required` role.
///
/// Roles on different tracks never satisfy each other. `Unknown` carries no
/// track, so it compares purely by level: it fails every real requirement
/// and trivially satisfies itself.
pub fn satisfies(actual: Role, required: Role) -> bool {
    match (actual.track(), required.track()) {
        (Some(a), Some(r)) if a != r => false,
        _ => level(actual) >= level(required),
    }
}

/// Union over alternatives: admitted if any acceptable role is met. An
/// `Unknown` alternative is never met, not even by an `Unknown` caller.
pub fn satisfies_any(actual: Role, acceptable: &[Role]) -> bool {
    acceptable
        .iter()
        .filter(|required| **required != Role::Unknown)
        .any(|required| satisfies(actual, *required))
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Platform(PlatformRole::User) => "USER",
            Role::Platform(PlatformRole::Support) => "SUPPORT",
            Role::Platform(PlatformRole::Admin) => "ADMIN",
            Role::Platform(PlatformRole::SuperAdmin) => "SUPER_ADMIN",
            Role::Console(ConsoleRole::Moderator) => "admin:MODERATOR",
            Role::Console(ConsoleRole::Admin) => "admin:ADMIN",
            Role::Console(ConsoleRole::SuperAdmin) => "admin:SUPER_ADMIN",
            Role::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

impl FromStr for Role {
    type Err = std::convert::Infallible;

    /// Never fails: anything unrecognised becomes `Role::Unknown`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let role = match s.strip_prefix(CONSOLE_PREFIX) {
            Some(console) => match console.to_ascii_uppercase().as_str() {
                "MODERATOR" => Role::Console(ConsoleRole::Moderator),
                "ADMIN" => Role::Console(ConsoleRole::Admin),
                "SUPER_ADMIN" => Role::Console(ConsoleRole::SuperAdmin),
                _ => Role::Unknown,
            },
            None => match s.to_ascii_uppercase().as_str() {
                "USER" => Role::Platform(PlatformRole::User),
                "SUPPORT" => Role::Platform(PlatformRole::Support),
                "ADMIN" => Role::Platform(PlatformRole::Admin),
                "SUPER_ADMIN" => Role::Platform(PlatformRole::SuperAdmin),
                _ => Role::Unknown,
            },
        };
        Ok(role)
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or(Role::Unknown))
    }
}
