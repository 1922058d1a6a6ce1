pub mod gate;
pub mod roles;

pub use gate::{AccessGate, Operation, Principal, RoleRequirements};
pub use roles::{satisfies, satisfies_any, ConsoleRole, PlatformRole, Role};
