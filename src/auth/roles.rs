//! Role and permission table.
//!
//! Roles form a total order used for coarse gating:
//! `user < admin < owner < global_admin`. Each role also carries a fixed
//! permission list that handlers consult for specific actions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A named action a role may perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewKits,
    ManageKits,
    ViewClients,
    ManageClients,
    ManageExperiments,
    ManageApiKeys,
    ViewOrganizationUsers,
    ManageUsers,
    ManageRoles,
    SendDocuments,
    SendMessages,
    ManageBilling,
    ViewSystem,
}

/// A user's role. Parsed from the exact string stored on the profile row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
    Owner,
    GlobalAdmin,
}

const USER_PERMISSIONS: &[Permission] = &[
    Permission::ViewKits,
    Permission::ManageKits,
    Permission::ViewClients,
    Permission::ManageClients,
    Permission::ManageExperiments,
];

const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::ViewKits,
    Permission::ManageKits,
    Permission::ViewClients,
    Permission::ManageClients,
    Permission::ManageExperiments,
    Permission::ManageApiKeys,
    Permission::ViewOrganizationUsers,
    Permission::ManageUsers,
    Permission::ManageRoles,
    Permission::SendDocuments,
    Permission::SendMessages,
];

const OWNER_PERMISSIONS: &[Permission] = &[
    Permission::ViewKits,
    Permission::ManageKits,
    Permission::ViewClients,
    Permission::ManageClients,
    Permission::ManageExperiments,
    Permission::ManageApiKeys,
    Permission::ViewOrganizationUsers,
    Permission::ManageUsers,
    Permission::ManageRoles,
    Permission::SendDocuments,
    Permission::SendMessages,
    Permission::ManageBilling,
];

const GLOBAL_ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::ViewKits,
    Permission::ManageKits,
    Permission::ViewClients,
    Permission::ManageClients,
    Permission::ManageExperiments,
    Permission::ManageApiKeys,
    Permission::ViewOrganizationUsers,
    Permission::ManageUsers,
    Permission::ManageRoles,
    Permission::SendDocuments,
    Permission::SendMessages,
    Permission::ManageBilling,
    Permission::ViewSystem,
];

impl Role {
    pub const ALL: [Role; 4] = [Role::User, Role::Admin, Role::Owner, Role::GlobalAdmin];

    /// Privilege level; higher is more privileged.
    pub fn level(&self) -> u8 {
        match self {
            Role::User => 1,
            Role::Admin => 2,
            Role::Owner => 3,
            Role::GlobalAdmin => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Owner => "owner",
            Role::GlobalAdmin => "global_admin",
        }
    }

    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Role::User => USER_PERMISSIONS,
            Role::Admin => ADMIN_PERMISSIONS,
            Role::Owner => OWNER_PERMISSIONS,
            Role::GlobalAdmin => GLOBAL_ADMIN_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    /// True when this role is at or above `min` in the hierarchy.
    pub fn at_least(&self, min: Role) -> bool {
        self.level() >= min.level()
    }
}

impl PartialOrd for Role {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Role {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.level().cmp(&other.level())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the known role literals.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    /// Exact, case-sensitive match against the stored literals.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}
