//! # Roles
//!
//! Caller identity and the static role hierarchy.
//!
//! ## Hierarchy
//! ```text
//! admin ──► manager ──► supervisor ──► cashier
//!   (each role includes every role to its right)
//! ```
//!
//! The hierarchy is a total order, so it is encoded as the declaration
//! order of [`Role`] and compared with `Ord`. There is no global table
//! to mutate.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};

/// A user role. Later variants outrank earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Cashier,
    Supervisor,
    Manager,
    Admin,
}

impl Role {
    /// Every role, lowest first.
    pub const ALL: [Role; 4] = [Role::Cashier, Role::Supervisor, Role::Manager, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Cashier => "cashier",
            Role::Supervisor => "supervisor",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }

    /// Returns true if this role is `required` or any role above it.
    pub fn includes(&self, required: Role) -> bool {
        *self >= required
    }

    /// Roles this role may act on behalf of (itself and everything below).
    pub fn subordinates(&self) -> impl Iterator<Item = Role> + '_ {
        Role::ALL.into_iter().filter(move |r| r <= self)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == wanted)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "role".to_string(),
                allowed: Role::ALL.iter().map(|r| r.as_str().to_string()).collect(),
            })
    }
}

/// The identity performing a mutating call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Actor {
            id: id.into(),
            role,
        }
    }

    /// Fails with [`CoreError::Forbidden`] unless the actor holds `required`.
    pub fn require(&self, required: Role) -> CoreResult<()> {
        if self.role.includes(required) {
            Ok(())
        } else {
            Err(CoreError::Forbidden {
                required,
                actual: self.role,
            })
        }
    }
}
