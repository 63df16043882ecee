//! Role and ownership rules. Pure functions, no I/O.

use super::Principal;
use crate::model::{Identity, Role, Task};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
    Delete,
}

/// A resource with a single owning identity.
pub trait Owned {
    fn owner_id(&self) -> Uuid;
}

impl Owned for Task {
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}

/// A user record is owned by the user itself.
impl Owned for Identity {
    fn owner_id(&self) -> Uuid {
        self.id
    }
}

/// Raw decision over (acting id, acting role, owner id).
///
/// Admins are allowed everything, owners may read, write and delete their own
/// resources, everyone else is denied.
#[must_use]
pub fn decide(actor_id: Uuid, actor_role: Role, owner_id: Uuid, operation: Operation) -> Decision {
    match (actor_role, operation) {
        (Role::Admin, _) => Decision::Allow,
        (Role::User, Operation::Read | Operation::Write | Operation::Delete)
            if actor_id == owner_id =>
        {
            Decision::Allow
        }
        (Role::User, _) => Decision::Deny,
    }
}

#[must_use]
pub fn authorize<R: Owned + ?Sized>(
    principal: &Principal,
    resource: &R,
    operation: Operation,
) -> Decision {
    decide(
        principal.user_id,
        principal.role,
        resource.owner_id(),
        operation,
    )
}

/// Role assignment is reserved to admins regardless of ownership.
#[must_use]
pub fn can_assign_roles(principal: &Principal) -> Decision {
    if principal.is_admin() {
        Decision::Allow
    } else {
        Decision::Deny
    }
}
