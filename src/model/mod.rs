//! Domain records shared by the stores, the auth core and the HTTP layer.

mod identity;
mod task;

pub use identity::{Identity, Role, RoleParseError};
pub use task::{NewTask, Priority, PriorityParseError, Task, TaskChanges};
