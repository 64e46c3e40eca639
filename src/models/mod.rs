pub mod task;
pub mod user;

pub use task::{CreateTaskRequest, Task, TaskFilter, TaskListQuery, UpdateTaskRequest};
pub use user::{UpdateUserRequest, User};

use serde::{Deserialize, Deserializer};

/// Deserializes a field into `Option<Option<T>>` so that PATCH bodies can
/// distinguish "field absent" (outer `None`) from "field: null" (inner
/// `None`) from "field: value". Combine with `#[serde(default)]`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}
