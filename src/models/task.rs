use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::models::double_option;

/// Represents a task entity as stored in the database and returned by the API.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Task {
    /// Unique identifier for the task (UUID v4).
    pub id: Uuid,
    /// What needs doing. Never empty.
    pub description: String,
    pub completed: bool,
    /// Identifier of the owning user. Set at creation to the authenticated
    /// creator and never reassigned.
    pub owner_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn owned_by(&self, user_id: i32) -> bool {
        self.owner_id == user_id
    }
}

/// Payload for `POST /tasks`.
///
/// Unknown fields (including a client-supplied owner) are ignored; the handler
/// always stamps the authenticated user as owner.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, message = "description must not be empty"))]
    pub description: String,
    // On create, `"completed": null` counts as absent and defaults to false.
    // The PATCH payload is stricter and rejects an explicit null.
    #[serde(default)]
    pub completed: Option<bool>,
}

/// Payload for `PATCH /tasks/{id}`.
///
/// Only `description` and `completed` are mutable; anything else in the body
/// fails deserialization (400). Double `Option` so `"description": null` is
/// seen and rejected rather than treated as absent.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTaskRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub completed: Option<Option<bool>>,
}

impl UpdateTaskRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(description) = &self.description {
            match description {
                Some(description) if !description.trim().is_empty() => {}
                _ => {
                    return Err(AppError::Validation(
                        "description must be a non-empty string".into(),
                    ))
                }
            }
        }
        if let Some(None) = self.completed {
            return Err(AppError::Validation("completed must be a boolean".into()));
        }
        Ok(())
    }
}

/// Raw query parameters for `GET /tasks`, exactly as they arrive on the wire.
#[derive(Debug, Default, Deserialize)]
pub struct TaskListQuery {
    pub completed: Option<String>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// A sortable task field, named on the wire as in the data model
/// (`createdAt`, not `created_at`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Description,
    Completed,
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "description" => Some(SortField::Description),
            "completed" => Some(SortField::Completed),
            "createdAt" => Some(SortField::CreatedAt),
            "updatedAt" => Some(SortField::UpdatedAt),
            _ => None,
        }
    }

    /// The column this field sorts on. A fixed mapping, never interpolated
    /// from client input, so it is safe to splice into SQL.
    pub fn column(&self) -> &'static str {
        match self {
            SortField::Description => "description",
            SortField::Completed => "completed",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Validated store-level arguments translated from `TaskListQuery`.
///
/// The owner scope is not part of the filter; every listing is additionally
/// constrained to the authenticated user by the handler, so no combination of
/// parameters can reach another user's tasks.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TaskFilter {
    /// Equality filter on `completed`; `None` returns tasks regardless of
    /// completion state.
    pub completed: Option<bool>,
    /// Single-key sort; `None` leaves the store's natural order.
    pub sort: Option<(SortField, SortDirection)>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl TaskFilter {
    /// Translates the raw query string into typed filter/sort/pagination
    /// arguments. Literals outside the accepted grammar are rejected rather
    /// than coerced.
    pub fn from_query(query: &TaskListQuery) -> Result<Self, AppError> {
        let completed = match query.completed.as_deref() {
            None => None,
            Some("true") => Some(true),
            Some("false") => Some(false),
            Some(other) => {
                return Err(AppError::Validation(format!(
                    "completed must be \"true\" or \"false\", got {:?}",
                    other
                )))
            }
        };

        let sort = match query.sort_by.as_deref() {
            None => None,
            Some(raw) => {
                let (field, direction) = raw.split_once(':').ok_or_else(|| {
                    AppError::Validation("sortBy must have the form field:direction".into())
                })?;
                let field = SortField::parse(field).ok_or_else(|| {
                    AppError::Validation(format!("cannot sort by {:?}", field))
                })?;
                let direction = SortDirection::parse(direction).ok_or_else(|| {
                    AppError::Validation("sort direction must be asc or desc".into())
                })?;
                Some((field, direction))
            }
        };

        for (param, value) in [("skip", query.skip), ("limit", query.limit)] {
            if matches!(value, Some(v) if v < 0) {
                return Err(AppError::Validation(format!(
                    "{} must be a non-negative integer",
                    param
                )));
            }
        }

        Ok(TaskFilter {
            completed,
            sort,
            skip: query.skip,
            limit: query.limit,
        })
    }
}
