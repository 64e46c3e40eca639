use crate::{
    auth::AuthSession,
    error::AppError,
    models::{CreateTaskRequest, Task, TaskFilter, TaskListQuery, UpdateTaskRequest},
};
use actix_web::{delete, get, patch, post, web, HttpResponse, Responder};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

const TASK_COLUMNS: &str = "id, description, completed, owner_id, created_at, updated_at";

/// Retrieves the authenticated user's tasks.
///
/// Supports filtering by completion state, a single-key sort, and pagination.
/// The listing is always scoped to the authenticated owner; no parameter
/// combination reaches another user's tasks.
///
/// ## Query Parameters:
/// - `completed` (optional): literal `true` or `false`.
/// - `sortBy` (optional): `field:direction`, field one of `description`,
///   `completed`, `createdAt`, `updatedAt`; direction `asc` or `desc`.
/// - `skip`, `limit` (optional): non-negative pagination offset and page size.
///
/// ## Responses:
/// - `200 OK`: JSON array of `Task` objects.
/// - `400 Bad Request`: a parameter outside the grammar above.
/// - `401 Unauthorized`: missing or invalid authentication.
#[get("")]
pub async fn list_tasks(
    pool: web::Data<PgPool>,
    query_params: web::Query<TaskListQuery>,
    session: AuthSession,
) -> Result<impl Responder, AppError> {
    let filter = TaskFilter::from_query(&query_params)?;

    // Base query scoped to the owner; filter/sort/pagination clauses are
    // appended from the validated filter.
    let mut sql = format!("SELECT {} FROM tasks WHERE owner_id = $1", TASK_COLUMNS);
    let mut param_count = 2;

    if filter.completed.is_some() {
        sql.push_str(&format!(" AND completed = ${}", param_count));
        param_count += 1;
    }
    if let Some((field, direction)) = &filter.sort {
        // Identifiers come from a fixed whitelist, never from the raw query.
        sql.push_str(&format!(" ORDER BY {} {}", field.column(), direction.keyword()));
    }
    if filter.limit.is_some() {
        sql.push_str(&format!(" LIMIT ${}", param_count));
        param_count += 1;
    }
    if filter.skip.is_some() {
        sql.push_str(&format!(" OFFSET ${}", param_count));
    }

    let mut query_builder = sqlx::query_as::<_, Task>(&sql);

    query_builder = query_builder.bind(session.user_id);
    if let Some(completed) = filter.completed {
        query_builder = query_builder.bind(completed);
    }
    if let Some(limit) = filter.limit {
        query_builder = query_builder.bind(limit);
    }
    if let Some(skip) = filter.skip {
        query_builder = query_builder.bind(skip);
    }

    let tasks = query_builder.fetch_all(&**pool).await?;

    Ok(HttpResponse::Ok().json(tasks))
}

/// Creates a new task owned by the authenticated user.
///
/// The owner is always the authenticated user, regardless of anything the
/// client put in the body.
///
/// ## Responses:
/// - `201 Created`: the new `Task`.
/// - `400 Bad Request`: missing/empty description or non-boolean `completed`.
/// - `401 Unauthorized`: missing or invalid authentication.
#[post("")]
pub async fn create_task(
    pool: web::Data<PgPool>,
    task_data: web::Json<CreateTaskRequest>,
    session: AuthSession,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;

    let task = sqlx::query_as::<_, Task>(&format!(
        "INSERT INTO tasks (id, description, completed, owner_id) VALUES ($1, $2, $3, $4) RETURNING {}",
        TASK_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(&task_data.description)
    .bind(task_data.completed.unwrap_or(false))
    .bind(session.user_id)
    .fetch_one(&**pool)
    .await?;

    Ok(HttpResponse::Created().json(task))
}

/// Retrieves a single task by id.
///
/// A task owned by someone else and a task that does not exist are
/// indistinguishable: both are 404.
#[get("/{id}")]
pub async fn get_task(
    pool: web::Data<PgPool>,
    task_id: web::Path<Uuid>,
    session: AuthSession,
) -> Result<impl Responder, AppError> {
    let task = sqlx::query_as::<_, Task>(&format!(
        "SELECT {} FROM tasks WHERE id = $1",
        TASK_COLUMNS
    ))
    .bind(task_id.into_inner())
    .fetch_optional(&**pool)
    .await?;

    match task {
        Some(task) if task.owned_by(session.user_id) => Ok(HttpResponse::Ok().json(task)),
        _ => Err(AppError::NotFound("Task not found".into())),
    }
}

/// Updates a task's description and/or completion state.
///
/// Any other field in the body is a validation failure; absence of the task
/// and failed ownership both yield 404.
#[patch("/{id}")]
pub async fn update_task(
    pool: web::Data<PgPool>,
    task_id: web::Path<Uuid>,
    task_data: web::Json<UpdateTaskRequest>,
    session: AuthSession,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;
    let task_uuid = task_id.into_inner();

    let mut sets: Vec<String> = Vec::new();
    let mut param_count = 1;

    if matches!(&task_data.description, Some(Some(_))) {
        sets.push(format!("description = ${}", param_count));
        param_count += 1;
    }
    if matches!(&task_data.completed, Some(Some(_))) {
        sets.push(format!("completed = ${}", param_count));
        param_count += 1;
    }
    sets.push("updated_at = now()".to_string());

    let sql = format!(
        "UPDATE tasks SET {} WHERE id = ${} AND owner_id = ${} RETURNING {}",
        sets.join(", "),
        param_count,
        param_count + 1,
        TASK_COLUMNS
    );

    let mut query_builder = sqlx::query_as::<_, Task>(&sql);
    if let Some(Some(description)) = &task_data.description {
        query_builder = query_builder.bind(description);
    }
    if let Some(Some(completed)) = task_data.completed {
        query_builder = query_builder.bind(completed);
    }

    let task = query_builder
        .bind(task_uuid)
        .bind(session.user_id)
        .fetch_optional(&**pool)
        .await?;

    match task {
        Some(task) => Ok(HttpResponse::Ok().json(task)),
        None => Err(AppError::NotFound("Task not found".into())),
    }
}

/// Deletes a task and returns it.
///
/// Scoped to the owner: deleting someone else's task reports 404 and leaves
/// it untouched.
#[delete("/{id}")]
pub async fn delete_task(
    pool: web::Data<PgPool>,
    task_id: web::Path<Uuid>,
    session: AuthSession,
) -> Result<impl Responder, AppError> {
    let task = sqlx::query_as::<_, Task>(&format!(
        "DELETE FROM tasks WHERE id = $1 AND owner_id = $2 RETURNING {}",
        TASK_COLUMNS
    ))
    .bind(task_id.into_inner())
    .bind(session.user_id)
    .fetch_optional(&**pool)
    .await?;

    match task {
        Some(task) => Ok(HttpResponse::Ok().json(task)),
        None => Err(AppError::NotFound("Task not found".into())),
    }
}
