//! Persistence layer.
//!
//! Entity records and store traits for the `core` schema. The store traits
//! are grouped under the `Database` supertrait so callers can hold a single
//! `Arc<dyn Database>`; `postgres::PgBackend` is the implementation.
//!
//! Constraint violations are returned as `DatabaseError::Query` with the
//! driver error intact. Use `DatabaseError::is_unique_violation` and
//! `DatabaseError::is_foreign_key_violation` to tell them apart.

#[cfg(test)]
pub(crate) mod memory;
pub mod migrations;
pub mod postgres;
pub mod schema;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::db::migrations::{MigrationReport, MigrationStatus};
use crate::error::{DatabaseError, MigrationError};

/// Create the Postgres backend from configuration.
///
/// Migrations are not applied here; callers run them explicitly.
pub async fn connect_from_config(
    config: &DatabaseConfig,
) -> Result<Arc<dyn Database>, DatabaseError> {
    let backend = postgres::PgBackend::new(config).await?;
    backend.health_check().await?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        database = %config.name,
        "Connected to PostgreSQL"
    );
    Ok(Arc::new(backend))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub profile_picture: Option<String>,
    pub workspace_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub name: String,
    pub email: String,
    pub profile_picture: Option<String>,
}

/// `workspace_id` is immutable and deliberately absent.
#[derive(Debug, Clone, Default)]
pub struct UpdateUserParams {
    pub name: Option<String>,
    pub email: Option<String>,
    pub profile_picture: Option<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: Uuid,
    pub workspace_id: Option<Uuid>,
    pub name: String,
    pub currency: String,
    pub notes: String,
    pub payment_method: String,
    pub emails: Vec<String>,
    pub preference_channel: String,
}

#[derive(Debug, Clone)]
pub struct CreateClientParams {
    pub workspace_id: Uuid,
    pub name: String,
    pub currency: String,
    pub notes: String,
    pub payment_method: String,
    /// Expected to be non-empty; the schema does not enforce it.
    pub emails: Vec<String>,
    pub preference_channel: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateClientParams {
    pub name: Option<String>,
    pub currency: Option<String>,
    pub notes: Option<String>,
    pub payment_method: Option<String>,
    pub emails: Option<Vec<String>>,
    pub preference_channel: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: Uuid,
    pub workspace_id: Option<Uuid>,
    pub name: String,
    pub hourly_rate: Option<f64>,
    pub client_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct CreateProjectParams {
    pub workspace_id: Uuid,
    pub client_id: Option<Uuid>,
    pub name: String,
    pub hourly_rate: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateProjectParams {
    pub name: Option<String>,
    pub hourly_rate: Option<Option<f64>>,
    pub client_id: Option<Option<Uuid>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: Uuid,
    pub workspace_id: Option<Uuid>,
    pub name: String,
    pub is_billable: bool,
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct CreateTaskParams {
    pub workspace_id: Uuid,
    pub project_id: Option<Uuid>,
    pub name: String,
    pub is_billable: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateTaskParams {
    pub name: Option<String>,
    pub is_billable: Option<bool>,
    pub project_id: Option<Option<Uuid>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRecord {
    pub id: Uuid,
    pub workspace_id: Option<Uuid>,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone)]
pub struct CreateTagParams {
    pub workspace_id: Uuid,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateTagParams {
    pub name: Option<String>,
    pub color: Option<String>,
}

/// Backend-agnostic persistence for the whole schema.
#[async_trait]
pub trait Database:
    UserStore + ClientStore + ProjectStore + TaskStore + TagStore + Send + Sync
{
    /// Apply pending migrations.
    async fn run_migrations(&self) -> Result<MigrationReport, MigrationError>;

    /// Revert the newest applied migration, or every applied one with `all`.
    async fn revert_migrations(&self, all: bool) -> Result<MigrationReport, MigrationError>;

    async fn migration_status(&self) -> Result<MigrationStatus, MigrationError>;

    /// Round-trip a trivial query.
    async fn health_check(&self) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, input: &CreateUserParams) -> Result<UserRecord, DatabaseError>;

    async fn get_user(&self, id: Uuid) -> Result<Option<UserRecord>, DatabaseError>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, DatabaseError>;

    async fn update_user(
        &self,
        id: Uuid,
        input: &UpdateUserParams,
    ) -> Result<Option<UserRecord>, DatabaseError>;

    async fn delete_user(&self, id: Uuid) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn create_client(&self, input: &CreateClientParams)
    -> Result<ClientRecord, DatabaseError>;

    async fn get_client(&self, id: Uuid) -> Result<Option<ClientRecord>, DatabaseError>;

    async fn list_clients(&self, workspace_id: Uuid) -> Result<Vec<ClientRecord>, DatabaseError>;

    async fn update_client(
        &self,
        id: Uuid,
        input: &UpdateClientParams,
    ) -> Result<Option<ClientRecord>, DatabaseError>;

    async fn delete_client(&self, id: Uuid) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn create_project(
        &self,
        input: &CreateProjectParams,
    ) -> Result<ProjectRecord, DatabaseError>;

    async fn get_project(&self, id: Uuid) -> Result<Option<ProjectRecord>, DatabaseError>;

    async fn list_projects(&self, workspace_id: Uuid)
    -> Result<Vec<ProjectRecord>, DatabaseError>;

    async fn list_client_projects(
        &self,
        client_id: Uuid,
    ) -> Result<Vec<ProjectRecord>, DatabaseError>;

    async fn update_project(
        &self,
        id: Uuid,
        input: &UpdateProjectParams,
    ) -> Result<Option<ProjectRecord>, DatabaseError>;

    /// Deletes the project; its `project_tag` rows go with it, tags stay.
    async fn delete_project(&self, id: Uuid) -> Result<bool, DatabaseError>;

    /// Links a tag to a project. Returns `false` if the link already existed.
    async fn tag_project(&self, project_id: Uuid, tag_id: Uuid) -> Result<bool, DatabaseError>;

    async fn untag_project(&self, project_id: Uuid, tag_id: Uuid)
    -> Result<bool, DatabaseError>;

    async fn list_project_tags(&self, project_id: Uuid) -> Result<Vec<TagRecord>, DatabaseError>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create_task(&self, input: &CreateTaskParams) -> Result<TaskRecord, DatabaseError>;

    async fn get_task(&self, id: Uuid) -> Result<Option<TaskRecord>, DatabaseError>;

    async fn list_project_tasks(&self, project_id: Uuid)
    -> Result<Vec<TaskRecord>, DatabaseError>;

    async fn update_task(
        &self,
        id: Uuid,
        input: &UpdateTaskParams,
    ) -> Result<Option<TaskRecord>, DatabaseError>;

    async fn delete_task(&self, id: Uuid) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait TagStore: Send + Sync {
    async fn create_tag(&self, input: &CreateTagParams) -> Result<TagRecord, DatabaseError>;

    async fn get_tag(&self, id: Uuid) -> Result<Option<TagRecord>, DatabaseError>;

    async fn list_tags(&self, workspace_id: Uuid) -> Result<Vec<TagRecord>, DatabaseError>;

    async fn update_tag(
        &self,
        id: Uuid,
        input: &UpdateTagParams,
    ) -> Result<Option<TagRecord>, DatabaseError>;

    async fn delete_tag(&self, id: Uuid) -> Result<bool, DatabaseError>;
}
