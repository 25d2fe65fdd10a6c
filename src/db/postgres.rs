//! PostgreSQL backend for the Database trait.
//!
//! Every pooled connection starts with the configured search path. Select
//! lists come from the table definitions in `db::schema`, so the columns read
//! here are exactly the declared entity shape.

use async_trait::async_trait;
use deadpool_postgres::{ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use secrecy::ExposeSecret;
use tokio_postgres::NoTls;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::db::migrations::{MigrationReport, MigrationRunner, MigrationStatus};
use crate::db::schema::{self, TableDef};
use crate::db::{
    ClientRecord, ClientStore, CreateClientParams, CreateProjectParams, CreateTagParams,
    CreateTaskParams, CreateUserParams, Database, ProjectRecord, ProjectStore, TagRecord,
    TagStore, TaskRecord, TaskStore, UpdateClientParams, UpdateProjectParams, UpdateTagParams,
    UpdateTaskParams, UpdateUserParams, UserRecord, UserStore,
};
use crate::error::{DatabaseError, MigrationError};

/// PostgreSQL database backend.
pub struct PgBackend {
    pool: Pool,
}

impl PgBackend {
    /// Create a pool from configuration. Connections are opened lazily.
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let mut cfg = deadpool_postgres::Config::new();
        cfg.host = Some(config.host.clone());
        cfg.port = Some(config.port);
        cfg.user = Some(config.user.clone());
        cfg.password = Some(config.password.expose_secret().to_string());
        cfg.dbname = Some(config.name.clone());
        cfg.options = Some(config.connection_options());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig::new(config.pool_size));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| DatabaseError::Pool(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Get a clone of the connection pool.
    pub fn pool(&self) -> Pool {
        self.pool.clone()
    }

    async fn conn(&self) -> Result<deadpool_postgres::Object, DatabaseError> {
        Ok(self.pool.get().await?)
    }
}

fn select_from(table: &TableDef) -> String {
    format!(
        "SELECT {} FROM {}",
        table.column_list(),
        table.qualified_name()
    )
}

fn row_to_user_record(row: &tokio_postgres::Row) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        profile_picture: row.get("profile_picture"),
        workspace_id: row.get("workspace_id"),
    }
}

fn row_to_client_record(row: &tokio_postgres::Row) -> ClientRecord {
    ClientRecord {
        id: row.get("id"),
        workspace_id: row.get("workspace_id"),
        name: row.get("name"),
        currency: row.get("currency"),
        notes: row.get("notes"),
        payment_method: row.get("payment_method"),
        emails: row.get("emails"),
        preference_channel: row.get("preference_channel"),
    }
}

fn row_to_project_record(row: &tokio_postgres::Row) -> ProjectRecord {
    ProjectRecord {
        id: row.get("id"),
        workspace_id: row.get("workspace_id"),
        name: row.get("name"),
        hourly_rate: row.get("hourly_rate"),
        client_id: row.get("client_id"),
    }
}

fn row_to_task_record(row: &tokio_postgres::Row) -> TaskRecord {
    TaskRecord {
        id: row.get("id"),
        workspace_id: row.get("workspace_id"),
        name: row.get("name"),
        is_billable: row.get("is_billable"),
        project_id: row.get("project_id"),
    }
}

fn row_to_tag_record(row: &tokio_postgres::Row) -> TagRecord {
    TagRecord {
        id: row.get("id"),
        workspace_id: row.get("workspace_id"),
        name: row.get("name"),
        color: row.get("color"),
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), DatabaseError> {
    if value.trim().is_empty() {
        return Err(DatabaseError::Serialization(format!(
            "{field} cannot be empty"
        )));
    }
    Ok(())
}

// ==================== Database (supertrait) ====================

#[async_trait]
impl Database for PgBackend {
    async fn run_migrations(&self) -> Result<MigrationReport, MigrationError> {
        let runner = MigrationRunner::builtin()?;
        let conn = self.pool.get().await?;
        let client: &tokio_postgres::Client = &conn;
        runner.run(client).await
    }

    async fn revert_migrations(&self, all: bool) -> Result<MigrationReport, MigrationError> {
        let runner = MigrationRunner::builtin()?;
        let conn = self.pool.get().await?;
        let client: &tokio_postgres::Client = &conn;
        if all {
            runner.revert_all(client).await
        } else {
            runner.revert_last(client).await
        }
    }

    async fn migration_status(&self) -> Result<MigrationStatus, MigrationError> {
        let runner = MigrationRunner::builtin()?;
        let conn = self.pool.get().await?;
        let client: &tokio_postgres::Client = &conn;
        runner.status(client).await
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        let conn = self.conn().await?;
        conn.query_one("SELECT 1", &[]).await?;
        Ok(())
    }
}

// ==================== UserStore ====================

#[async_trait]
impl UserStore for PgBackend {
    async fn create_user(&self, input: &CreateUserParams) -> Result<UserRecord, DatabaseError> {
        require_non_empty("user name", &input.name)?;
        require_non_empty("user email", &input.email)?;

        let conn = self.conn().await?;
        let row = conn
            .query_one(
                &format!(
                    "INSERT INTO {} (\"name\", \"email\", \"profile_picture\") \
                     VALUES ($1, $2, $3) \
                     RETURNING {}",
                    schema::USER.qualified_name(),
                    schema::USER.column_list()
                ),
                &[
                    &input.name.trim(),
                    &input.email.trim(),
                    &input.profile_picture,
                ],
            )
            .await?;
        Ok(row_to_user_record(&row))
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<UserRecord>, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                &format!("{} WHERE \"id\" = $1", select_from(&schema::USER)),
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(row_to_user_record))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                &format!("{} WHERE \"email\" = $1", select_from(&schema::USER)),
                &[&email.trim()],
            )
            .await?;
        Ok(row.as_ref().map(row_to_user_record))
    }

    async fn update_user(
        &self,
        id: Uuid,
        input: &UpdateUserParams,
    ) -> Result<Option<UserRecord>, DatabaseError> {
        let Some(existing) = self.get_user(id).await? else {
            return Ok(None);
        };

        let merged_name = input.name.clone().unwrap_or(existing.name);
        let merged_email = input.email.clone().unwrap_or(existing.email);
        let merged_picture = input
            .profile_picture
            .clone()
            .unwrap_or(existing.profile_picture);
        require_non_empty("user name", &merged_name)?;
        require_non_empty("user email", &merged_email)?;

        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                &format!(
                    "UPDATE {} SET \"name\" = $2, \"email\" = $3, \"profile_picture\" = $4 \
                     WHERE \"id\" = $1 \
                     RETURNING {}",
                    schema::USER.qualified_name(),
                    schema::USER.column_list()
                ),
                &[
                    &id,
                    &merged_name.trim(),
                    &merged_email.trim(),
                    &merged_picture,
                ],
            )
            .await?;
        Ok(row.as_ref().map(row_to_user_record))
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let conn = self.conn().await?;
        let deleted = conn
            .execute(
                &format!(
                    "DELETE FROM {} WHERE \"id\" = $1",
                    schema::USER.qualified_name()
                ),
                &[&id],
            )
            .await?;
        Ok(deleted > 0)
    }
}

// ==================== ClientStore ====================

#[async_trait]
impl ClientStore for PgBackend {
    async fn create_client(
        &self,
        input: &CreateClientParams,
    ) -> Result<ClientRecord, DatabaseError> {
        require_non_empty("client name", &input.name)?;

        let conn = self.conn().await?;
        let row = conn
            .query_one(
                &format!(
                    "INSERT INTO {} \
                     (\"workspace_id\", \"name\", \"currency\", \"notes\", \"payment_method\", \
                      \"emails\", \"preference_channel\") \
                     VALUES ($1, $2, $3, $4, $5, $6, $7) \
                     RETURNING {}",
                    schema::CLIENT.qualified_name(),
                    schema::CLIENT.column_list()
                ),
                &[
                    &input.workspace_id,
                    &input.name.trim(),
                    &input.currency,
                    &input.notes,
                    &input.payment_method,
                    &input.emails,
                    &input.preference_channel,
                ],
            )
            .await?;
        Ok(row_to_client_record(&row))
    }

    async fn get_client(&self, id: Uuid) -> Result<Option<ClientRecord>, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                &format!("{} WHERE \"id\" = $1", select_from(&schema::CLIENT)),
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(row_to_client_record))
    }

    async fn list_clients(&self, workspace_id: Uuid) -> Result<Vec<ClientRecord>, DatabaseError> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                &format!(
                    "{} WHERE \"workspace_id\" = $1 ORDER BY \"name\" ASC",
                    select_from(&schema::CLIENT)
                ),
                &[&workspace_id],
            )
            .await?;
        Ok(rows.iter().map(row_to_client_record).collect())
    }

    async fn update_client(
        &self,
        id: Uuid,
        input: &UpdateClientParams,
    ) -> Result<Option<ClientRecord>, DatabaseError> {
        let Some(existing) = self.get_client(id).await? else {
            return Ok(None);
        };

        let merged_name = input.name.clone().unwrap_or(existing.name);
        require_non_empty("client name", &merged_name)?;
        let merged_currency = input.currency.clone().unwrap_or(existing.currency);
        let merged_notes = input.notes.clone().unwrap_or(existing.notes);
        let merged_payment = input
            .payment_method
            .clone()
            .unwrap_or(existing.payment_method);
        let merged_emails = input.emails.clone().unwrap_or(existing.emails);
        let merged_channel = input
            .preference_channel
            .clone()
            .unwrap_or(existing.preference_channel);

        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                &format!(
                    "UPDATE {} SET \
                        \"name\" = $2, \
                        \"currency\" = $3, \
                        \"notes\" = $4, \
                        \"payment_method\" = $5, \
                        \"emails\" = $6, \
                        \"preference_channel\" = $7 \
                     WHERE \"id\" = $1 \
                     RETURNING {}",
                    schema::CLIENT.qualified_name(),
                    schema::CLIENT.column_list()
                ),
                &[
                    &id,
                    &merged_name.trim(),
                    &merged_currency,
                    &merged_notes,
                    &merged_payment,
                    &merged_emails,
                    &merged_channel,
                ],
            )
            .await?;
        Ok(row.as_ref().map(row_to_client_record))
    }

    async fn delete_client(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let conn = self.conn().await?;
        let deleted = conn
            .execute(
                &format!(
                    "DELETE FROM {} WHERE \"id\" = $1",
                    schema::CLIENT.qualified_name()
                ),
                &[&id],
            )
            .await?;
        Ok(deleted > 0)
    }
}

// ==================== ProjectStore ====================

#[async_trait]
impl ProjectStore for PgBackend {
    async fn create_project(
        &self,
        input: &CreateProjectParams,
    ) -> Result<ProjectRecord, DatabaseError> {
        require_non_empty("project name", &input.name)?;

        let conn = self.conn().await?;
        let row = conn
            .query_one(
                &format!(
                    "INSERT INTO {} (\"workspace_id\", \"client_id\", \"name\", \"hourly_rate\") \
                     VALUES ($1, $2, $3, $4) \
                     RETURNING {}",
                    schema::PROJECT.qualified_name(),
                    schema::PROJECT.column_list()
                ),
                &[
                    &input.workspace_id,
                    &input.client_id,
                    &input.name.trim(),
                    &input.hourly_rate,
                ],
            )
            .await?;
        Ok(row_to_project_record(&row))
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<ProjectRecord>, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                &format!("{} WHERE \"id\" = $1", select_from(&schema::PROJECT)),
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(row_to_project_record))
    }

    async fn list_projects(
        &self,
        workspace_id: Uuid,
    ) -> Result<Vec<ProjectRecord>, DatabaseError> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                &format!(
                    "{} WHERE \"workspace_id\" = $1 ORDER BY \"name\" ASC",
                    select_from(&schema::PROJECT)
                ),
                &[&workspace_id],
            )
            .await?;
        Ok(rows.iter().map(row_to_project_record).collect())
    }

    async fn list_client_projects(
        &self,
        client_id: Uuid,
    ) -> Result<Vec<ProjectRecord>, DatabaseError> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                &format!(
                    "{} WHERE \"client_id\" = $1 ORDER BY \"name\" ASC",
                    select_from(&schema::PROJECT)
                ),
                &[&client_id],
            )
            .await?;
        Ok(rows.iter().map(row_to_project_record).collect())
    }

    async fn update_project(
        &self,
        id: Uuid,
        input: &UpdateProjectParams,
    ) -> Result<Option<ProjectRecord>, DatabaseError> {
        let Some(existing) = self.get_project(id).await? else {
            return Ok(None);
        };

        let merged_name = input.name.clone().unwrap_or(existing.name);
        require_non_empty("project name", &merged_name)?;
        let merged_rate = input.hourly_rate.unwrap_or(existing.hourly_rate);
        let merged_client = input.client_id.unwrap_or(existing.client_id);

        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                &format!(
                    "UPDATE {} SET \"name\" = $2, \"hourly_rate\" = $3, \"client_id\" = $4 \
                     WHERE \"id\" = $1 \
                     RETURNING {}",
                    schema::PROJECT.qualified_name(),
                    schema::PROJECT.column_list()
                ),
                &[&id, &merged_name.trim(), &merged_rate, &merged_client],
            )
            .await?;
        Ok(row.as_ref().map(row_to_project_record))
    }

    async fn delete_project(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let conn = self.conn().await?;
        let deleted = conn
            .execute(
                &format!(
                    "DELETE FROM {} WHERE \"id\" = $1",
                    schema::PROJECT.qualified_name()
                ),
                &[&id],
            )
            .await?;
        Ok(deleted > 0)
    }

    async fn tag_project(&self, project_id: Uuid, tag_id: Uuid) -> Result<bool, DatabaseError> {
        let conn = self.conn().await?;
        let inserted = conn
            .execute(
                &format!(
                    "INSERT INTO {} (\"project_id\", \"tag_id\") VALUES ($1, $2) \
                     ON CONFLICT DO NOTHING",
                    schema::PROJECT_TAG.qualified_name()
                ),
                &[&project_id, &tag_id],
            )
            .await?;
        Ok(inserted > 0)
    }

    async fn untag_project(
        &self,
        project_id: Uuid,
        tag_id: Uuid,
    ) -> Result<bool, DatabaseError> {
        let conn = self.conn().await?;
        let deleted = conn
            .execute(
                &format!(
                    "DELETE FROM {} WHERE \"project_id\" = $1 AND \"tag_id\" = $2",
                    schema::PROJECT_TAG.qualified_name()
                ),
                &[&project_id, &tag_id],
            )
            .await?;
        Ok(deleted > 0)
    }

    async fn list_project_tags(&self, project_id: Uuid) -> Result<Vec<TagRecord>, DatabaseError> {
        let conn = self.conn().await?;
        // tag and project_tag share no column names, so the tag list needs no alias.
        let rows = conn
            .query(
                &format!(
                    "{} JOIN {} ON \"tag_id\" = \"id\" \
                     WHERE \"project_id\" = $1 ORDER BY \"name\" ASC",
                    select_from(&schema::TAG),
                    schema::PROJECT_TAG.qualified_name()
                ),
                &[&project_id],
            )
            .await?;
        Ok(rows.iter().map(row_to_tag_record).collect())
    }
}

// ==================== TaskStore ====================

#[async_trait]
impl TaskStore for PgBackend {
    async fn create_task(&self, input: &CreateTaskParams) -> Result<TaskRecord, DatabaseError> {
        require_non_empty("task name", &input.name)?;

        let conn = self.conn().await?;
        let row = conn
            .query_one(
                &format!(
                    "INSERT INTO {} (\"workspace_id\", \"project_id\", \"name\", \"is_billable\") \
                     VALUES ($1, $2, $3, $4) \
                     RETURNING {}",
                    schema::TASK.qualified_name(),
                    schema::TASK.column_list()
                ),
                &[
                    &input.workspace_id,
                    &input.project_id,
                    &input.name.trim(),
                    &input.is_billable,
                ],
            )
            .await?;
        Ok(row_to_task_record(&row))
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<TaskRecord>, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                &format!("{} WHERE \"id\" = $1", select_from(&schema::TASK)),
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(row_to_task_record))
    }

    async fn list_project_tasks(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<TaskRecord>, DatabaseError> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                &format!(
                    "{} WHERE \"project_id\" = $1 ORDER BY \"name\" ASC",
                    select_from(&schema::TASK)
                ),
                &[&project_id],
            )
            .await?;
        Ok(rows.iter().map(row_to_task_record).collect())
    }

    async fn update_task(
        &self,
        id: Uuid,
        input: &UpdateTaskParams,
    ) -> Result<Option<TaskRecord>, DatabaseError> {
        let Some(existing) = self.get_task(id).await? else {
            return Ok(None);
        };

        let merged_name = input.name.clone().unwrap_or(existing.name);
        require_non_empty("task name", &merged_name)?;
        let merged_billable = input.is_billable.unwrap_or(existing.is_billable);
        let merged_project = input.project_id.unwrap_or(existing.project_id);

        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                &format!(
                    "UPDATE {} SET \"name\" = $2, \"is_billable\" = $3, \"project_id\" = $4 \
                     WHERE \"id\" = $1 \
                     RETURNING {}",
                    schema::TASK.qualified_name(),
                    schema::TASK.column_list()
                ),
                &[&id, &merged_name.trim(), &merged_billable, &merged_project],
            )
            .await?;
        Ok(row.as_ref().map(row_to_task_record))
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let conn = self.conn().await?;
        let deleted = conn
            .execute(
                &format!(
                    "DELETE FROM {} WHERE \"id\" = $1",
                    schema::TASK.qualified_name()
                ),
                &[&id],
            )
            .await?;
        Ok(deleted > 0)
    }
}

// ==================== TagStore ====================

#[async_trait]
impl TagStore for PgBackend {
    async fn create_tag(&self, input: &CreateTagParams) -> Result<TagRecord, DatabaseError> {
        require_non_empty("tag name", &input.name)?;

        let conn = self.conn().await?;
        let row = conn
            .query_one(
                &format!(
                    "INSERT INTO {} (\"workspace_id\", \"name\", \"color\") \
                     VALUES ($1, $2, $3) \
                     RETURNING {}",
                    schema::TAG.qualified_name(),
                    schema::TAG.column_list()
                ),
                &[&input.workspace_id, &input.name.trim(), &input.color],
            )
            .await?;
        Ok(row_to_tag_record(&row))
    }

    async fn get_tag(&self, id: Uuid) -> Result<Option<TagRecord>, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                &format!("{} WHERE \"id\" = $1", select_from(&schema::TAG)),
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(row_to_tag_record))
    }

    async fn list_tags(&self, workspace_id: Uuid) -> Result<Vec<TagRecord>, DatabaseError> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                &format!(
                    "{} WHERE \"workspace_id\" = $1 ORDER BY \"name\" ASC",
                    select_from(&schema::TAG)
                ),
                &[&workspace_id],
            )
            .await?;
        Ok(rows.iter().map(row_to_tag_record).collect())
    }

    async fn update_tag(
        &self,
        id: Uuid,
        input: &UpdateTagParams,
    ) -> Result<Option<TagRecord>, DatabaseError> {
        let Some(existing) = self.get_tag(id).await? else {
            return Ok(None);
        };

        let merged_name = input.name.clone().unwrap_or(existing.name);
        require_non_empty("tag name", &merged_name)?;
        let merged_color = input.color.clone().unwrap_or(existing.color);

        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                &format!(
                    "UPDATE {} SET \"name\" = $2, \"color\" = $3 \
                     WHERE \"id\" = $1 \
                     RETURNING {}",
                    schema::TAG.qualified_name(),
                    schema::TAG.column_list()
                ),
                &[&id, &merged_name.trim(), &merged_color],
            )
            .await?;
        Ok(row.as_ref().map(row_to_tag_record))
    }

    async fn delete_tag(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let conn = self.conn().await?;
        let deleted = conn
            .execute(
                &format!(
                    "DELETE FROM {} WHERE \"id\" = $1",
                    schema::TAG.qualified_name()
                ),
                &[&id],
            )
            .await?;
        Ok(deleted > 0)
    }
}
