//! GraphQL surface over the `core` entities.
//!
//! Store errors are passed to the client as plain GraphQL errors.

use std::sync::Arc;

use async_graphql::{ComplexObject, Context, InputObject, Object, Result, SimpleObject};
use uuid::Uuid;

use crate::db::{
    ClientRecord, ClientStore, CreateClientParams, CreateProjectParams, CreateTagParams,
    CreateTaskParams, CreateUserParams, Database, ProjectRecord, ProjectStore, TagRecord,
    TagStore, TaskRecord, TaskStore, UserRecord, UserStore,
};

fn database<'a>(ctx: &Context<'a>) -> Result<&'a Arc<dyn Database>> {
    ctx.data_opt::<Arc<dyn Database>>()
        .ok_or_else(|| "database unavailable".into())
}

#[derive(Debug, Clone, SimpleObject)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub profile_picture: Option<String>,
    pub workspace_id: Uuid,
}

impl From<UserRecord> for User {
    fn from(r: UserRecord) -> Self {
        Self {
            id: r.id,
            name: r.name,
            email: r.email,
            profile_picture: r.profile_picture,
            workspace_id: r.workspace_id,
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(complex)]
pub struct Client {
    pub id: Uuid,
    pub workspace_id: Option<Uuid>,
    pub name: String,
    pub currency: String,
    pub notes: String,
    pub payment_method: String,
    pub emails: Vec<String>,
    pub preference_channel: String,
}

impl From<ClientRecord> for Client {
    fn from(r: ClientRecord) -> Self {
        Self {
            id: r.id,
            workspace_id: r.workspace_id,
            name: r.name,
            currency: r.currency,
            notes: r.notes,
            payment_method: r.payment_method,
            emails: r.emails,
            preference_channel: r.preference_channel,
        }
    }
}

#[ComplexObject]
impl Client {
    async fn projects(&self, ctx: &Context<'_>) -> Result<Vec<Project>> {
        let projects = database(ctx)?.list_client_projects(self.id).await?;
        Ok(projects.into_iter().map(Project::from).collect())
    }
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(complex)]
pub struct Project {
    pub id: Uuid,
    pub workspace_id: Option<Uuid>,
    pub name: String,
    pub hourly_rate: Option<f64>,
    pub client_id: Option<Uuid>,
}

impl From<ProjectRecord> for Project {
    fn from(r: ProjectRecord) -> Self {
        Self {
            id: r.id,
            workspace_id: r.workspace_id,
            name: r.name,
            hourly_rate: r.hourly_rate,
            client_id: r.client_id,
        }
    }
}

#[ComplexObject]
impl Project {
    async fn tags(&self, ctx: &Context<'_>) -> Result<Vec<Tag>> {
        let tags = database(ctx)?.list_project_tags(self.id).await?;
        Ok(tags.into_iter().map(Tag::from).collect())
    }

    async fn tasks(&self, ctx: &Context<'_>) -> Result<Vec<Task>> {
        let tasks = database(ctx)?.list_project_tasks(self.id).await?;
        Ok(tasks.into_iter().map(Task::from).collect())
    }
}

#[derive(Debug, Clone, SimpleObject)]
pub struct Task {
    pub id: Uuid,
    pub workspace_id: Option<Uuid>,
    pub name: String,
    pub is_billable: bool,
    pub project_id: Option<Uuid>,
}

impl From<TaskRecord> for Task {
    fn from(r: TaskRecord) -> Self {
        Self {
            id: r.id,
            workspace_id: r.workspace_id,
            name: r.name,
            is_billable: r.is_billable,
            project_id: r.project_id,
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
pub struct Tag {
    pub id: Uuid,
    pub workspace_id: Option<Uuid>,
    pub name: String,
    pub color: String,
}

impl From<TagRecord> for Tag {
    fn from(r: TagRecord) -> Self {
        Self {
            id: r.id,
            workspace_id: r.workspace_id,
            name: r.name,
            color: r.color,
        }
    }
}

#[derive(InputObject)]
pub struct CreateUserInput {
    pub name: String,
    pub email: String,
    pub profile_picture: Option<String>,
}

#[derive(InputObject)]
pub struct CreateClientInput {
    pub workspace_id: Uuid,
    pub name: String,
    pub currency: String,
    #[graphql(default)]
    pub notes: String,
    pub payment_method: String,
    pub emails: Vec<String>,
    pub preference_channel: String,
}

#[derive(InputObject)]
pub struct CreateProjectInput {
    pub workspace_id: Uuid,
    pub client_id: Option<Uuid>,
    pub name: String,
    pub hourly_rate: Option<f64>,
}

#[derive(InputObject)]
pub struct CreateTaskInput {
    pub workspace_id: Uuid,
    pub project_id: Option<Uuid>,
    pub name: String,
    #[graphql(default)]
    pub is_billable: bool,
}

#[derive(InputObject)]
pub struct CreateTagInput {
    pub workspace_id: Uuid,
    pub name: String,
    pub color: String,
}

#[derive(Default)]
pub struct EntityQuery;

#[Object]
impl EntityQuery {
    async fn user(&self, ctx: &Context<'_>, id: Uuid) -> Result<Option<User>> {
        Ok(database(ctx)?.get_user(id).await?.map(User::from))
    }

    async fn user_by_email(&self, ctx: &Context<'_>, email: String) -> Result<Option<User>> {
        Ok(database(ctx)?
            .get_user_by_email(&email)
            .await?
            .map(User::from))
    }

    async fn clients(&self, ctx: &Context<'_>, workspace_id: Uuid) -> Result<Vec<Client>> {
        let clients = database(ctx)?.list_clients(workspace_id).await?;
        Ok(clients.into_iter().map(Client::from).collect())
    }

    async fn projects(&self, ctx: &Context<'_>, workspace_id: Uuid) -> Result<Vec<Project>> {
        let projects = database(ctx)?.list_projects(workspace_id).await?;
        Ok(projects.into_iter().map(Project::from).collect())
    }

    async fn tasks(&self, ctx: &Context<'_>, project_id: Uuid) -> Result<Vec<Task>> {
        let tasks = database(ctx)?.list_project_tasks(project_id).await?;
        Ok(tasks.into_iter().map(Task::from).collect())
    }

    async fn tags(&self, ctx: &Context<'_>, workspace_id: Uuid) -> Result<Vec<Tag>> {
        let tags = database(ctx)?.list_tags(workspace_id).await?;
        Ok(tags.into_iter().map(Tag::from).collect())
    }

    async fn project_tags(&self, ctx: &Context<'_>, project_id: Uuid) -> Result<Vec<Tag>> {
        let tags = database(ctx)?.list_project_tags(project_id).await?;
        Ok(tags.into_iter().map(Tag::from).collect())
    }
}

#[derive(Default)]
pub struct EntityMutation;

#[Object]
impl EntityMutation {
    async fn create_user(&self, ctx: &Context<'_>, input: CreateUserInput) -> Result<User> {
        let params = CreateUserParams {
            name: input.name,
            email: input.email,
            profile_picture: input.profile_picture,
        };
        Ok(database(ctx)?.create_user(&params).await?.into())
    }

    async fn create_client(&self, ctx: &Context<'_>, input: CreateClientInput) -> Result<Client> {
        let params = CreateClientParams {
            workspace_id: input.workspace_id,
            name: input.name,
            currency: input.currency,
            notes: input.notes,
            payment_method: input.payment_method,
            emails: input.emails,
            preference_channel: input.preference_channel,
        };
        Ok(database(ctx)?.create_client(&params).await?.into())
    }

    async fn create_project(
        &self,
        ctx: &Context<'_>,
        input: CreateProjectInput,
    ) -> Result<Project> {
        let params = CreateProjectParams {
            workspace_id: input.workspace_id,
            client_id: input.client_id,
            name: input.name,
            hourly_rate: input.hourly_rate,
        };
        Ok(database(ctx)?.create_project(&params).await?.into())
    }

    async fn create_task(&self, ctx: &Context<'_>, input: CreateTaskInput) -> Result<Task> {
        let params = CreateTaskParams {
            workspace_id: input.workspace_id,
            project_id: input.project_id,
            name: input.name,
            is_billable: input.is_billable,
        };
        Ok(database(ctx)?.create_task(&params).await?.into())
    }

    async fn create_tag(&self, ctx: &Context<'_>, input: CreateTagInput) -> Result<Tag> {
        let params = CreateTagParams {
            workspace_id: input.workspace_id,
            name: input.name,
            color: input.color,
        };
        Ok(database(ctx)?.create_tag(&params).await?.into())
    }

    /// Returns false if the tag was already linked.
    async fn tag_project(
        &self,
        ctx: &Context<'_>,
        project_id: Uuid,
        tag_id: Uuid,
    ) -> Result<bool> {
        Ok(database(ctx)?.tag_project(project_id, tag_id).await?)
    }

    async fn untag_project(
        &self,
        ctx: &Context<'_>,
        project_id: Uuid,
        tag_id: Uuid,
    ) -> Result<bool> {
        Ok(database(ctx)?.untag_project(project_id, tag_id).await?)
    }

    async fn delete_project(&self, ctx: &Context<'_>, id: Uuid) -> Result<bool> {
        Ok(database(ctx)?.delete_project(id).await?)
    }
}
