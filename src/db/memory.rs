//! In-memory `Database` used by unit tests above the persistence layer.
//!
//! Only the behaviour callers depend on is modelled: generated ids, unique
//! emails, one workspace per user and idempotent tagging.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db::migrations::{MigrationReport, MigrationStatus};
use crate::db::{
    ClientRecord, ClientStore, CreateClientParams, CreateProjectParams, CreateTagParams,
    CreateTaskParams, CreateUserParams, Database, ProjectRecord, ProjectStore, TagRecord,
    TagStore, TaskRecord, TaskStore, UpdateClientParams, UpdateProjectParams, UpdateTagParams,
    UpdateTaskParams, UpdateUserParams, UserRecord, UserStore,
};
use crate::error::{DatabaseError, MigrationError};

#[derive(Default)]
struct Tables {
    users: BTreeMap<Uuid, UserRecord>,
    clients: BTreeMap<Uuid, ClientRecord>,
    projects: BTreeMap<Uuid, ProjectRecord>,
    tasks: BTreeMap<Uuid, TaskRecord>,
    tags: BTreeMap<Uuid, TagRecord>,
    project_tags: BTreeSet<(Uuid, Uuid)>,
}

#[derive(Default)]
pub struct MemoryDatabase {
    tables: Mutex<Tables>,
}

fn sorted_by_name<T>(mut rows: Vec<T>, name: impl Fn(&T) -> &str) -> Vec<T> {
    rows.sort_by(|a, b| name(a).cmp(name(b)));
    rows
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn run_migrations(&self) -> Result<MigrationReport, MigrationError> {
        Ok(MigrationReport::default())
    }

    async fn revert_migrations(&self, _all: bool) -> Result<MigrationReport, MigrationError> {
        Ok(MigrationReport::default())
    }

    async fn migration_status(&self) -> Result<MigrationStatus, MigrationError> {
        Ok(MigrationStatus::default())
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryDatabase {
    async fn create_user(&self, input: &CreateUserParams) -> Result<UserRecord, DatabaseError> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.email == input.email) {
            return Err(DatabaseError::Serialization(format!(
                "email {} already registered",
                input.email
            )));
        }
        let user = UserRecord {
            id: Uuid::new_v4(),
            name: input.name.clone(),
            email: input.email.clone(),
            profile_picture: input.profile_picture.clone(),
            workspace_id: Uuid::new_v4(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<UserRecord>, DatabaseError> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, DatabaseError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_user(
        &self,
        id: Uuid,
        input: &UpdateUserParams,
    ) -> Result<Option<UserRecord>, DatabaseError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.users.get_mut(&id).map(|user| {
            if let Some(name) = &input.name {
                user.name = name.clone();
            }
            if let Some(email) = &input.email {
                user.email = email.clone();
            }
            if let Some(picture) = &input.profile_picture {
                user.profile_picture = picture.clone();
            }
            user.clone()
        }))
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self.tables.lock().await.users.remove(&id).is_some())
    }
}

#[async_trait]
impl ClientStore for MemoryDatabase {
    async fn create_client(
        &self,
        input: &CreateClientParams,
    ) -> Result<ClientRecord, DatabaseError> {
        let client = ClientRecord {
            id: Uuid::new_v4(),
            workspace_id: Some(input.workspace_id),
            name: input.name.clone(),
            currency: input.currency.clone(),
            notes: input.notes.clone(),
            payment_method: input.payment_method.clone(),
            emails: input.emails.clone(),
            preference_channel: input.preference_channel.clone(),
        };
        self.tables
            .lock()
            .await
            .clients
            .insert(client.id, client.clone());
        Ok(client)
    }

    async fn get_client(&self, id: Uuid) -> Result<Option<ClientRecord>, DatabaseError> {
        Ok(self.tables.lock().await.clients.get(&id).cloned())
    }

    async fn list_clients(&self, workspace_id: Uuid) -> Result<Vec<ClientRecord>, DatabaseError> {
        let tables = self.tables.lock().await;
        let rows: Vec<ClientRecord> = tables
            .clients
            .values()
            .filter(|c| c.workspace_id == Some(workspace_id))
            .cloned()
            .collect();
        Ok(sorted_by_name(rows, |c| c.name.as_str()))
    }

    async fn update_client(
        &self,
        id: Uuid,
        input: &UpdateClientParams,
    ) -> Result<Option<ClientRecord>, DatabaseError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.clients.get_mut(&id).map(|client| {
            if let Some(name) = &input.name {
                client.name = name.clone();
            }
            if let Some(currency) = &input.currency {
                client.currency = currency.clone();
            }
            if let Some(notes) = &input.notes {
                client.notes = notes.clone();
            }
            if let Some(payment_method) = &input.payment_method {
                client.payment_method = payment_method.clone();
            }
            if let Some(emails) = &input.emails {
                client.emails = emails.clone();
            }
            if let Some(channel) = &input.preference_channel {
                client.preference_channel = channel.clone();
            }
            client.clone()
        }))
    }

    async fn delete_client(&self, id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self.tables.lock().await.clients.remove(&id).is_some())
    }
}

#[async_trait]
impl ProjectStore for MemoryDatabase {
    async fn create_project(
        &self,
        input: &CreateProjectParams,
    ) -> Result<ProjectRecord, DatabaseError> {
        let project = ProjectRecord {
            id: Uuid::new_v4(),
            workspace_id: Some(input.workspace_id),
            name: input.name.clone(),
            hourly_rate: input.hourly_rate,
            client_id: input.client_id,
        };
        self.tables
            .lock()
            .await
            .projects
            .insert(project.id, project.clone());
        Ok(project)
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<ProjectRecord>, DatabaseError> {
        Ok(self.tables.lock().await.projects.get(&id).cloned())
    }

    async fn list_projects(
        &self,
        workspace_id: Uuid,
    ) -> Result<Vec<ProjectRecord>, DatabaseError> {
        let tables = self.tables.lock().await;
        let rows: Vec<ProjectRecord> = tables
            .projects
            .values()
            .filter(|p| p.workspace_id == Some(workspace_id))
            .cloned()
            .collect();
        Ok(sorted_by_name(rows, |p| p.name.as_str()))
    }

    async fn list_client_projects(
        &self,
        client_id: Uuid,
    ) -> Result<Vec<ProjectRecord>, DatabaseError> {
        let tables = self.tables.lock().await;
        let rows: Vec<ProjectRecord> = tables
            .projects
            .values()
            .filter(|p| p.client_id == Some(client_id))
            .cloned()
            .collect();
        Ok(sorted_by_name(rows, |p| p.name.as_str()))
    }

    async fn update_project(
        &self,
        id: Uuid,
        input: &UpdateProjectParams,
    ) -> Result<Option<ProjectRecord>, DatabaseError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.projects.get_mut(&id).map(|project| {
            if let Some(name) = &input.name {
                project.name = name.clone();
            }
            if let Some(rate) = input.hourly_rate {
                project.hourly_rate = rate;
            }
            if let Some(client_id) = input.client_id {
                project.client_id = client_id;
            }
            project.clone()
        }))
    }

    async fn delete_project(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let mut tables = self.tables.lock().await;
        tables.project_tags.retain(|(project_id, _)| *project_id != id);
        Ok(tables.projects.remove(&id).is_some())
    }

    async fn tag_project(&self, project_id: Uuid, tag_id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self
            .tables
            .lock()
            .await
            .project_tags
            .insert((project_id, tag_id)))
    }

    async fn untag_project(
        &self,
        project_id: Uuid,
        tag_id: Uuid,
    ) -> Result<bool, DatabaseError> {
        Ok(self
            .tables
            .lock()
            .await
            .project_tags
            .remove(&(project_id, tag_id)))
    }

    async fn list_project_tags(&self, project_id: Uuid) -> Result<Vec<TagRecord>, DatabaseError> {
        let tables = self.tables.lock().await;
        let rows: Vec<TagRecord> = tables
            .project_tags
            .iter()
            .filter(|(project, _)| *project == project_id)
            .filter_map(|(_, tag)| tables.tags.get(tag).cloned())
            .collect();
        Ok(sorted_by_name(rows, |t| t.name.as_str()))
    }
}

#[async_trait]
impl TaskStore for MemoryDatabase {
    async fn create_task(&self, input: &CreateTaskParams) -> Result<TaskRecord, DatabaseError> {
        let task = TaskRecord {
            id: Uuid::new_v4(),
            workspace_id: Some(input.workspace_id),
            name: input.name.clone(),
            is_billable: input.is_billable,
            project_id: input.project_id,
        };
        self.tables.lock().await.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<TaskRecord>, DatabaseError> {
        Ok(self.tables.lock().await.tasks.get(&id).cloned())
    }

    async fn list_project_tasks(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<TaskRecord>, DatabaseError> {
        let tables = self.tables.lock().await;
        let rows: Vec<TaskRecord> = tables
            .tasks
            .values()
            .filter(|t| t.project_id == Some(project_id))
            .cloned()
            .collect();
        Ok(sorted_by_name(rows, |t| t.name.as_str()))
    }

    async fn update_task(
        &self,
        id: Uuid,
        input: &UpdateTaskParams,
    ) -> Result<Option<TaskRecord>, DatabaseError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.tasks.get_mut(&id).map(|task| {
            if let Some(name) = &input.name {
                task.name = name.clone();
            }
            if let Some(billable) = input.is_billable {
                task.is_billable = billable;
            }
            if let Some(project_id) = input.project_id {
                task.project_id = project_id;
            }
            task.clone()
        }))
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self.tables.lock().await.tasks.remove(&id).is_some())
    }
}

#[async_trait]
impl TagStore for MemoryDatabase {
    async fn create_tag(&self, input: &CreateTagParams) -> Result<TagRecord, DatabaseError> {
        let tag = TagRecord {
            id: Uuid::new_v4(),
            workspace_id: Some(input.workspace_id),
            name: input.name.clone(),
            color: input.color.clone(),
        };
        self.tables.lock().await.tags.insert(tag.id, tag.clone());
        Ok(tag)
    }

    async fn get_tag(&self, id: Uuid) -> Result<Option<TagRecord>, DatabaseError> {
        Ok(self.tables.lock().await.tags.get(&id).cloned())
    }

    async fn list_tags(&self, workspace_id: Uuid) -> Result<Vec<TagRecord>, DatabaseError> {
        let tables = self.tables.lock().await;
        let rows: Vec<TagRecord> = tables
            .tags
            .values()
            .filter(|t| t.workspace_id == Some(workspace_id))
            .cloned()
            .collect();
        Ok(sorted_by_name(rows, |t| t.name.as_str()))
    }

    async fn update_tag(
        &self,
        id: Uuid,
        input: &UpdateTagParams,
    ) -> Result<Option<TagRecord>, DatabaseError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.tags.get_mut(&id).map(|tag| {
            if let Some(name) = &input.name {
                tag.name = name.clone();
            }
            if let Some(color) = &input.color {
                tag.color = color.clone();
            }
            tag.clone()
        }))
    }

    async fn delete_tag(&self, id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self.tables.lock().await.tags.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn client_params(workspace_id: Uuid) -> CreateClientParams {
        CreateClientParams {
            workspace_id,
            name: "Acme".to_string(),
            currency: "USD".to_string(),
            notes: String::new(),
            payment_method: "card".to_string(),
            emails: vec!["billing@acme.test".to_string()],
            preference_channel: "email".to_string(),
        }
    }

    #[tokio::test]
    async fn update_client_applies_every_field() {
        let db = MemoryDatabase::default();
        let client = db.create_client(&client_params(Uuid::new_v4())).await.unwrap();

        let updated = db
            .update_client(
                client.id,
                &UpdateClientParams {
                    name: Some("Acme Ltd".to_string()),
                    currency: Some("EUR".to_string()),
                    notes: Some("net 30".to_string()),
                    payment_method: Some("wire".to_string()),
                    emails: Some(vec!["ap@acme.test".to_string()]),
                    preference_channel: Some("phone".to_string()),
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            updated,
            ClientRecord {
                id: client.id,
                workspace_id: client.workspace_id,
                name: "Acme Ltd".to_string(),
                currency: "EUR".to_string(),
                notes: "net 30".to_string(),
                payment_method: "wire".to_string(),
                emails: vec!["ap@acme.test".to_string()],
                preference_channel: "phone".to_string(),
            }
        );
        assert_eq!(db.get_client(client.id).await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn update_client_keeps_unset_fields() {
        let db = MemoryDatabase::default();
        let client = db.create_client(&client_params(Uuid::new_v4())).await.unwrap();

        let updated = db
            .update_client(
                client.id,
                &UpdateClientParams {
                    notes: Some("vip".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.notes, "vip");
        assert_eq!(updated.currency, "USD");
        assert_eq!(updated.preference_channel, "email");
        assert!(db.update_client(Uuid::new_v4(), &UpdateClientParams::default()).await.unwrap().is_none());
    }
}
