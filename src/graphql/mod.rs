//! GraphQL schema served at `/v1/graphql`.
//!
//! The schema is built once at startup. The database handle is optional:
//! without it the demo `author` query still resolves and entity resolvers
//! report that the database is unavailable.

pub mod entities;
pub mod example;

use std::sync::Arc;

use async_graphql::{EmptySubscription, MergedObject, SDLExportOptions, Schema};

use crate::db::Database;

pub use self::entities::{EntityMutation, EntityQuery};
pub use self::example::{Author, AuthorQuery, Post};

#[derive(MergedObject, Default)]
pub struct QueryRoot(AuthorQuery, EntityQuery);

pub type AppSchema = Schema<QueryRoot, EntityMutation, EmptySubscription>;

pub fn build_schema(database: Option<Arc<dyn Database>>) -> AppSchema {
    let mut builder = Schema::build(
        QueryRoot::default(),
        EntityMutation,
        EmptySubscription,
    );
    if let Some(database) = database {
        builder = builder.data(database);
    }
    builder.finish()
}

/// SDL with types and fields in alphabetical order, so exports diff cleanly.
pub fn schema_sdl(schema: &AppSchema) -> String {
    schema.sdl_with_options(
        SDLExportOptions::new()
            .sorted_fields()
            .sorted_arguments()
            .sorted_enum_items(),
    )
}
