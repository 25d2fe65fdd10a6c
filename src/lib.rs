//! Timestack: time-tracking backend.
//!
//! Workspace-scoped users, clients, projects, tasks and tags in PostgreSQL,
//! a shared Redis connection, and a GraphQL API served over axum.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod graphql;
pub mod integrations;
pub mod lifecycle;
pub mod server;
