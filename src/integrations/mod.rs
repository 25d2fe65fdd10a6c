//! Third-party API integrations.

pub mod github;

pub use github::{GITHUB_GRAPHQL_ENDPOINT, GithubGraphqlClient, GithubService};
