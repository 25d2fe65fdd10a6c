//! Demo `author` query with hard-coded data.

use async_graphql::{ComplexObject, Object, SimpleObject};

#[derive(Debug, Clone, SimpleObject)]
#[graphql(complex)]
pub struct Author {
    pub id: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[ComplexObject]
impl Author {
    async fn posts(&self) -> Vec<Post> {
        vec![Post {
            id: self.id,
            title: "Post 1".to_string(),
            votes: Some(1),
        }]
    }
}

#[derive(Debug, Clone, SimpleObject)]
pub struct Post {
    pub id: i32,
    pub title: String,
    pub votes: Option<i32>,
}

#[derive(Default)]
pub struct AuthorQuery;

#[Object]
impl AuthorQuery {
    async fn author(&self, id: i32) -> Author {
        Author {
            id,
            first_name: Some("John".to_string()),
            last_name: Some("Doe".to_string()),
        }
    }
}
