use serde::{Deserialize, Serialize};

use crate::domains::posts::models::Post;

/// Wire representation of a post as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostData {
    pub id: i64,
    pub topic: String,
    pub keywords: String,
    pub outline: Option<serde_json::Value>,
    pub content: Option<String>,
    pub status: String,
    pub scheduled_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Post> for PostData {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            topic: post.topic,
            keywords: post.keywords,
            outline: post.outline.map(|o| o.0),
            content: post.content,
            status: post.status.to_string(),
            scheduled_at: post.scheduled_at.map(|t| t.to_rfc3339()),
            created_at: post.created_at.to_rfc3339(),
            updated_at: post.updated_at.to_rfc3339(),
        }
    }
}
