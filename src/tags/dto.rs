use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::Tag;

#[derive(Debug, Default, Deserialize)]
pub struct CreateTagRequest {
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TagResponse {
    pub id: Uuid,
    pub name: String,
}

impl From<Tag> for TagResponse {
    fn from(t: Tag) -> Self {
        Self {
            id: t.id,
            name: t.name,
        }
    }
}
