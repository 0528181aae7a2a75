use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::reaction::model::Reaction;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub post_id: ObjectId,
    pub author_id: ObjectId,
    pub author_name: Option<String>,
    pub author_avatar: Option<String>,
    /// HTML produced by the rich-text editor
    pub content: String,
    /// `None` for top-level comments
    #[serde(default)]
    pub parent_id: Option<ObjectId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A comment placed in its reply tree, with reactions merged in
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub reactions: Vec<Reaction>,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    pub fn id(&self) -> ObjectId {
        self.comment.id
    }
}

/// One row of a thread laid out for display
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct DisplayRow {
    pub id: ObjectId,
    pub parent_id: Option<ObjectId>,
    pub depth: usize,
    /// `depth` capped at the display limit
    pub indent: usize,
    pub author_name: Option<String>,
    pub content: String,
    pub reaction_count: usize,
    pub reply_count: usize,
}

/// Fields needed to persist a new comment
#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub post_id: ObjectId,
    pub author_id: ObjectId,
    pub author_name: Option<String>,
    pub author_avatar: Option<String>,
    pub content: String,
    pub parent_id: Option<ObjectId>,
}

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub post_id: String,
    pub content: String,
    pub parent_id: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}

#[derive(Deserialize)]
pub struct ThreadQuery {
    pub max_depth: Option<usize>,
}
