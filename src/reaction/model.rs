use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Kind of reaction a user can leave on a post or comment
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReactionType {
    Like,
    Love,
    Laugh,
}

impl ReactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionType::Like => "like",
            ReactionType::Love => "love",
            ReactionType::Laugh => "laugh",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Reaction {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub target_id: ObjectId,
    #[serde(rename = "type")]
    pub reaction_type: ReactionType,
    pub user_id: ObjectId,
    pub user_name: Option<String>,
}

/// What a toggle did to the viewer's reaction on a target
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToggleOutcome {
    Added,
    Changed,
    Removed,
}

#[derive(Deserialize)]
pub struct ToggleReactionRequest {
    pub target_id: String,
    #[serde(rename = "type")]
    pub reaction_type: ReactionType,
}
