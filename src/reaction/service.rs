use std::collections::HashMap;

use crate::reaction::model::{Reaction, ReactionType, ToggleOutcome};
use crate::reaction::optimistic::toggle_reaction;
use crate::utils::error::CustomError;
use crate::utils::model::Viewer;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};

pub struct ReactionService {
    collection: Collection<Reaction>,
}

impl ReactionService {
    pub fn new(client: &Client, database_name: &str) -> Self {
        let collection = client
            .database(database_name)
            .collection::<Reaction>("reactions");
        ReactionService { collection }
    }

    /// Unique `{target_id, user_id}` index; concurrent toggles by one user
    /// cannot both insert
    pub async fn ensure_indexes(&self) -> Result<(), CustomError> {
        self.collection
            .create_index(reaction_index())
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to create reaction index: {}", e))
            })?;
        Ok(())
    }

    /// Toggle the viewer's reaction on a target; returns the outcome and the
    /// target's reactions after the change
    pub async fn toggle(
        &self,
        target_id: ObjectId,
        viewer: &Viewer,
        reaction_type: ReactionType,
    ) -> Result<(ToggleOutcome, Vec<Reaction>), CustomError> {
        let current = self.reactions_for_target(&target_id).await?;
        let (next, outcome, write) = plan_toggle(&current, target_id, viewer, reaction_type);
        let mine = doc! { "target_id": target_id, "user_id": viewer.user_id };

        match write {
            ReactionWrite::Insert(reaction) => {
                self.collection.insert_one(reaction).await.map_err(|e| {
                    if is_duplicate_key(&e) {
                        CustomError::ConflictError(
                            "Reaction changed concurrently, try again".to_string(),
                        )
                    } else {
                        CustomError::InternalServerError(format!("Failed to add reaction: {}", e))
                    }
                })?;
            }
            ReactionWrite::SetType(reaction_type) => {
                self.collection
                    .update_one(mine, doc! { "$set": { "type": reaction_type.as_str() } })
                    .await
                    .map_err(|e| {
                        CustomError::InternalServerError(format!(
                            "Failed to change reaction: {}",
                            e
                        ))
                    })?;
            }
            ReactionWrite::Delete => {
                self.collection.delete_one(mine).await.map_err(|e| {
                    CustomError::InternalServerError(format!("Failed to remove reaction: {}", e))
                })?;
            }
        }

        Ok((outcome, next))
    }

    /// Reactions on a single target, oldest first
    pub async fn reactions_for_target(
        &self,
        target_id: &ObjectId,
    ) -> Result<Vec<Reaction>, CustomError> {
        let cursor = self
            .collection
            .find(doc! { "target_id": target_id })
            .sort(doc! { "_id": 1 })
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to fetch reactions: {}", e))
            })?;

        cursor.try_collect().await.map_err(|e| {
            CustomError::InternalServerError(format!("Failed to collect reactions: {}", e))
        })
    }

    /// Batch side-load of reactions, grouped by target id.
    /// Targets without reactions are simply absent from the map.
    pub async fn reactions_for_targets(
        &self,
        target_ids: &[ObjectId],
    ) -> Result<HashMap<ObjectId, Vec<Reaction>>, CustomError> {
        if target_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let cursor = self
            .collection
            .find(doc! { "target_id": { "$in": target_ids.to_vec() } })
            .sort(doc! { "_id": 1 })
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to fetch reactions: {}", e))
            })?;

        let reactions: Vec<Reaction> = cursor.try_collect().await.map_err(|e| {
            CustomError::InternalServerError(format!("Failed to collect reactions: {}", e))
        })?;

        Ok(group_by_target(reactions))
    }
}

/// Store write that carries out a toggle
#[derive(Debug, Clone, PartialEq)]
pub enum ReactionWrite {
    Insert(Reaction),
    SetType(ReactionType),
    Delete,
}

/// Apply the toggle rules to the stored set and derive the single write
/// needed to persist the viewer's part of it
pub fn plan_toggle(
    current: &[Reaction],
    target_id: ObjectId,
    viewer: &Viewer,
    reaction_type: ReactionType,
) -> (Vec<Reaction>, ToggleOutcome, ReactionWrite) {
    let (next, outcome) = toggle_reaction(current, target_id, viewer, reaction_type);
    let write = match (outcome, next.iter().find(|r| r.user_id == viewer.user_id)) {
        (ToggleOutcome::Added, Some(mine)) => ReactionWrite::Insert(mine.clone()),
        (ToggleOutcome::Changed, _) => ReactionWrite::SetType(reaction_type),
        _ => ReactionWrite::Delete,
    };
    (next, outcome, write)
}

pub fn reaction_index() -> IndexModel {
    IndexModel::builder()
        .keys(doc! { "target_id": 1, "user_id": 1 })
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(
        e.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == 11000
    )
}

pub fn group_by_target(reactions: Vec<Reaction>) -> HashMap<ObjectId, Vec<Reaction>> {
    let mut grouped: HashMap<ObjectId, Vec<Reaction>> = HashMap::new();
    for reaction in reactions {
        grouped.entry(reaction.target_id).or_default().push(reaction);
    }
    grouped
}
