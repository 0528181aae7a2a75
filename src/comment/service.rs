use crate::comment::model::{Comment, NewComment};
use crate::utils::error::CustomError;
use crate::utils::model::Viewer;
use async_trait::async_trait;
use chrono::Utc;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, to_bson};
use mongodb::{Client, Collection};

/// Write side used by the reply composer and the create endpoint
#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn insert_comment(&self, new_comment: NewComment) -> Result<Comment, CustomError>;
}

/// A reply must point at a comment of the same post
pub fn check_parent(
    parent: Option<&Comment>,
    parent_id: ObjectId,
    post_id: &ObjectId,
) -> Result<(), CustomError> {
    match parent {
        Some(parent) if parent.post_id == *post_id => Ok(()),
        Some(_) => Err(CustomError::BadRequestError(format!(
            "Parent comment {} belongs to another post",
            parent_id
        ))),
        None => Err(CustomError::BadRequestError(format!(
            "Parent comment {} does not exist",
            parent_id
        ))),
    }
}

pub fn comment_from(new_comment: NewComment) -> Comment {
    let now = Utc::now();
    Comment {
        id: ObjectId::new(),
        post_id: new_comment.post_id,
        author_id: new_comment.author_id,
        author_name: new_comment.author_name,
        author_avatar: new_comment.author_avatar,
        content: new_comment.content,
        parent_id: new_comment.parent_id,
        created_at: now,
        updated_at: now,
    }
}

pub struct CommentService {
    collection: Collection<Comment>,
}

impl CommentService {
    pub fn new(client: &Client, database_name: &str) -> Self {
        let collection = client
            .database(database_name)
            .collection::<Comment>("comments");
        CommentService { collection }
    }

    /// All comments of a post in ascending creation time
    pub async fn get_comments_for_post(
        &self,
        post_id: &ObjectId,
    ) -> Result<Vec<Comment>, CustomError> {
        let cursor = self
            .collection
            .find(doc! { "post_id": post_id })
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to fetch comments: {}", e))
            })?;

        let mut comments: Vec<Comment> = cursor.try_collect().await.map_err(|e| {
            CustomError::InternalServerError(format!("Failed to collect comments: {}", e))
        })?;

        comments.sort_by_key(|c| c.created_at);
        Ok(comments)
    }

    pub async fn get_comment_by_id(
        &self,
        comment_id: &ObjectId,
    ) -> Result<Option<Comment>, CustomError> {
        self.collection
            .find_one(doc! { "_id": comment_id })
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to fetch comment: {}", e))
            })
    }

    /// Update a comment (only author can update)
    pub async fn update_comment(
        &self,
        comment_id: &ObjectId,
        viewer: &Viewer,
        content: String,
    ) -> Result<bool, CustomError> {
        let result = self
            .collection
            .update_one(
                doc! { "_id": comment_id, "author_id": viewer.user_id },
                doc! {
                    "$set": {
                        "content": content,
                        "updated_at": to_bson(&Utc::now())?
                    }
                },
            )
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to update comment: {}", e))
            })?;

        if result.matched_count == 0 {
            return Err(CustomError::NotFoundError(
                "Comment not found or not authorized".to_string(),
            ));
        }

        Ok(result.modified_count > 0)
    }

    /// Hard delete; the author or a moderator may remove a comment.
    /// Replies are left in place and read back as top-level comments.
    pub async fn delete_comment(
        &self,
        comment_id: &ObjectId,
        viewer: &Viewer,
    ) -> Result<bool, CustomError> {
        let filter = if viewer.can_moderate() {
            doc! { "_id": comment_id }
        } else {
            doc! { "_id": comment_id, "author_id": viewer.user_id }
        };

        let result = self.collection.delete_one(filter).await.map_err(|e| {
            CustomError::InternalServerError(format!("Failed to delete comment: {}", e))
        })?;

        if result.deleted_count == 0 {
            return Err(CustomError::NotFoundError(
                "Comment not found or not authorized".to_string(),
            ));
        }

        Ok(true)
    }

    pub async fn get_comment_count(&self, post_id: &ObjectId) -> Result<u64, CustomError> {
        self.collection
            .count_documents(doc! { "post_id": post_id })
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to count comments: {}", e))
            })
    }
}

#[async_trait]
impl CommentStore for CommentService {
    async fn insert_comment(&self, new_comment: NewComment) -> Result<Comment, CustomError> {
        if let Some(parent_id) = new_comment.parent_id {
            let parent = self.get_comment_by_id(&parent_id).await?;
            check_parent(parent.as_ref(), parent_id, &new_comment.post_id)?;
        }

        let comment = comment_from(new_comment);
        self.collection.insert_one(&comment).await.map_err(|e| {
            CustomError::InternalServerError(format!("Failed to add comment: {}", e))
        })?;

        log::info!(
            "Comment {} added to post {} by {}",
            comment.id,
            comment.post_id,
            comment.author_id
        );
        Ok(comment)
    }
}
