use crate::post::post_model::Post;
use crate::utils::error::CustomError;
use crate::utils::model::{Role, Viewer};
use chrono::Utc;
use futures_util::TryStreamExt;
use mongodb::{
    Client, Collection,
    bson::{doc, oid::ObjectId, to_bson},
};

/// Pinned posts first, newest first within each group
pub fn order_feed(posts: &mut [Post]) {
    posts.sort_by(|a, b| {
        b.is_pinned
            .cmp(&a.is_pinned)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

fn can_delete(post: &Post, viewer: &Viewer) -> bool {
    post.author_id == viewer.user_id || viewer.role == Role::Admin
}

pub struct PostService {
    collection: Collection<Post>,
}

impl PostService {
    pub fn new(client: &Client, database_name: &str) -> Self {
        let collection = client.database(database_name).collection::<Post>("posts");
        PostService { collection }
    }

    pub async fn create_post(&self, post: Post) -> Result<Post, CustomError> {
        self.collection
            .insert_one(&post)
            .await
            .map_err(|_| CustomError::InternalServerError("Failed to create post".into()))?;

        log::info!("Post {} created by {}", post.id, post.author_id);
        Ok(post)
    }

    pub async fn get_post(&self, id: &ObjectId) -> Result<Option<Post>, CustomError> {
        self.collection
            .find_one(doc! { "_id": id })
            .await
            .map_err(|_| CustomError::InternalServerError("Failed to fetch post".into()))
    }

    pub async fn list_posts(&self) -> Result<Vec<Post>, CustomError> {
        let cursor = self
            .collection
            .find(doc! {})
            .await
            .map_err(|_| CustomError::InternalServerError("Failed to fetch posts".into()))?;

        let mut posts: Vec<Post> = cursor
            .try_collect()
            .await
            .map_err(|_| CustomError::InternalServerError("Failed to read posts".into()))?;

        order_feed(&mut posts);
        Ok(posts)
    }

    pub async fn delete_post(&self, id: &ObjectId, viewer: &Viewer) -> Result<(), CustomError> {
        let post = self
            .get_post(id)
            .await?
            .ok_or_else(|| CustomError::NotFoundError("Post not found".into()))?;

        if !can_delete(&post, viewer) {
            return Err(CustomError::ForbiddenError(
                "You can only delete your own posts".into(),
            ));
        }

        self.collection
            .delete_one(doc! { "_id": id })
            .await
            .map_err(|_| CustomError::InternalServerError("Failed to delete post".into()))?;

        Ok(())
    }

    pub async fn update_post(
        &self,
        id: &ObjectId,
        viewer: &Viewer,
        title: Option<String>,
        content: Option<String>,
    ) -> Result<Post, CustomError> {
        let mut post = self
            .get_post(id)
            .await?
            .ok_or_else(|| CustomError::NotFoundError("Post not found".into()))?;

        if post.author_id != viewer.user_id {
            return Err(CustomError::ForbiddenError(
                "You can only edit your own posts".into(),
            ));
        }

        if let Some(t) = title {
            post.title = t;
        }
        if let Some(c) = content {
            post.content = c;
        }
        post.updated_at = Utc::now();

        self.collection
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$set": {
                        "title": &post.title,
                        "content": &post.content,
                        "updated_at": to_bson(&post.updated_at)?,
                    }
                },
            )
            .await
            .map_err(|_| CustomError::InternalServerError("Failed to update post".into()))?;

        Ok(post)
    }

    pub async fn set_pinned(
        &self,
        id: &ObjectId,
        viewer: &Viewer,
        pinned: bool,
    ) -> Result<(), CustomError> {
        if !viewer.can_moderate() {
            return Err(CustomError::ForbiddenError(
                "Only moderators can pin posts".into(),
            ));
        }

        let result = self
            .collection
            .update_one(doc! { "_id": id }, doc! { "$set": { "is_pinned": pinned } })
            .await
            .map_err(|_| CustomError::InternalServerError("Failed to pin post".into()))?;

        if result.matched_count == 0 {
            return Err(CustomError::NotFoundError("Post not found".into()));
        }

        log::info!("Post {} pinned={} by {}", id, pinned, viewer.user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn post(minute: u32, pinned: bool) -> Post {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, minute, 0).unwrap();
        Post {
            id: ObjectId::new(),
            title: format!("post {}", minute),
            content: String::new(),
            author_id: ObjectId::new(),
            is_pinned: pinned,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn pinned_posts_lead_the_feed() {
        let mut posts = vec![post(1, false), post(2, true), post(3, false), post(0, true)];
        order_feed(&mut posts);

        let titles: Vec<_> = posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["post 2", "post 0", "post 3", "post 1"]);
    }

    #[test]
    fn newest_first_without_pins() {
        let mut posts = vec![post(5, false), post(9, false)];
        posts[1].created_at = posts[0].created_at - Duration::minutes(1);
        order_feed(&mut posts);
        assert_eq!(posts[0].title, "post 5");
    }

    #[test]
    fn only_authors_and_admins_delete() {
        let p = post(1, false);
        assert!(can_delete(&p, &Viewer::new(p.author_id)));
        assert!(!can_delete(&p, &Viewer::new(ObjectId::new())));
        assert!(!can_delete(
            &p,
            &Viewer::new(ObjectId::new()).with_role(Role::Moderator)
        ));
        assert!(can_delete(
            &p,
            &Viewer::new(ObjectId::new()).with_role(Role::Admin)
        ));
    }
}
