use std::time::Duration;

use mongodb::bson::oid::ObjectId;
use serde::Serialize;

use crate::comment::model::{Comment, NewComment};
use crate::comment::service::CommentStore;
use crate::utils::error::CustomError;
use crate::utils::model::Viewer;

/// Time given to layout before the composer grabs focus
pub const FOCUS_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// The comment a reply is being written to
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ReplyTarget {
    pub comment_id: ObjectId,
    pub author_name: String,
}

/// Effect the client performs after a reply target is picked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComposerFocus {
    pub scroll_into_view: bool,
    pub focus_after: Duration,
}

/// State of the comment box under a post
#[derive(Debug, Default, Clone)]
pub struct ReplyComposer {
    replying_to: Option<ReplyTarget>,
    draft: String,
}

impl ReplyComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replying_to(&self) -> Option<&ReplyTarget> {
        self.replying_to.as_ref()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, draft: impl Into<String>) {
        self.draft = draft.into();
    }

    /// Point the composer at a comment and pre-fill the mention
    pub fn reply_to(&mut self, target: ReplyTarget) -> ComposerFocus {
        let mention = format!("@{} ", target.author_name);
        if !self.draft.starts_with(&mention) {
            self.draft = format!("{}{}", mention, self.draft);
        }
        self.replying_to = Some(target);

        ComposerFocus {
            scroll_into_view: true,
            focus_after: FOCUS_SETTLE_DELAY,
        }
    }

    pub fn cancel_reply(&mut self) {
        self.replying_to = None;
    }

    pub fn placeholder(&self) -> String {
        match &self.replying_to {
            Some(target) => format!("Replying to {}…", target.author_name),
            None => "Write a comment…".to_string(),
        }
    }

    /// Parent for the next submission; an explicit one wins over the pointer
    pub fn resolve_parent(&self, explicit_parent: Option<ObjectId>) -> Option<ObjectId> {
        explicit_parent.or_else(|| self.replying_to.as_ref().map(|t| t.comment_id))
    }

    /// Submit the draft. On success the reply pointer and draft are cleared;
    /// on failure both are kept so the user can retry.
    pub async fn submit<S: CommentStore + ?Sized>(
        &mut self,
        store: &S,
        viewer: &Viewer,
        post_id: ObjectId,
        explicit_parent: Option<ObjectId>,
    ) -> Result<Comment, CustomError> {
        let content = self.draft.trim();
        if content.is_empty() {
            return Err(CustomError::ValidationError(
                "Comment content cannot be empty".to_string(),
            ));
        }

        let new_comment = NewComment {
            post_id,
            author_id: viewer.user_id,
            author_name: viewer.display_name.clone(),
            author_avatar: viewer.avatar.clone(),
            content: content.to_string(),
            parent_id: self.resolve_parent(explicit_parent),
        };

        let comment = store.insert_comment(new_comment).await?;
        self.replying_to = None;
        self.draft.clear();
        Ok(comment)
    }
}
