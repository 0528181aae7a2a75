use crate::comment::model::{CreateCommentRequest, ThreadQuery, UpdateCommentRequest};
use crate::comment::reply::ReplyComposer;
use crate::comment::service::CommentService;
use crate::comment::tree::{build_comment_tree, count_nodes, flatten_for_display};
use crate::config::AppConfig;
use crate::database::RedisService;
use crate::reaction::service::ReactionService;
use crate::utils::error::CustomError;
use crate::utils::helpers::{parse_object_id, service_name};
use crate::utils::model::Viewer;
use actix_web::{HttpResponse, web};
use serde_json::json;

/// Create a comment or a reply on a post
/// POST /comments
pub async fn create_comment(
    viewer: Viewer,
    comment_service: web::Data<CommentService>,
    config: web::Data<AppConfig>,
    redis_service: Option<web::Data<RedisService>>,
    body: web::Json<CreateCommentRequest>,
) -> Result<HttpResponse, CustomError> {
    let post_id = parse_object_id(&body.post_id, "post")?;
    let parent_id = body
        .parent_id
        .as_deref()
        .map(|raw| parse_object_id(raw, "parent comment"))
        .transpose()?;

    if let Some(redis) = redis_service {
        let key = format!("comments:{}", viewer.user_id);
        match redis
            .is_rate_limited(&key, config.comment_rate_limit, config.comment_rate_window)
            .await
        {
            Ok(true) => {
                return Err(CustomError::TooManyRequestsError(
                    "Too many comments, slow down".to_string(),
                ));
            }
            Ok(false) => {}
            // Rate limiting is best effort
            Err(e) => log::warn!("Comment rate limit check failed: {}", e),
        }
    }

    let mut composer = ReplyComposer::new();
    composer.set_draft(body.content.as_str());
    let comment = composer
        .submit(comment_service.get_ref(), &viewer, post_id, parent_id)
        .await?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Comment created successfully",
        "httpStatusCode": 201,
        "service": service_name(),
        "comment_id": comment.id.to_hex(),
        "data": comment
    })))
}

/// Get the reply tree of a post
/// GET /comments/post/{post_id}
pub async fn get_post_comments(
    comment_service: web::Data<CommentService>,
    reaction_service: web::Data<ReactionService>,
    path: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let post_id = parse_object_id(&path.into_inner(), "post")?;

    let comments = comment_service.get_comments_for_post(&post_id).await?;
    let ids: Vec<_> = comments.iter().map(|c| c.id).collect();
    let reactions = reaction_service.reactions_for_targets(&ids).await?;
    let tree = build_comment_tree(comments, &reactions);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Comments retrieved successfully",
        "httpStatusCode": 200,
        "service": service_name(),
        "count": count_nodes(&tree),
        "data": tree
    })))
}

/// Get a post's thread as display rows
/// GET /comments/post/{post_id}/thread?max_depth=
pub async fn get_post_thread(
    comment_service: web::Data<CommentService>,
    reaction_service: web::Data<ReactionService>,
    config: web::Data<AppConfig>,
    path: web::Path<String>,
    query: web::Query<ThreadQuery>,
) -> Result<HttpResponse, CustomError> {
    let post_id = parse_object_id(&path.into_inner(), "post")?;
    let max_depth = query.max_depth.unwrap_or(config.comment_max_depth);

    let comments = comment_service.get_comments_for_post(&post_id).await?;
    let ids: Vec<_> = comments.iter().map(|c| c.id).collect();
    let reactions = reaction_service.reactions_for_targets(&ids).await?;
    let rows = flatten_for_display(&build_comment_tree(comments, &reactions), max_depth);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Thread retrieved successfully",
        "httpStatusCode": 200,
        "service": service_name(),
        "count": rows.len(),
        "max_depth": max_depth,
        "data": rows
    })))
}

/// GET /comments/{comment_id}
pub async fn get_comment(
    comment_service: web::Data<CommentService>,
    path: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let comment_id = parse_object_id(&path.into_inner(), "comment")?;

    let comment = comment_service
        .get_comment_by_id(&comment_id)
        .await?
        .ok_or_else(|| CustomError::NotFoundError("Comment not found".to_string()))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Comment retrieved successfully",
        "httpStatusCode": 200,
        "service": service_name(),
        "data": comment
    })))
}

/// PUT /comments/{comment_id}
pub async fn update_comment(
    viewer: Viewer,
    comment_service: web::Data<CommentService>,
    path: web::Path<String>,
    body: web::Json<UpdateCommentRequest>,
) -> Result<HttpResponse, CustomError> {
    let comment_id = parse_object_id(&path.into_inner(), "comment")?;

    if body.content.trim().is_empty() {
        return Err(CustomError::BadRequestError(
            "Comment content cannot be empty".to_string(),
        ));
    }

    comment_service
        .update_comment(&comment_id, &viewer, body.content.trim().to_string())
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Comment updated successfully",
        "httpStatusCode": 200,
        "service": service_name()
    })))
}

/// DELETE /comments/{comment_id}
pub async fn delete_comment(
    viewer: Viewer,
    comment_service: web::Data<CommentService>,
    path: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let comment_id = parse_object_id(&path.into_inner(), "comment")?;

    comment_service.delete_comment(&comment_id, &viewer).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Comment deleted successfully",
        "httpStatusCode": 200,
        "service": service_name()
    })))
}

/// GET /comments/count/{post_id}
pub async fn get_comment_count(
    comment_service: web::Data<CommentService>,
    path: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let post_id = parse_object_id(&path.into_inner(), "post")?;

    let count = comment_service.get_comment_count(&post_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Comment count retrieved successfully",
        "httpStatusCode": 200,
        "service": service_name(),
        "count": count
    })))
}
