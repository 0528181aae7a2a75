use crate::post::post_model::{CreatePostRequest, PinPostRequest, Post, UpdatePostRequest};
use crate::post::post_service::PostService;
use crate::utils::error::CustomError;
use crate::utils::helpers::{parse_object_id, service_name};
use crate::utils::model::Viewer;
use actix_web::{HttpResponse, web};
use mongodb::bson::oid::ObjectId;
use serde_json::json;

/// POST /posts
pub async fn create_post(
    viewer: Viewer,
    post_service: web::Data<PostService>,
    post: web::Json<CreatePostRequest>,
) -> Result<HttpResponse, CustomError> {
    if post.title.trim().is_empty() {
        return Err(CustomError::ValidationError("Post title is required".into()));
    }

    let now = chrono::Utc::now();
    let new_post = Post {
        id: ObjectId::new(),
        title: post.title.trim().to_string(),
        content: post.content.clone(),
        author_id: viewer.user_id,
        is_pinned: false,
        created_at: now,
        updated_at: now,
    };

    let inserted_post = post_service.create_post(new_post).await?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Post created successfully",
        "httpStatusCode": 201,
        "service": service_name(),
        "post": inserted_post
    })))
}

/// GET /posts
pub async fn list_posts(post_service: web::Data<PostService>) -> Result<HttpResponse, CustomError> {
    let posts = post_service.list_posts().await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Posts fetched successfully",
        "httpStatusCode": 200,
        "service": service_name(),
        "count": posts.len(),
        "posts": posts
    })))
}

/// GET /posts/{id}
pub async fn get_post(
    post_id: web::Path<String>,
    post_service: web::Data<PostService>,
) -> Result<HttpResponse, CustomError> {
    let post_id = parse_object_id(&post_id.into_inner(), "post")?;

    match post_service.get_post(&post_id).await? {
        Some(p) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Post fetched successfully",
            "httpStatusCode": 200,
            "service": service_name(),
            "post": p
        }))),
        None => Err(CustomError::NotFoundError("Post not found".into())),
    }
}

/// PUT /posts/{id}
pub async fn update_post(
    viewer: Viewer,
    post_id: web::Path<String>,
    post_service: web::Data<PostService>,
    body: web::Json<UpdatePostRequest>,
) -> Result<HttpResponse, CustomError> {
    let post_id = parse_object_id(&post_id.into_inner(), "post")?;
    let body = body.into_inner();

    let post = post_service
        .update_post(&post_id, &viewer, body.title, body.content)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Post updated successfully",
        "httpStatusCode": 200,
        "service": service_name(),
        "post": post
    })))
}

/// DELETE /posts/{id}
pub async fn delete_post(
    viewer: Viewer,
    post_id: web::Path<String>,
    post_service: web::Data<PostService>,
) -> Result<HttpResponse, CustomError> {
    let post_id = parse_object_id(&post_id.into_inner(), "post")?;
    post_service.delete_post(&post_id, &viewer).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Post deleted successfully",
        "httpStatusCode": 200,
        "service": service_name(),
    })))
}

/// PUT /posts/{id}/pin
pub async fn pin_post(
    viewer: Viewer,
    post_id: web::Path<String>,
    post_service: web::Data<PostService>,
    body: web::Json<PinPostRequest>,
) -> Result<HttpResponse, CustomError> {
    let post_id = parse_object_id(&post_id.into_inner(), "post")?;
    post_service
        .set_pinned(&post_id, &viewer, body.pinned)
        .await?;

    let message = if body.pinned { "Post pinned" } else { "Post unpinned" };

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": message,
        "httpStatusCode": 200,
        "service": service_name(),
    })))
}
