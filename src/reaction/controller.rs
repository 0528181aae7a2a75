use crate::reaction::model::ToggleReactionRequest;
use crate::reaction::service::ReactionService;
use crate::utils::error::CustomError;
use crate::utils::helpers::{parse_object_id, service_name};
use crate::utils::model::Viewer;
use actix_web::{HttpResponse, web};
use serde_json::json;

/// Toggle the viewer's reaction on a post or comment
/// POST /reactions
pub async fn toggle_reaction(
    viewer: Viewer,
    reaction_service: web::Data<ReactionService>,
    body: web::Json<ToggleReactionRequest>,
) -> Result<HttpResponse, CustomError> {
    let target_id = parse_object_id(&body.target_id, "target")?;

    // The full set goes back so the client can reconcile its optimistic copy
    let (outcome, reactions) = reaction_service
        .toggle(target_id, &viewer, body.reaction_type)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Reaction toggled successfully",
        "httpStatusCode": 200,
        "service": service_name(),
        "outcome": outcome,
        "reactions": reactions
    })))
}

/// Reactions on a target
/// GET /reactions/{target_id}
pub async fn get_reactions(
    reaction_service: web::Data<ReactionService>,
    path: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let target_id = parse_object_id(&path.into_inner(), "target")?;
    let reactions = reaction_service.reactions_for_target(&target_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Reactions retrieved successfully",
        "httpStatusCode": 200,
        "service": service_name(),
        "count": reactions.len(),
        "data": reactions
    })))
}
