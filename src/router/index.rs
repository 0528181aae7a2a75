use crate::comment::index::comment_routes;
use crate::conversation::index::conversation_routes;
use crate::post::post_index::post_routes;
use crate::reaction::index::reaction_routes;
use crate::realtime::index::realtime_routes;
use crate::user::index::user_routes;
use actix_web::web;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.configure(user_routes);
    cfg.configure(post_routes);
    cfg.configure(comment_routes);
    cfg.configure(reaction_routes);
    cfg.configure(conversation_routes);
    cfg.configure(realtime_routes);
}
