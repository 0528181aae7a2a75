use actix::Actor;
use actix_web::http::StatusCode;
use actix_web::middleware::{ErrorHandlers, Logger};
use actix_web::{App, HttpResponse, HttpServer, Responder, get, web};
use dotenv::dotenv;
use env_logger::Env;
use log::{info, warn};

use community_backend::comment::service::CommentService;
use community_backend::config::AppConfig;
use community_backend::conversation::service::ConversationService;
use community_backend::database::{RedisService, connect_to_mongo, connect_to_redis};
use community_backend::middleware::error_handler::handle_error;
use community_backend::middleware::not_found::not_found;
use community_backend::post::post_service::PostService;
use community_backend::reaction::service::ReactionService;
use community_backend::realtime::hub::FeedHub;
use community_backend::router::index::routes;
use community_backend::utils::helpers::service_name;
use serde_json::json;

#[get("/")]
async fn default() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Community backend is running",
        "httpStatusCode": StatusCode::OK.as_u16(),
        "service": service_name(),
    }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Initialize logger with environment variable support
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env();
    info!("Starting server on http://{}:{}", config.host, config.port);

    let mongo_client = connect_to_mongo(&config)
        .await
        .map_err(|e| std::io::Error::other(format!("Failed to connect to MongoDB: {}", e)))?;

    // Redis backs token revocation and rate limiting; run without it if unreachable
    let redis_service = match connect_to_redis(&config.redis_url).await {
        Ok(client) => Some(web::Data::new(RedisService::new(&client))),
        Err(e) => {
            warn!("{}; continuing without revocation checks or rate limits", e);
            None
        }
    };

    let db_name = config.database_name.clone();
    let post_service = web::Data::new(PostService::new(&mongo_client, &db_name));
    let comment_service = web::Data::new(CommentService::new(&mongo_client, &db_name));
    let reaction_service = web::Data::new(ReactionService::new(&mongo_client, &db_name));
    let conversation_service =
        web::Data::new(ConversationService::new(&mongo_client, &db_name));

    if let Err(e) = reaction_service.ensure_indexes().await {
        warn!("{}", e);
    }

    let feed_hub = web::Data::new(FeedHub::new().start());

    let bind_addr = (config.host.clone(), config.port);
    let config = web::Data::new(config);

    // Start the HTTP server
    HttpServer::new(move || {
        let mut app = App::new()
            .wrap(Logger::default())
            .wrap(Logger::new("%a %{User-Agent}i"))
            .app_data(config.clone())
            .app_data(post_service.clone())
            .app_data(comment_service.clone())
            .app_data(reaction_service.clone())
            .app_data(conversation_service.clone())
            .app_data(feed_hub.clone());

        if let Some(redis_service) = &redis_service {
            app = app.app_data(redis_service.clone());
        }

        app.configure(routes)
            .wrap(
                ErrorHandlers::new()
                    .handler(StatusCode::NOT_FOUND, not_found)
                    .default_handler(handle_error),
            )
            .service(default)
    })
    .bind(bind_addr)?
    .run()
    .await?;

    // Reached only once the server shuts down
    info!("Server has stopped");

    Ok(())
}
