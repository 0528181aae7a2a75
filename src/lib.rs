pub mod comment;
pub mod config;
pub mod conversation;
pub mod database;
pub mod middleware;
pub mod post;
pub mod reaction;
pub mod realtime;
pub mod router;
pub mod user;
pub mod utils;
