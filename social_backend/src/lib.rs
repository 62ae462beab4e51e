pub mod api;
pub mod app;
pub mod bootstrap;
pub mod comments;
pub mod config;
pub mod database;
pub mod errors;
pub mod friends;
pub mod identity;
pub mod node;
pub mod posts;
pub mod responses;
pub mod sessions;
pub mod sharing;
pub mod telemetry;
pub mod user_lists;
pub mod utils;
