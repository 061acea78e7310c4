pub mod auth;
pub mod config;
pub mod engine;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod storage;
pub mod token;
pub mod utils;
