pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod openapi;
pub mod routes;
pub mod services;
pub mod state;
pub mod websocket;
