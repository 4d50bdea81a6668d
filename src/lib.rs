pub mod beat;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod snowflake;
pub mod state;
