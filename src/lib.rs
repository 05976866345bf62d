pub mod analytics;
pub mod app;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod redirect;
pub mod registry;
pub mod shutdown;
pub mod storage;
