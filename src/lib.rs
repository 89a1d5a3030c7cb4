pub mod app;
pub mod auth;
pub mod billing;
pub mod config;
pub mod state;
