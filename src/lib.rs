pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod models;
pub mod state;
