pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod geo;
pub mod models;
pub mod notifier;
pub mod observability;
pub mod pricing;
pub mod repository;
pub mod state;
