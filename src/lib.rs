pub mod api;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod models;
pub mod services;
