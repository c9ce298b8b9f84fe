//! Bookrent library rental server
//!
//! REST JSON API for renting books, computing overdue fines and managing
//! accounts, with a periodic maintenance job that moves rentals through their
//! overdue and lost states and blocks accounts with too many unpaid fines.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod fines;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
