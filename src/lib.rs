//! Campus Library Server
//!
//! Borrow/return ledger for a university library: catalog of books and
//! theses, student/faculty/librarian accounts, and loans with due dates,
//! fines and per-role borrowing limits, exposed as a REST JSON API.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
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
