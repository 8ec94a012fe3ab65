// src/error.rs
//! Typed failures at the orchestration boundary. Expected degraded
//! conditions (empty results, OCR down, storage down) are NOT errors; these
//! variants cover input errors and genuine scrape failures only.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Platform is required")]
    MissingPlatform,

    #[error("User ID is required")]
    MissingUserId,

    #[error("Either keyword or category is required")]
    MissingQuery,

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("User not found")]
    UnknownUser(String),

    #[error("Scrape failed: {0}")]
    Scrape(anyhow::Error),
}

impl SearchError {
    /// Client errors get a 4xx; scrape failures are upstream (502-shaped).
    pub fn is_client_error(&self) -> bool {
        !matches!(self, SearchError::Scrape(_))
    }
}
