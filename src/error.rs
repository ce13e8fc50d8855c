use crate::cars::TableNotFound;

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::error::Error),
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error(transparent)]
    TableNotFound(#[from] TableNotFound),
}
