pub mod cars;
pub mod config;
pub mod error;
pub mod fetch;
pub mod persistent;

pub use cars::{Car, RowOutcome, SkipReason, TableNotFound};
pub use error::ScrapeError;
