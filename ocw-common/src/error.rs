//! Errors raised while bootstrapping the service: config and database setup

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Opening the pool, creating tables or applying a migration failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Config file or database directory could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file present but unparseable, or a setting out of range
    #[error("Configuration error: {0}")]
    Config(String),
}
