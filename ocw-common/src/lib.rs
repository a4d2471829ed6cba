//! # OCW Common Library
//!
//! Shared code for the OpenCouncil worker services:
//! - Error type shared by every crate in the workspace
//! - Bootstrap configuration loading (CLI → environment → TOML → defaults)
//! - SQLite pool initialization, schema creation and migrations

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
