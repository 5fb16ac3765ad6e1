//! # zousho Common Library
//!
//! Shared code for the zousho services including:
//! - Book identifier canonicalization (ISBN-10/13)
//! - The `BookRecord` metadata model
//! - Configuration loading
//! - Event types and the broadcast `EventBus`
//! - String similarity used when matching titles

pub mod book;
pub mod config;
pub mod error;
pub mod events;
pub mod isbn;
pub mod similarity;

pub use book::BookRecord;
pub use error::{Error, Result};
pub use isbn::Isbn;
