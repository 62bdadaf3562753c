//! Book library manager: XML persistence with embedded media, field search
//! and multi-key sorting over an in-memory collection.

pub mod codec;
pub mod config;
pub mod db;
pub mod demo;
pub mod error;
pub mod manager;
pub mod models;
pub mod parser;
pub mod persistence;
pub mod query;
pub mod scanner;
pub mod settings;
pub mod sort;

pub use config::Config;
pub use error::{LibraryError, Result};
pub use manager::{LibraryEvent, LibraryManager, ListenerId};
pub use models::{Book, Library, MediaData};
pub use query::BookField;
pub use sort::{SortField, SortKey};
