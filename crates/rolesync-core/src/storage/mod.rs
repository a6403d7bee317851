//! # Storage
//!
//! Persistent directory backends.

pub mod redb_directory;

pub use redb_directory::RedbDirectory;
