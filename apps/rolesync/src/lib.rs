//! # rolesync
//!
//! Library half of the rolesync binary: command-line parsing, command
//! implementations and configuration resolution.

pub mod cli;
pub mod config;
