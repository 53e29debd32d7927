//! CLI module for the annotation-cli binary

pub mod commands;
pub mod error;
pub mod output;

pub use error::CliError;
