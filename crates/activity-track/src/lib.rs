pub mod cli;
pub mod commands;
pub mod config;
pub mod dead_letter;
pub mod error;
pub mod event;
pub mod ingest;
pub mod server;
pub mod storage;

pub use config::ServerConfig;
pub use error::{Error, Result};
