pub mod config;
pub mod module;
