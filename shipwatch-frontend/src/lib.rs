pub mod command;
pub mod config;
pub mod frontend;
pub mod notifier;
pub mod provider;
pub mod scheduled;
