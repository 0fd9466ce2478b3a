pub mod client;
pub mod config;
pub mod start;
pub mod template;
