pub mod agent;
pub mod assistant;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod prompts;
pub mod server;
pub mod weather;
