//! Side-effecting helpers: configuration, model backends, files, shell, prompts.

pub mod anthropic;
pub mod config;
pub mod export;
pub mod gateway;
pub mod ollama;
pub mod process;
pub mod prompt;
pub mod shell;
pub mod workspace;
