pub mod client;
pub mod config;
pub mod sse;

pub use client::OpenAiClient;
pub use config::OpenAiConfig;
