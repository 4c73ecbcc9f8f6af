pub mod api;
pub mod config;
pub mod error;
pub mod http;
pub mod llm;
pub mod metrics;
pub mod output;
pub mod recommend;
