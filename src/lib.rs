pub mod config;
pub mod embedding;
pub mod errors;
pub mod logging;
pub mod news;
pub mod pipeline;
pub mod scoring;
pub mod server;
