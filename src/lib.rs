pub mod config;
pub mod ingest;
pub mod output;
pub mod refresh;
pub mod server;
pub mod store;
