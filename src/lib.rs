pub mod analysis;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod metrics;
pub mod models;
pub mod network;
pub mod output;
pub mod request;
pub mod router;
pub mod server;
pub mod sim;
pub mod state;
pub mod traffic;
