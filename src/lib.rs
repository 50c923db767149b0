pub mod cli;
pub mod config;
pub mod logstore;
pub mod transport;
