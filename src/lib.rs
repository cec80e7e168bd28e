pub mod ai;
pub mod classifier;
pub mod config;
pub mod embedding;
pub mod error;
pub mod outcome;
pub mod server;
pub mod shutdown;
pub mod store;
pub mod webhook;

#[cfg(test)]
mod testing;
