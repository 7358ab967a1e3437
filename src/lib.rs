pub mod auth;
pub mod cli;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod server;
pub mod sync;
pub mod transport;
pub mod vault;
