//! Configuration, secrets and bootstrap shared by the Quarry binary.

pub mod bootstrap;
pub mod config;
pub mod secret;

pub use config::Config;
pub use secret::Secret;
