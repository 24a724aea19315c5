pub mod config;
pub mod error;

pub use config::KrbConfig;
pub use error::{KrbError, KrbResult};
