pub mod config;
pub mod error;
pub mod quality;
pub mod time;
pub mod types;

pub use config::AppConfig;
pub use error::{RefrainError, Result};
pub use quality::*;
pub use types::*;
