pub mod config;
pub mod error;
pub mod record;

pub use config::{Config, RetryPolicy};
pub use error::*;
pub use record::*;
