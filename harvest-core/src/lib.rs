pub mod client;
pub mod config;
pub mod error;
pub mod error_utils;
pub mod record;
pub mod types;

pub use client::*;
pub use config::*;
pub use error::*;
pub use error_utils::*;
pub use record::*;
pub use types::*;
