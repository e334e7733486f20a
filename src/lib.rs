pub mod app;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod duration;
pub mod error;
pub mod exchange;
pub mod input;
pub mod vault;

pub use error::Error;
