pub mod adb;
pub mod clock;
pub mod config;
pub mod device;
pub mod driver;
pub mod error;
pub mod orchestrator;
pub mod poll;
pub mod sink;
pub mod types;

#[cfg(test)]
mod fake;

pub use error::{ResetError, Result};
