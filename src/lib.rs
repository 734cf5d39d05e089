pub mod config;
pub mod discovery;
pub mod ecosystem;
pub mod error;
pub mod locator;
pub mod runner;

pub use error::{Error, Result};
